//! Command-line definitions.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use watchtrace_common::config::{LegacyPolicy, TracerConfig};
use watchtrace_common::constants::BIN_NAME;

/// watchtrace: list every file a command and all of its children open or
/// check for access.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Output format for access records.
    #[arg(short, long, value_enum, default_value_t = Format::Plain)]
    pub format: Format,

    /// Write access records to FILE instead of standard output.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Resolve legacy open/creat/access calls against the working directory
    /// instead of aborting.
    #[arg(long)]
    pub resolve_legacy: bool,

    /// Do not pass signals through to traced processes.
    #[arg(long)]
    pub no_forward_signals: bool,

    /// Raise diagnostic verbosity (repeatable). Ignored when `RUST_LOG` is set.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Command to trace, followed by its arguments.
    #[arg(trailing_var_arg = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Record format written for each access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// `<mode>\t<path>`, one per line.
    Plain,
    /// One JSON object per line.
    Json,
}

impl Cli {
    /// Tracer settings selected by the flags.
    #[must_use]
    pub fn tracer_config(&self) -> TracerConfig {
        TracerConfig {
            legacy_calls: if self.resolve_legacy {
                LegacyPolicy::Resolve
            } else {
                LegacyPolicy::Reject
            },
            forward_signals: !self.no_forward_signals,
            ..TracerConfig::default()
        }
    }

    /// Default log filter for the verbosity level.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once(BIN_NAME).chain(args.iter().copied()))
    }

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn command_and_arguments_are_kept_verbatim() {
        let cli = parse(&["sh", "-c", "echo hi > out"]).expect("parse");
        assert_eq!(cli.command, ["sh", "-c", "echo hi > out"]);
        assert_eq!(cli.format, Format::Plain);
        assert!(cli.output.is_none());
    }

    #[test]
    fn double_dash_ends_options() {
        let cli = parse(&["--", "-weird-name", "--help"]).expect("parse");
        assert_eq!(cli.command, ["-weird-name", "--help"]);
    }

    #[test]
    fn options_after_command_belong_to_command() {
        let cli = parse(&["ls", "-v", "--format", "json"]).expect("parse");
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.format, Format::Plain);
        assert_eq!(cli.command, ["ls", "-v", "--format", "json"]);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = parse(&["-x", "ls"]).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn command_is_required() {
        let err = parse(&["-v"]).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn help_exits_zero() {
        let err = parse(&["--help"]).expect_err("help short-circuits");
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn flags_map_to_tracer_config() {
        let cli = parse(&["--resolve-legacy", "--no-forward-signals", "true"]).expect("parse");
        let config = cli.tracer_config();
        assert_eq!(config.legacy_calls, LegacyPolicy::Resolve);
        assert!(!config.forward_signals);

        let defaults = parse(&["true"]).expect("parse").tracer_config();
        assert_eq!(defaults, TracerConfig::default());
    }

    #[test]
    fn verbosity_raises_log_level() {
        assert_eq!(parse(&["true"]).expect("parse").log_level(), "warn");
        assert_eq!(parse(&["-v", "true"]).expect("parse").log_level(), "info");
        assert_eq!(parse(&["-vv", "true"]).expect("parse").log_level(), "debug");
        assert_eq!(parse(&["-vvvv", "true"]).expect("parse").log_level(), "trace");
    }

    #[test]
    fn format_and_output_parse() {
        let cli = parse(&["-f", "json", "-o", "/tmp/out.jsonl", "make"]).expect("parse");
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out.jsonl")));
    }
}
