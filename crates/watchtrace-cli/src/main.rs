//! # watchtrace
//!
//! Runs a command under `ptrace(2)` and prints every file it or any of its
//! descendants opens or checks for access. Diagnostics go to standard
//! error; standard output carries only access records.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod args;
mod output;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use watchtrace_core::backend::ptrace::PtraceBackend;
use watchtrace_core::launch::launch;
use watchtrace_core::sink::EventSink;
use watchtrace_core::tracer::Tracer;

use crate::args::{Cli, Format};
use crate::output::{JsonSink, PlainSink, STDOUT_LABEL};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(io::stderr)
        .init();

    let status = trace(&cli)?;
    std::process::exit(status);
}

/// Launches the command, traces it to completion and returns the root's
/// exit status.
fn trace(cli: &Cli) -> anyhow::Result<i32> {
    let mut sink = open_sink(cli)?;
    let config = cli.tracer_config();
    tracing::debug!(?config, command = ?cli.command, "starting");

    let root = launch(&cli.command)?;
    let mut tracer = Tracer::new(PtraceBackend::new(), root, config);
    let status = tracer
        .run(sink.as_mut())
        .with_context(|| format!("tracing {} failed", cli.command.join(" ")))?;
    sink.finish()?;
    Ok(status)
}

fn open_sink(cli: &Cli) -> anyhow::Result<Box<dyn EventSink>> {
    let (out, target): (Box<dyn Write>, PathBuf) = match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create output file {}", path.display()))?;
            (Box::new(BufWriter::new(file)), path.clone())
        }
        None => (Box::new(io::stdout()), PathBuf::from(STDOUT_LABEL)),
    };
    Ok(match cli.format {
        Format::Plain => Box::new(PlainSink::new(out, target)),
        Format::Json => Box::new(JsonSink::new(out, target)),
    })
}
