//! Destinations for resolved access events.

use watchtrace_common::error::Result;
use watchtrace_common::types::AccessEvent;

/// Receives every resolved access in the order it was observed.
pub trait EventSink {
    /// Records one access event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be written out.
    fn record(&mut self, event: &AccessEvent) -> Result<()>;

    /// Flushes anything still buffered. Called once after tracing ends.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered output cannot be written.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl EventSink for Vec<AccessEvent> {
    fn record(&mut self, event: &AccessEvent) -> Result<()> {
        self.push(event.clone());
        Ok(())
    }
}
