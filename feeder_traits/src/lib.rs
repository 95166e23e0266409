//! Hardware seams shared by the feeder workspace.
//!
//! A [`Transport`] knows how to reach the microcontroller; every operation
//! asks it for a fresh [`Link`], uses it, and drops it. Dropping a link
//! releases the underlying handle, so every exit path closes the port.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Error type used at trait boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub trait Transport {
    type Link: Link;

    /// Open a link. Returns only once the link is usable (settle delay elapsed).
    fn open(&self) -> Result<Self::Link, BoxError>;
}

pub trait Link {
    /// Discard any bytes the device sent before the current request.
    fn clear_input(&mut self) -> Result<(), BoxError>;

    /// Write all bytes and flush.
    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError>;

    /// Read one newline-terminated line, waiting at most `timeout`.
    ///
    /// `Ok(None)` means nothing complete arrived in time. Returned lines are
    /// trimmed of surrounding whitespace and the line terminator.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, BoxError>;
}
