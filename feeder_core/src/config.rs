//! Runtime timing used by the device operations.
//!
//! Separate from the TOML-deserialized config in `feeder_config`; see
//! `conversions` for the mapping.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Deadline for a sensor reply.
    pub sensor: Duration,
    /// Deadline for each calibration step.
    pub calibration: Duration,
    /// Upper bound for a single `read_line` inside a polling loop.
    pub read_slice: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sensor: Duration::from_secs(2),
            calibration: Duration::from_secs(5),
            read_slice: Duration::from_millis(100),
        }
    }
}
