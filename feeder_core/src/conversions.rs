//! `From` implementations bridging `feeder_config` types to `feeder_core` types.

use std::time::Duration;

use crate::config::Timing;
use crate::error::Result;
use crate::schedule::{TimeOfDay, parse_times};

impl From<&feeder_config::Config> for Timing {
    fn from(c: &feeder_config::Config) -> Self {
        Self {
            sensor: Duration::from_millis(c.timeouts.sensor_ms),
            calibration: Duration::from_millis(c.timeouts.calibration_ms),
            read_slice: Duration::from_millis(c.serial.read_slice_ms),
        }
    }
}

/// Default times for newly linked pets, validated.
pub fn default_times_from(c: &feeder_config::ScheduleCfg) -> Result<Vec<TimeOfDay>> {
    parse_times(&c.default_times)
}
