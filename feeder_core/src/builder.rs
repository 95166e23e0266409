//! Type-state builder for `Feeder`.
//!
//! `build()` only exists once a transport has been supplied; `try_build()` is
//! always available and reports a missing transport at runtime.

use std::time::Duration;

use feeder_traits::Transport;
use feeder_traits::clock::{Clock, MonotonicClock};

use crate::config::Timing;
use crate::device::Feeder;
use crate::error::{FeederError, Result};

pub struct Missing;
pub struct Set;

pub struct FeederBuilder<S, T, C = MonotonicClock> {
    transport: Option<T>,
    clock: C,
    timing: Timing,
    _state: std::marker::PhantomData<S>,
}

impl<T: Transport> Feeder<T, MonotonicClock> {
    pub fn builder() -> FeederBuilder<Missing, T> {
        FeederBuilder {
            transport: None,
            clock: MonotonicClock::new(),
            timing: Timing::default(),
            _state: std::marker::PhantomData,
        }
    }
}

impl<S, T: Transport, C: Clock> FeederBuilder<S, T, C> {
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_sensor_timeout(mut self, d: Duration) -> Self {
        self.timing.sensor = d;
        self
    }

    pub fn with_calibration_timeout(mut self, d: Duration) -> Self {
        self.timing.calibration = d;
        self
    }

    pub fn with_read_slice(mut self, d: Duration) -> Self {
        self.timing.read_slice = d;
        self
    }

    /// Replace the clock used for deadlines.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> FeederBuilder<S, T, C2> {
        FeederBuilder {
            transport: self.transport,
            clock,
            timing: self.timing,
            _state: std::marker::PhantomData,
        }
    }

    pub fn try_build(self) -> Result<Feeder<T, C>> {
        let transport = self
            .transport
            .ok_or_else(|| FeederError::Config("transport not set".into()))?;
        validate_timing(&self.timing)?;
        Ok(Feeder::with_clock(transport, self.clock, self.timing))
    }
}

impl<T: Transport, C: Clock> FeederBuilder<Missing, T, C> {
    pub fn with_transport(self, transport: T) -> FeederBuilder<Set, T, C> {
        FeederBuilder {
            transport: Some(transport),
            clock: self.clock,
            timing: self.timing,
            _state: std::marker::PhantomData,
        }
    }
}

impl<T: Transport, C: Clock> FeederBuilder<Set, T, C> {
    pub fn build(self) -> Result<Feeder<T, C>> {
        self.try_build()
    }
}

fn validate_timing(t: &Timing) -> Result<()> {
    if t.sensor.is_zero() || t.calibration.is_zero() {
        return Err(FeederError::Config("timeouts must be non-zero".into()));
    }
    if t.read_slice.is_zero() {
        return Err(FeederError::Config("read slice must be non-zero".into()));
    }
    Ok(())
}
