//! Sensor and actuator operations over a per-call link.
//!
//! Every public operation opens its own link, uses it and drops it before
//! returning, whatever the outcome. Operations on one `Feeder` are serialised
//! by an internal lock, so at most one link to the board is open at a time.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use feeder_traits::clock::{Clock, MonotonicClock};
use feeder_traits::{Link, Transport};
use tracing::{debug, info, trace, warn};

use crate::config::Timing;
use crate::error::Result;
use crate::hw_error::{map_hw_error, map_open_error};
use crate::protocol::{Command, ResponseLine, SensorChannel};
use crate::status::SensorReading;

/// Result of polling the link until a line is accepted or time runs out.
pub(crate) enum Polled<R> {
    Found(R),
    Expired { last_line: Option<String> },
}

pub struct Feeder<T: Transport, C: Clock = MonotonicClock> {
    transport: T,
    clock: C,
    timing: Timing,
    device: Mutex<()>,
}

impl<T: Transport> Feeder<T, MonotonicClock> {
    pub fn new(transport: T, timing: Timing) -> Self {
        Self::with_clock(transport, MonotonicClock::new(), timing)
    }
}

impl<T: Transport, C: Clock> Feeder<T, C> {
    pub fn with_clock(transport: T, clock: C, timing: Timing) -> Self {
        Self {
            transport,
            clock,
            timing,
            device: Mutex::new(()),
        }
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run `f` on a freshly opened link, holding the device lock.
    pub(crate) fn with_link<R>(&self, f: impl FnOnce(&mut T::Link) -> Result<R>) -> Result<R> {
        let _guard = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        let mut link = self
            .transport
            .open()
            .map_err(|e| map_open_error(&*e))?;
        let out = f(&mut link);
        drop(link);
        trace!("link released");
        out
    }

    pub(crate) fn send(&self, link: &mut T::Link, bytes: &[u8]) -> Result<()> {
        link.write(bytes).map_err(|e| map_hw_error(&*e))
    }

    pub(crate) fn clear(&self, link: &mut T::Link) -> Result<()> {
        link.clear_input().map_err(|e| map_hw_error(&*e))
    }

    /// Poll `read_line` until `accept` returns `Some` or `timeout` passes.
    ///
    /// Lines that `accept` rejects are skipped; the last one is kept for
    /// diagnostics.
    pub(crate) fn poll_lines<R>(
        &self,
        link: &mut T::Link,
        timeout: Duration,
        mut accept: impl FnMut(&str) -> Option<R>,
    ) -> Result<Polled<R>> {
        let deadline = self.clock.now() + timeout;
        let mut last_line = None;
        loop {
            let now = self.clock.now();
            if now >= deadline {
                return Ok(Polled::Expired { last_line });
            }
            let slice = self
                .timing
                .read_slice
                .min(deadline.saturating_duration_since(now));
            match link.read_line(slice).map_err(|e| map_hw_error(&*e))? {
                Some(line) => {
                    if let Some(found) = accept(&line) {
                        return Ok(Polled::Found(found));
                    }
                    trace!(%line, "skipped line");
                    last_line = Some(line);
                }
                None => continue,
            }
        }
    }

    /// Request one sensor value.
    ///
    /// Returns `SensorReading::NoResponse` when no line tagged for `channel`
    /// arrives within the sensor deadline.
    pub fn read_sensor(&self, channel: SensorChannel) -> Result<SensorReading> {
        let timeout = self.timing.sensor;
        self.with_link(|link| {
            self.clear(link)?;
            self.send(link, &[Command::ReadSensor(channel).code()])?;
            debug!(%channel, "sensor requested");
            let polled = self.poll_lines(link, timeout, |line| {
                ResponseLine::parse(line)
                    .value_for(channel)
                    .map(str::to_string)
            })?;
            Ok(match polled {
                Polled::Found(value) => {
                    info!(%channel, %value, "sensor read");
                    SensorReading::Value { channel, value }
                }
                Polled::Expired { last_line } => {
                    warn!(
                        %channel,
                        ?last_line,
                        timeout_ms = timeout.as_millis() as u64,
                        "sensor did not respond"
                    );
                    SensorReading::NoResponse { channel }
                }
            })
        })
    }

    /// Start the feed motor. No reply is expected.
    pub fn activate_motor(&self) -> Result<()> {
        self.fire(Command::Motor)
    }

    /// Start the water pump. No reply is expected.
    pub fn activate_pump(&self) -> Result<()> {
        self.fire(Command::Pump)
    }

    fn fire(&self, cmd: Command) -> Result<()> {
        self.with_link(|link| self.send(link, &[cmd.code()]))?;
        info!(command = ?cmd, "actuator command sent");
        Ok(())
    }
}
