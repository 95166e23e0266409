//! Real serial link to the feeder microcontroller.

use std::io::Read;
use std::time::{Duration, Instant};

use feeder_traits::clock::{Clock, MonotonicClock};
use feeder_traits::{BoxError, Link, Transport};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace};

use crate::error::HwError;
use crate::util::{remaining_until, take_line};

/// Opens the configured port (8N1) for every operation.
pub struct SerialTransport<C: Clock = MonotonicClock> {
    port: String,
    baud_rate: u32,
    settle: Duration,
    clock: C,
}

impl SerialTransport<MonotonicClock> {
    pub fn new(port: impl Into<String>, baud_rate: u32, settle: Duration) -> Self {
        Self::with_clock(port, baud_rate, settle, MonotonicClock::new())
    }
}

impl<C: Clock> SerialTransport<C> {
    pub fn with_clock(port: impl Into<String>, baud_rate: u32, settle: Duration, clock: C) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            settle,
            clock,
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

impl<C: Clock> Transport for SerialTransport<C> {
    type Link = SerialLink;

    fn open(&self) -> Result<SerialLink, BoxError> {
        let port = serialport::new(&self.port, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| HwError::Open {
                port: self.port.clone(),
                reason: e.to_string(),
            })?;
        // The board resets when the port opens and prints boot noise meanwhile.
        self.clock.sleep(self.settle);
        debug!(port = %self.port, baud = self.baud_rate, "serial link open");
        Ok(SerialLink {
            port,
            pending: Vec::with_capacity(128),
        })
    }
}

/// An open port. Closed when dropped.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl Link for SerialLink {
    fn clear_input(&mut self) -> Result<(), BoxError> {
        self.pending.clear();
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| HwError::Io(e.into()))?;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        std::io::Write::write_all(&mut self.port, bytes).map_err(HwError::Io)?;
        std::io::Write::flush(&mut self.port).map_err(HwError::Io)?;
        trace!(len = bytes.len(), "serial write");
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, BoxError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 64];
        loop {
            if let Some(line) = take_line(&mut self.pending) {
                trace!(%line, "serial line");
                return Ok(Some(line));
            }
            let Some(left) = remaining_until(deadline, Instant::now()) else {
                return Ok(None);
            };
            self.port
                .set_timeout(left)
                .map_err(|e| HwError::Io(e.into()))?;
            match self.port.read(&mut chunk) {
                Ok(0) => continue,
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HwError::from_read(e).into()),
            }
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        trace!("serial link closed");
    }
}
