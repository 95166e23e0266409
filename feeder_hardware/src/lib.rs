//! Feeder link implementations: the real serial port and a simulator.
pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod util;

#[cfg(feature = "hardware")]
pub use serial::{SerialLink, SerialTransport};

use feeder_traits::clock::{Clock, MonotonicClock};
use feeder_traits::{BoxError, Link, Transport};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Simulated sensor channels: (command byte, tag, min, max, unit).
const SIM_SENSORS: [(u8, &str, u32, u32, &str); 4] = [
    (b'1', "PESO_A", 50, 200, "g"),
    (b'2', "PESO_B", 10, 50, "g"),
    (b'3', "DISTANCIA_A", 20, 100, "cm"),
    (b'4', "DISTANCIA_B", 5, 30, "cm"),
];

/// Simulated feeder board.
///
/// Answers sensor requests with values in plausible ranges, accepts motor and
/// pump commands, and walks through the two-step calibration dialogue. Every
/// opened link starts from a freshly reset board, like the real one.
#[derive(Clone)]
pub struct SimulatedTransport<C: Clock = MonotonicClock> {
    clock: C,
    settle: Duration,
    silent: bool,
    ticks: Arc<AtomicU32>,
}

impl SimulatedTransport<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for SimulatedTransport<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock + Clone> SimulatedTransport<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            settle: Duration::ZERO,
            silent: false,
            ticks: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Delay applied on every open.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// A silent board accepts every command and never answers.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

impl<C: Clock + Clone> Transport for SimulatedTransport<C> {
    type Link = SimulatedLink<C>;

    fn open(&self) -> Result<Self::Link, BoxError> {
        self.clock.sleep(self.settle);
        Ok(SimulatedLink {
            clock: self.clock.clone(),
            silent: self.silent,
            ticks: self.ticks.clone(),
            outbox: VecDeque::new(),
            typed: Vec::new(),
            selected: None,
        })
    }
}

pub struct SimulatedLink<C: Clock = MonotonicClock> {
    clock: C,
    silent: bool,
    ticks: Arc<AtomicU32>,
    outbox: VecDeque<String>,
    /// Characters of a weight line being typed after a scale was selected.
    typed: Vec<u8>,
    selected: Option<char>,
}

impl<C: Clock> SimulatedLink<C> {
    fn emit(&mut self, line: String) {
        if !self.silent {
            self.outbox.push_back(line);
        }
    }

    fn next_value(&self, min: u32, max: u32) -> u32 {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        min + tick.wrapping_mul(37) % (max - min + 1)
    }

    fn command(&mut self, byte: u8) {
        if let Some(&(_, tag, min, max, unit)) = SIM_SENSORS.iter().find(|s| s.0 == byte) {
            let v = self.next_value(min, max);
            tracing::debug!(tag, value = v, "simulated sensor read");
            self.emit(format!("{tag}: {v} {unit}"));
            return;
        }
        match byte {
            b'r' => tracing::info!("motor activated (simulated)"),
            b'b' => tracing::info!("pump activated (simulated)"),
            b'c' | b'd' => {
                let scale = if byte == b'c' { 'A' } else { 'B' };
                self.selected = Some(scale);
                self.typed.clear();
                self.emit(format!(
                    "Balanza {scale} tarada, lista para calibrar. Coloque el peso y envie los gramos"
                ));
            }
            b'\r' | b' ' => {}
            other => tracing::trace!(byte = other, "simulated board ignored byte"),
        }
    }

    fn finish_weight_line(&mut self, scale: char) {
        let text = String::from_utf8_lossy(&self.typed).trim().to_string();
        self.typed.clear();
        match text.parse::<f32>() {
            Ok(grams) if grams > 0.0 => {
                self.selected = None;
                let factor = 420.0 + grams / 100.0;
                self.emit(format!(
                    "Balanza {scale} calibrada. Nuevo factor: {factor:.2} guardado"
                ));
            }
            _ => self.emit(format!("Peso invalido: '{text}'")),
        }
    }
}

impl<C: Clock> Link for SimulatedLink<C> {
    fn clear_input(&mut self) -> Result<(), BoxError> {
        self.outbox.clear();
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        for &b in bytes {
            let selected = self.selected;
            match selected {
                Some(scale) if b == b'\n' => self.finish_weight_line(scale),
                Some(_) if b.is_ascii_digit() || b == b'.' => self.typed.push(b),
                _ => self.command(b),
            }
        }
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, BoxError> {
        match self.outbox.pop_front() {
            Some(line) => Ok(Some(line)),
            None => {
                self.clock.sleep(timeout);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feeder_traits::clock::ManualClock;

    fn open_sim() -> SimulatedLink<ManualClock> {
        SimulatedTransport::with_clock(ManualClock::new())
            .open()
            .unwrap()
    }

    #[test]
    fn test_simulated_sensor_values_in_range() {
        let mut link = open_sim();
        for _ in 0..20 {
            link.write(b"2").unwrap();
            let line = link.read_line(Duration::from_millis(10)).unwrap().unwrap();
            let value = line
                .strip_prefix("PESO_B: ")
                .and_then(|v| v.strip_suffix(" g"))
                .unwrap();
            let v: u32 = value.parse().unwrap();
            assert!((10..=50).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn test_simulated_actuators_are_silent() {
        let mut link = open_sim();
        link.write(b"r").unwrap();
        link.write(b"b").unwrap();
        assert_eq!(link.read_line(Duration::from_millis(5)).unwrap(), None);
    }

    #[test]
    fn test_simulated_calibration_dialogue() {
        let mut link = open_sim();
        link.write(b"d").unwrap();
        let ready = link.read_line(Duration::from_millis(5)).unwrap().unwrap();
        assert!(ready.contains("lista para calibrar"));
        link.write(b"500\n").unwrap();
        let done = link.read_line(Duration::from_millis(5)).unwrap().unwrap();
        assert_eq!(done, "Balanza B calibrada. Nuevo factor: 425.00 guardado");
    }

    #[test]
    fn test_silent_board_waits_out_the_timeout() {
        let clock = ManualClock::new();
        let mut link = SimulatedTransport::with_clock(clock.clone())
            .silent(true)
            .open()
            .unwrap();
        link.write(b"1").unwrap();
        assert_eq!(link.read_line(Duration::from_millis(300)).unwrap(), None);
        assert_eq!(clock.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn test_settle_delay_applied_on_open() {
        let clock = ManualClock::new();
        let transport =
            SimulatedTransport::with_clock(clock.clone()).settle(Duration::from_secs(2));
        let _a = transport.open().unwrap();
        let _b = transport.open().unwrap();
        assert_eq!(clock.elapsed(), Duration::from_secs(4));
    }
}
