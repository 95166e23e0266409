#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the feeder controller.
//!
//! Every section is optional; missing values fall back to the defaults the
//! board was tuned with (115200 baud, 2 s settle, 2 s sensor deadline, 5 s
//! calibration deadline). `Config::validate` rejects values that would make
//! an operation hang or never succeed.
use eyre::WrapErr;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialCfg {
    /// Device path of the UART wired to the microcontroller.
    pub port: String,
    pub baud_rate: u32,
    /// Delay after opening while the board resets (ms).
    pub settle_ms: u64,
    /// Per-read wait used inside polling loops (ms).
    pub read_slice_ms: u64,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            port: "/dev/ttyAMA10".to_string(),
            baud_rate: 115_200,
            settle_ms: 2000,
            read_slice_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Timeouts {
    /// Deadline for a sensor reply (ms). Also accepts alias "sample_ms".
    #[serde(alias = "sample_ms")]
    pub sensor_ms: u64,
    /// Deadline for each calibration step (ms).
    pub calibration_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            sensor_ms: 2000,
            calibration_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Serial,
    Simulated,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BackendCfg {
    pub kind: BackendKind,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleCfg {
    /// Times given to a pet the first time it is linked to a dispenser.
    pub default_times: Vec<String>,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            default_times: vec!["08:00".to_string(), "18:00".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub serial: SerialCfg,
    pub timeouts: Timeouts,
    pub backend: BackendCfg,
    pub schedule: ScheduleCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Shape check for `HH:MM` (two-digit hour 00..=23, minute 00..=59).
fn is_hh_mm(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 5 || b[2] != b':' {
        return false;
    }
    let digits = [b[0], b[1], b[3], b[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hour = (b[0] - b'0') * 10 + (b[1] - b'0');
    let minute = (b[3] - b'0') * 10 + (b[4] - b'0');
    hour <= 23 && minute <= 59
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.backend.kind == BackendKind::Serial && self.serial.port.trim().is_empty() {
            eyre::bail!("serial.port must be set for the serial backend");
        }
        if self.serial.baud_rate == 0 {
            eyre::bail!("serial.baud_rate must be > 0");
        }
        if self.serial.settle_ms > 60 * 1000 {
            eyre::bail!("serial.settle_ms is unreasonably large (>60s)");
        }
        if self.serial.read_slice_ms == 0 {
            eyre::bail!("serial.read_slice_ms must be >= 1");
        }

        // Timeouts
        if self.timeouts.sensor_ms == 0 {
            eyre::bail!("timeouts.sensor_ms must be >= 1");
        }
        if self.timeouts.calibration_ms == 0 {
            eyre::bail!("timeouts.calibration_ms must be >= 1");
        }
        if self.serial.read_slice_ms > self.timeouts.sensor_ms
            || self.serial.read_slice_ms > self.timeouts.calibration_ms
        {
            eyre::bail!(
                "serial.read_slice_ms must not exceed timeouts.sensor_ms or timeouts.calibration_ms"
            );
        }

        // Schedule
        if let Some(bad) = self.schedule.default_times.iter().find(|t| !is_hh_mm(t)) {
            eyre::bail!("schedule.default_times entry '{bad}' is not a valid HH:MM time");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hh_mm_shape() {
        assert!(is_hh_mm("00:00"));
        assert!(is_hh_mm("23:59"));
        assert!(!is_hh_mm("8:00"));
        assert!(!is_hh_mm("24:00"));
        assert!(!is_hh_mm("12:60"));
        assert!(!is_hh_mm("12-30"));
    }
}
