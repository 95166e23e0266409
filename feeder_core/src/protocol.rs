//! Wire vocabulary of the feeder board.
//!
//! Requests are single ASCII bytes. Replies are newline-terminated text lines
//! of the form `<TAG> => <value>` or `<TAG>: <value>`; anything else the
//! board prints (boot banners, debug chatter) is unrecognized and skipped.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FeederError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorChannel {
    PesoA,
    PesoB,
    DistanciaA,
    DistanciaB,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 4] = [
        SensorChannel::PesoA,
        SensorChannel::PesoB,
        SensorChannel::DistanciaA,
        SensorChannel::DistanciaB,
    ];

    /// Request byte that selects this channel.
    pub const fn code(self) -> u8 {
        match self {
            SensorChannel::PesoA => b'1',
            SensorChannel::PesoB => b'2',
            SensorChannel::DistanciaA => b'3',
            SensorChannel::DistanciaB => b'4',
        }
    }

    /// Tag the board prints in front of this channel's value.
    pub const fn tag(self) -> &'static str {
        match self {
            SensorChannel::PesoA => "PESO_A",
            SensorChannel::PesoB => "PESO_B",
            SensorChannel::DistanciaA => "DISTANCIA_A",
            SensorChannel::DistanciaB => "DISTANCIA_B",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Exact tag match, as printed by the board.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Parses caller input; case-insensitive, surrounding whitespace ignored.
impl FromStr for SensorChannel {
    type Err = FeederError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                FeederError::validation(format!(
                    "unknown sensor '{s}' (expected one of PESO_A, PESO_B, DISTANCIA_A, DISTANCIA_B)"
                ))
            })
    }
}

/// One of the two load cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scale {
    A,
    B,
}

impl Scale {
    /// Byte that selects (and tares) this scale for calibration.
    pub const fn code(self) -> u8 {
        match self {
            Scale::A => b'c',
            Scale::B => b'd',
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scale::A => "A",
            Scale::B => "B",
        })
    }
}

impl FromStr for Scale {
    type Err = FeederError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Scale::A),
            "B" | "b" => Ok(Scale::B),
            other => Err(FeederError::validation(format!(
                "unknown scale '{other}' (expected A or B)"
            ))),
        }
    }
}

/// Requests the board understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ReadSensor(SensorChannel),
    Motor,
    Pump,
    SelectScale(Scale),
}

impl Command {
    pub const fn code(self) -> u8 {
        match self {
            Command::ReadSensor(ch) => ch.code(),
            Command::Motor => b'r',
            Command::Pump => b'b',
            Command::SelectScale(scale) => scale.code(),
        }
    }
}

/// A reply line, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine {
    Reading {
        channel: SensorChannel,
        value: String,
    },
    Unrecognized(String),
}

impl ResponseLine {
    /// Classify one line.
    ///
    /// The head (text before the first `=>` or `:`) must end in a known tag
    /// as a whole word. The value is the trimmed text after `=>`, or after the
    /// last `:` for the colon form. An empty value is unrecognized.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let split = if let Some((head, value)) = line.split_once("=>") {
            Some((head, value))
        } else {
            match (line.find(':'), line.rfind(':')) {
                (Some(first), Some(last)) => Some((&line[..first], &line[last + 1..])),
                _ => None,
            }
        };

        let Some((head, value)) = split else {
            return ResponseLine::Unrecognized(line.to_string());
        };
        let channel = head
            .split_whitespace()
            .next_back()
            .and_then(SensorChannel::from_tag);
        let value = value.trim();
        match channel {
            Some(channel) if !value.is_empty() => ResponseLine::Reading {
                channel,
                value: value.to_string(),
            },
            _ => ResponseLine::Unrecognized(line.to_string()),
        }
    }

    /// The value if this line is a reading for `channel`.
    pub fn value_for(&self, channel: SensorChannel) -> Option<&str> {
        match self {
            ResponseLine::Reading { channel: c, value } if *c == channel => Some(value),
            _ => None,
        }
    }
}

const READY_MARKERS: [&str; 2] = ["gramos", "lista para calibrar"];
const DONE_MARKER: &str = "calibrada";

/// True when the board says the tared scale is waiting for a weight.
pub fn is_ready_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    READY_MARKERS.iter().any(|m| lower.contains(m))
}

/// True when the board reports calibration finished.
pub fn is_calibrated_line(line: &str) -> bool {
    line.to_lowercase().contains(DONE_MARKER)
}

fn factor_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)nuevo factor:\s*(-?\d+(?:\.\d+)?)\s*guardado").ok())
        .as_ref()
}

/// Extract the factor from `... Nuevo factor: <value> guardado ...`.
pub fn parse_factor(line: &str) -> Option<f32> {
    let caps = factor_regex()?.captures(line)?;
    caps.get(1)?.as_str().parse::<f32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("PESO_A: 123 g", SensorChannel::PesoA, "123 g")]
    #[case("PESO_B => 42.5 g", SensorChannel::PesoB, "42.5 g")]
    #[case("  DISTANCIA_A:17 cm \r", SensorChannel::DistanciaA, "17 cm")]
    #[case("Sensor DISTANCIA_B: raw: 9", SensorChannel::DistanciaB, "9")]
    fn parses_tagged_readings(
        #[case] line: &str,
        #[case] channel: SensorChannel,
        #[case] value: &str,
    ) {
        assert_eq!(
            ResponseLine::parse(line),
            ResponseLine::Reading {
                channel,
                value: value.to_string()
            }
        );
    }

    #[rstest]
    #[case("ets Jun  8 2016 00:22:57")]
    #[case("PESO_A:")]
    #[case("XPESO_A: 12")]
    #[case("peso_a: 12")]
    #[case("boot complete")]
    fn rejects_noise(#[case] line: &str) {
        assert!(matches!(
            ResponseLine::parse(line),
            ResponseLine::Unrecognized(_)
        ));
    }

    #[test]
    fn value_for_checks_channel() {
        let line = ResponseLine::parse("PESO_B: 7 g");
        assert_eq!(line.value_for(SensorChannel::PesoB), Some("7 g"));
        assert_eq!(line.value_for(SensorChannel::PesoA), None);
    }

    #[test]
    fn codes_round_trip() {
        for ch in SensorChannel::ALL {
            assert_eq!(SensorChannel::from_code(ch.code()), Some(ch));
            assert_eq!(ch.tag().parse::<SensorChannel>().unwrap(), ch);
        }
        assert_eq!(Command::Motor.code(), b'r');
        assert_eq!(Command::Pump.code(), b'b');
        assert_eq!(Command::SelectScale(Scale::A).code(), b'c');
        assert_eq!(Command::SelectScale(Scale::B).code(), b'd');
    }

    #[test]
    fn caller_input_is_validated() {
        assert_eq!(" peso_a ".parse::<SensorChannel>().unwrap(), SensorChannel::PesoA);
        assert!(matches!(
            "PESO_C".parse::<SensorChannel>(),
            Err(FeederError::Validation(_))
        ));
        assert_eq!("b".parse::<Scale>().unwrap(), Scale::B);
        assert!(matches!("C".parse::<Scale>(), Err(FeederError::Validation(_))));
    }

    #[test]
    fn calibration_markers() {
        assert!(is_ready_line("Balanza A lista para calibrar"));
        assert!(is_ready_line("Ingrese el peso conocido en GRAMOS"));
        assert!(!is_ready_line("PESO_A: 0 g"));
        assert!(is_calibrated_line("Balanza A calibrada. Nuevo factor: 421.37 guardado"));
        assert!(!is_calibrated_line("lista para calibrar"));
    }

    #[test]
    fn factor_extraction() {
        assert_eq!(
            parse_factor("Balanza A calibrada. Nuevo factor: 421.37 guardado"),
            Some(421.37)
        );
        assert_eq!(parse_factor("Nuevo factor: -12 guardado"), Some(-12.0));
        assert_eq!(parse_factor("Nuevo factor: abc guardado"), None);
        assert_eq!(parse_factor("calibrada"), None);
    }
}
