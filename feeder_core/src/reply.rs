//! Caller-facing replies.
//!
//! Every device operation has a `*_reply` form that never fails: errors and
//! silent boards are folded into a structured record that serializes straight
//! to JSON.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use feeder_traits::Transport;
use feeder_traits::clock::Clock;

use crate::device::Feeder;
use crate::error::FeederError;
use crate::protocol::{Scale, SensorChannel};
use crate::status::{CalibrationFailure, SensorReading, TareOutcome, WeightOutcome};

pub const NO_RESPONSE_MSG: &str = "No se recibió respuesta.";
pub const MOTOR_MSG: &str = "Comando de activación de motor ejecutado.";
pub const PUMP_MSG: &str = "Comando de activación de bomba ejecutado.";
pub const MISSING_FACTOR_MSG: &str = "Calibración completada, pero no se pudo leer el factor.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    NoResponse,
    ConnectionError,
    ValidationError,
    Error,
}

impl ReplyStatus {
    pub fn is_ok(self) -> bool {
        self == ReplyStatus::Ok
    }
}

impl From<&FeederError> for ReplyStatus {
    fn from(e: &FeederError) -> Self {
        match e {
            FeederError::Connection(_) => ReplyStatus::ConnectionError,
            FeederError::Timeout => ReplyStatus::NoResponse,
            FeederError::Validation(_) => ReplyStatus::ValidationError,
            _ => ReplyStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReply {
    pub status: ReplyStatus,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<FeederError> for ErrorReply {
    fn from(e: FeederError) -> Self {
        Self {
            status: ReplyStatus::from(&e),
            error: e.to_string(),
            detail: None,
        }
    }
}

/// `{"PESO_A": "123.4"}` or an [`ErrorReply`].
#[derive(Debug, Clone, PartialEq)]
pub enum SensorReply {
    Value {
        channel: SensorChannel,
        value: String,
    },
    Failed(ErrorReply),
}

impl SensorReply {
    pub fn status(&self) -> ReplyStatus {
        match self {
            SensorReply::Value { .. } => ReplyStatus::Ok,
            SensorReply::Failed(e) => e.status,
        }
    }
}

impl Serialize for SensorReply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SensorReply::Value { channel, value } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(channel.tag(), value)?;
                map.end()
            }
            SensorReply::Failed(e) => e.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionReply {
    Done { message: String },
    Failed(ErrorReply),
}

impl ActionReply {
    pub fn status(&self) -> ReplyStatus {
        match self {
            ActionReply::Done { .. } => ReplyStatus::Ok,
            ActionReply::Failed(e) => e.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TareReply {
    pub status: ReplyStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<TareOutcome> for TareReply {
    fn from(o: TareOutcome) -> Self {
        match o {
            TareOutcome::Ready { message, .. } => Self {
                status: ReplyStatus::Ok,
                message,
                detail: None,
            },
            TareOutcome::NotReady { last_line, .. } => Self {
                status: ReplyStatus::NoResponse,
                message: last_line.unwrap_or_else(|| NO_RESPONSE_MSG.to_string()),
                detail: None,
            },
        }
    }
}

impl From<FeederError> for TareReply {
    fn from(e: FeederError) -> Self {
        Self {
            status: ReplyStatus::from(&e),
            message: e.to_string(),
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReply {
    pub status: ReplyStatus,
    pub message: String,
    pub factor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<WeightOutcome> for CalibrationReply {
    fn from(o: WeightOutcome) -> Self {
        match o {
            WeightOutcome::Calibrated {
                factor, message, ..
            } => Self {
                status: ReplyStatus::Ok,
                message,
                factor: Some(factor),
                detail: None,
            },
            WeightOutcome::Failed {
                reason: CalibrationFailure::NoCompletion,
                last_line,
                ..
            } => Self {
                status: ReplyStatus::NoResponse,
                message: last_line.unwrap_or_else(|| NO_RESPONSE_MSG.to_string()),
                factor: None,
                detail: None,
            },
            WeightOutcome::Failed {
                reason: CalibrationFailure::MissingFactor,
                last_line,
                ..
            } => Self {
                status: ReplyStatus::Error,
                message: MISSING_FACTOR_MSG.to_string(),
                factor: None,
                detail: last_line,
            },
        }
    }
}

impl From<FeederError> for CalibrationReply {
    fn from(e: FeederError) -> Self {
        Self {
            status: ReplyStatus::from(&e),
            message: e.to_string(),
            factor: None,
            detail: None,
        }
    }
}

impl<T: Transport, C: Clock> Feeder<T, C> {
    /// Read a sensor by its tag (`PESO_A`, `distancia_b`, ...).
    pub fn read_sensor_reply(&self, tag: &str) -> SensorReply {
        let reading = tag
            .parse::<SensorChannel>()
            .and_then(|channel| self.read_sensor(channel));
        match reading {
            Ok(SensorReading::Value { channel, value }) => SensorReply::Value { channel, value },
            Ok(SensorReading::NoResponse { channel }) => SensorReply::Failed(ErrorReply {
                status: ReplyStatus::NoResponse,
                error: NO_RESPONSE_MSG.to_string(),
                detail: Some(channel.tag().to_string()),
            }),
            Err(e) => SensorReply::Failed(e.into()),
        }
    }

    pub fn activate_motor_reply(&self) -> ActionReply {
        match self.activate_motor() {
            Ok(()) => ActionReply::Done {
                message: MOTOR_MSG.to_string(),
            },
            Err(e) => ActionReply::Failed(e.into()),
        }
    }

    pub fn activate_pump_reply(&self) -> ActionReply {
        match self.activate_pump() {
            Ok(()) => ActionReply::Done {
                message: PUMP_MSG.to_string(),
            },
            Err(e) => ActionReply::Failed(e.into()),
        }
    }

    /// Tare the scale named `scale` (`A` or `B`).
    pub fn calibrate_tare(&self, scale: &str) -> TareReply {
        match scale.parse::<Scale>().and_then(|s| self.tare(s)) {
            Ok(outcome) => outcome.into(),
            Err(e) => e.into(),
        }
    }

    /// Apply a known weight to the scale named `scale`.
    pub fn calibrate_set_weight(&self, scale: &str, grams: f32) -> CalibrationReply {
        match scale
            .parse::<Scale>()
            .and_then(|s| self.apply_known_weight(s, grams))
        {
            Ok(outcome) => outcome.into(),
            Err(e) => e.into(),
        }
    }
}
