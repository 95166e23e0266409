//! Outcomes of device operations.
//!
//! A silent board is an expected outcome, so it is a variant here rather than
//! an error.

use crate::protocol::{Scale, SensorChannel};

#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    Value {
        channel: SensorChannel,
        value: String,
    },
    /// No line tagged for the channel arrived before the deadline.
    NoResponse { channel: SensorChannel },
}

/// Where a scale is in the two-step calibration dialogue.
///
/// Nothing is remembered between calls: the state is only what the last
/// step reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationState {
    Idle,
    Tared(Scale),
    Calibrated { scale: Scale, factor: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TareOutcome {
    Ready { scale: Scale, message: String },
    /// No readiness line before the deadline; retry the tare.
    NotReady {
        scale: Scale,
        last_line: Option<String>,
    },
}

impl TareOutcome {
    pub fn state(&self) -> CalibrationState {
        match self {
            TareOutcome::Ready { scale, .. } => CalibrationState::Tared(*scale),
            TareOutcome::NotReady { .. } => CalibrationState::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationFailure {
    /// The completion marker never arrived.
    NoCompletion,
    /// Completion was reported but no factor could be parsed.
    MissingFactor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeightOutcome {
    Calibrated {
        scale: Scale,
        factor: f32,
        message: String,
    },
    Failed {
        scale: Scale,
        reason: CalibrationFailure,
        last_line: Option<String>,
    },
}

impl WeightOutcome {
    pub fn state(&self) -> CalibrationState {
        match self {
            WeightOutcome::Calibrated { scale, factor, .. } => CalibrationState::Calibrated {
                scale: *scale,
                factor: *factor,
            },
            WeightOutcome::Failed { scale, .. } => CalibrationState::Tared(*scale),
        }
    }
}
