//! Two-step scale calibration: tare, then apply a known weight.
//!
//! The board keeps no memory between links, so the second step re-selects
//! the scale before sending the weight. The two calls are correlated only by
//! the caller passing the same scale twice.

use feeder_traits::Transport;
use feeder_traits::clock::Clock;
use tracing::{info, warn};

use crate::device::{Feeder, Polled};
use crate::error::{FeederError, Result};
use crate::protocol::{Command, Scale, is_calibrated_line, is_ready_line, parse_factor};
use crate::status::{CalibrationFailure, TareOutcome, WeightOutcome};

/// Largest reference weight the load cells accept, in grams.
pub const MAX_KNOWN_WEIGHT_G: f32 = 50_000.0;

impl<T: Transport, C: Clock> Feeder<T, C> {
    /// Step one: zero `scale` and wait for the board to ask for a weight.
    pub fn tare(&self, scale: Scale) -> Result<TareOutcome> {
        let timeout = self.timing().calibration;
        self.with_link(|link| {
            self.clear(link)?;
            self.send(link, &[Command::SelectScale(scale).code()])?;
            let polled = self.poll_lines(link, timeout, |line| {
                is_ready_line(line).then(|| line.to_string())
            })?;
            Ok(match polled {
                Polled::Found(message) => {
                    info!(%scale, %message, "scale tared");
                    TareOutcome::Ready { scale, message }
                }
                Polled::Expired { last_line } => {
                    warn!(%scale, ?last_line, "scale did not confirm tare");
                    TareOutcome::NotReady { scale, last_line }
                }
            })
        })
    }

    /// Step two: send the reference weight and read back the new factor.
    ///
    /// `grams` must be finite, positive and at most [`MAX_KNOWN_WEIGHT_G`];
    /// anything else is rejected before the port is opened.
    pub fn apply_known_weight(&self, scale: Scale, grams: f32) -> Result<WeightOutcome> {
        validate_known_weight(grams)?;
        let timeout = self.timing().calibration;
        self.with_link(|link| {
            self.clear(link)?;
            self.send(link, &[Command::SelectScale(scale).code()])?;
            self.send(link, format!("{grams}\n").as_bytes())?;

            let mut factor = None;
            let mut completed = false;
            let polled = self.poll_lines(link, timeout, |line| {
                if let Some(f) = parse_factor(line) {
                    factor = Some(f);
                }
                if is_calibrated_line(line) {
                    completed = true;
                }
                match (completed, factor) {
                    (true, Some(f)) => Some((f, line.to_string())),
                    _ => None,
                }
            })?;

            Ok(match polled {
                Polled::Found((factor, message)) => {
                    info!(%scale, grams, factor, "scale calibrated");
                    WeightOutcome::Calibrated {
                        scale,
                        factor,
                        message,
                    }
                }
                Polled::Expired { last_line } => {
                    let reason = if completed {
                        CalibrationFailure::MissingFactor
                    } else {
                        CalibrationFailure::NoCompletion
                    };
                    warn!(%scale, ?reason, ?last_line, "calibration not confirmed");
                    WeightOutcome::Failed {
                        scale,
                        reason,
                        last_line,
                    }
                }
            })
        })
    }
}

fn validate_known_weight(grams: f32) -> Result<()> {
    if !grams.is_finite() || grams <= 0.0 {
        return Err(FeederError::Validation(format!(
            "known weight must be a positive number of grams, got {grams}"
        )));
    }
    if grams > MAX_KNOWN_WEIGHT_G {
        return Err(FeederError::Validation(format!(
            "known weight {grams} g exceeds {MAX_KNOWN_WEIGHT_G} g"
        )));
    }
    Ok(())
}
