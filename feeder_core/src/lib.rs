#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Pet feeder control logic (hardware-agnostic).
//!
//! All board I/O goes through `feeder_traits::Transport`; this crate never
//! touches a serial port directly.
//!
//! ## Architecture
//!
//! - **Protocol**: single-byte commands and tagged reply lines (`protocol`)
//! - **Device**: sensor reads and actuator commands over a per-call link (`device`)
//! - **Calibration**: tare and known-weight steps for the two scales (`calibration`)
//! - **Replies**: JSON-ready records for every caller-facing operation (`reply`)
//! - **Schedule**: per-pet records aggregated into dispenser times (`schedule`)
//! - **Store**: atomic JSON snapshot of the schedule state (`store`)

pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod device;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod protocol;
pub mod reply;
pub mod schedule;
pub mod status;
pub mod store;

pub use builder::FeederBuilder;
pub use calibration::MAX_KNOWN_WEIGHT_G;
pub use config::Timing;
pub use device::Feeder;
pub use error::{FeederError, Result};
pub use protocol::{Scale, SensorChannel};
pub use reply::{ActionReply, CalibrationReply, ReplyStatus, SensorReply, TareReply};
pub use schedule::{
    Dispenser, DispenserId, Pet, PetId, ScheduleBook, ScheduleRecord, ScheduleSink,
    ScheduleSnapshot, TimeOfDay, UserId,
};
pub use status::{CalibrationState, SensorReading, TareOutcome, WeightOutcome};
