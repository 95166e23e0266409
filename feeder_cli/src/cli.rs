//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Used when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG: &str = "etc/feeder.toml";

#[derive(Parser, Debug)]
#[command(name = "feeder", version, about = "Pet feeder CLI")]
pub struct Cli {
    /// Path to config TOML (defaults to etc/feeder.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines and print errors as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read one sensor (PESO_A, PESO_B, DISTANCIA_A, DISTANCIA_B)
    ReadSensor {
        #[arg(value_name = "TAG")]
        tag: String,
    },
    /// Start the feed motor
    Motor,
    /// Start the water pump
    Pump,
    /// Calibration step one: tare a scale (A or B)
    Tare {
        #[arg(value_name = "SCALE")]
        scale: String,
    },
    /// Calibration step two: apply a known weight to a tared scale
    Calibrate {
        #[arg(value_name = "SCALE")]
        scale: String,
        /// Reference weight in grams
        #[arg(long, allow_negative_numbers = true)]
        grams: f32,
    },
    /// List the sensor channels and their command codes
    Channels,
    /// Read every sensor once and report which ones answered
    SelfCheck,
    /// Manage dispensers, pets and feeding schedules
    Schedule {
        /// JSON state file holding dispensers, pets and schedule records
        #[arg(long, value_name = "FILE", default_value = "feeder_state.json")]
        state: PathBuf,
        #[command(subcommand)]
        action: ScheduleCmd,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScheduleCmd {
    /// Register a dispenser
    AddDispenser {
        id: u64,
        #[arg(long)]
        owner: u64,
    },
    /// Register a pet, or change its owner
    AddPet {
        id: u64,
        #[arg(long)]
        owner: u64,
    },
    /// Link a pet to a dispenser (creates the default schedule on first link)
    Link {
        #[arg(long)]
        pet: u64,
        #[arg(long)]
        dispenser: u64,
    },
    /// Create or replace a pet's times (HH:MM) on a dispenser
    Set {
        #[arg(long)]
        pet: u64,
        /// Defaults to the dispenser linked to the pet
        #[arg(long)]
        dispenser: Option<u64>,
        #[arg(value_name = "HH:MM")]
        times: Vec<String>,
    },
    /// Delete a pet's schedule on a dispenser
    Remove {
        #[arg(long)]
        pet: u64,
        #[arg(long)]
        dispenser: u64,
    },
    /// Delete a pet and all of its schedules
    RemovePet { id: u64 },
    /// Delete a dispenser and all schedules on it
    RemoveDispenser { id: u64 },
    /// Show one dispenser with its records, or the whole state
    Show {
        #[arg(long)]
        dispenser: Option<u64>,
    },
}
