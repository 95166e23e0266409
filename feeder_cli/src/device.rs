//! Device commands: backend selection and reply rendering.

use eyre::WrapErr;
use feeder_config::{BackendKind, Config};
use feeder_core::{Feeder, ReplyStatus, SensorChannel, SensorReading, Timing};
use feeder_hardware::SimulatedTransport;
use feeder_traits::Transport;
use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::Commands;

/// Makes the simulated board accept commands and never answer.
pub const SIM_SILENT_ENV: &str = "FEEDER_TEST_SIM_SILENT";

/// JSON body to print and the status it carries.
pub struct Outcome {
    pub body: Value,
    pub status: ReplyStatus,
}

impl Outcome {
    fn of<S: Serialize>(status: ReplyStatus, reply: &S) -> eyre::Result<Self> {
        Ok(Self {
            body: serde_json::to_value(reply).wrap_err("failed to encode reply")?,
            status,
        })
    }
}

/// Run a device command on the backend selected in `cfg`.
pub fn run(cfg: &Config, cmd: &Commands) -> eyre::Result<Outcome> {
    let timing = Timing::from(cfg);
    match cfg.backend.kind {
        BackendKind::Simulated => {
            let silent = std::env::var(SIM_SILENT_ENV).is_ok_and(|v| v == "1");
            tracing::debug!(silent, "using simulated board");
            let transport = SimulatedTransport::new().silent(silent);
            execute(&build(transport, timing)?, "simulated", cmd)
        }
        BackendKind::Serial => run_serial(cfg, timing, cmd),
    }
}

#[cfg(feature = "hardware")]
fn run_serial(cfg: &Config, timing: Timing, cmd: &Commands) -> eyre::Result<Outcome> {
    use feeder_hardware::SerialTransport;
    use std::time::Duration;

    tracing::debug!(port = %cfg.serial.port, baud = cfg.serial.baud_rate, "using serial board");
    let transport = SerialTransport::new(
        cfg.serial.port.clone(),
        cfg.serial.baud_rate,
        Duration::from_millis(cfg.serial.settle_ms),
    );
    execute(&build(transport, timing)?, "serial", cmd)
}

#[cfg(not(feature = "hardware"))]
fn run_serial(_cfg: &Config, _timing: Timing, _cmd: &Commands) -> eyre::Result<Outcome> {
    eyre::bail!(
        "the serial backend requires the `hardware` feature; set backend.kind = \"simulated\" to run without a board"
    )
}

fn build<T: Transport>(transport: T, timing: Timing) -> eyre::Result<Feeder<T>> {
    Ok(Feeder::builder()
        .with_transport(transport)
        .with_timing(timing)
        .build()?)
}

fn execute<T: Transport>(
    feeder: &Feeder<T>,
    backend: &str,
    cmd: &Commands,
) -> eyre::Result<Outcome> {
    match cmd {
        Commands::ReadSensor { tag } => {
            let r = feeder.read_sensor_reply(tag);
            Outcome::of(r.status(), &r)
        }
        Commands::Motor => {
            let r = feeder.activate_motor_reply();
            Outcome::of(r.status(), &r)
        }
        Commands::Pump => {
            let r = feeder.activate_pump_reply();
            Outcome::of(r.status(), &r)
        }
        Commands::Tare { scale } => {
            let r = feeder.calibrate_tare(scale);
            Outcome::of(r.status, &r)
        }
        Commands::Calibrate { scale, grams } => {
            let r = feeder.calibrate_set_weight(scale, *grams);
            Outcome::of(r.status, &r)
        }
        Commands::SelfCheck => self_check(feeder, backend),
        Commands::Channels | Commands::Schedule { .. } => {
            eyre::bail!("not a device command")
        }
    }
}

fn self_check<T: Transport>(feeder: &Feeder<T>, backend: &str) -> eyre::Result<Outcome> {
    let mut channels = serde_json::Map::new();
    let mut answered = 0;
    for channel in SensorChannel::ALL {
        let value = match feeder.read_sensor(channel)? {
            SensorReading::Value { value, .. } => {
                answered += 1;
                Value::String(value)
            }
            SensorReading::NoResponse { .. } => Value::Null,
        };
        channels.insert(channel.tag().to_string(), value);
    }
    let status = if answered == SensorChannel::ALL.len() {
        ReplyStatus::Ok
    } else {
        ReplyStatus::NoResponse
    };
    tracing::info!(backend, answered, "self-check finished");
    Ok(Outcome {
        body: json!({ "status": status, "backend": backend, "channels": channels }),
        status,
    })
}

/// Sensor tags and their command codes; needs no board.
pub fn channels() -> Value {
    Value::Array(
        SensorChannel::ALL
            .iter()
            .map(|c| json!({ "tag": c.tag(), "code": char::from(c.code()).to_string() }))
            .collect(),
    )
}
