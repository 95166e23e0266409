use feeder_config::{BackendKind, load_file, load_toml};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

#[test]
fn empty_file_yields_board_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults should validate");
    assert_eq!(cfg.serial.port, "/dev/ttyAMA10");
    assert_eq!(cfg.serial.baud_rate, 115_200);
    assert_eq!(cfg.serial.settle_ms, 2000);
    assert_eq!(cfg.timeouts.sensor_ms, 2000);
    assert_eq!(cfg.timeouts.calibration_ms, 5000);
    assert_eq!(cfg.backend.kind, BackendKind::Serial);
    assert_eq!(cfg.schedule.default_times, vec!["08:00", "18:00"]);
}

#[test]
fn accepts_full_simulated_config() {
    let toml = r#"
[serial]
port = "/dev/ttyUSB0"
baud_rate = 115200
settle_ms = 0
read_slice_ms = 20

[timeouts]
sensor_ms = 200
calibration_ms = 500

[backend]
kind = "simulated"

[schedule]
default_times = ["07:30", "19:00"]

[logging]
level = "debug"
rotation = "daily"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.backend.kind, BackendKind::Simulated);
    assert_eq!(cfg.timeouts.sensor_ms, 200);
}

#[rstest]
#[case("[serial]\nbaud_rate = 0", "baud_rate must be > 0")]
#[case("[serial]\nport = \"\"", "serial.port must be set")]
#[case("[serial]\nsettle_ms = 120000", "settle_ms is unreasonably large")]
#[case("[timeouts]\nsensor_ms = 0", "sensor_ms must be >= 1")]
#[case("[timeouts]\ncalibration_ms = 0", "calibration_ms must be >= 1")]
#[case("[serial]\nread_slice_ms = 3000", "read_slice_ms must not exceed")]
#[case("[schedule]\ndefault_times = [\"8:00\"]", "'8:00' is not a valid")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        err.to_string().contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[test]
fn empty_port_is_fine_for_simulator() {
    let cfg = load_toml("[serial]\nport = \"\"\n[backend]\nkind = \"simulated\"").unwrap();
    cfg.validate().expect("simulator does not need a port");
}

#[test]
fn sample_ms_alias_is_accepted() {
    let cfg = load_toml("[timeouts]\nsample_ms = 750").unwrap();
    assert_eq!(cfg.timeouts.sensor_ms, 750);
}

#[test]
fn load_file_reports_path_on_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("feeder.toml");
    fs::write(&path, "[backend]\nkind = \"bluetooth\"\n").unwrap();
    let err = load_file(&path).expect_err("unknown backend must fail");
    assert!(err.to_string().contains("feeder.toml"));
}

#[test]
fn load_file_wraps_validation_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("feeder.toml");
    fs::write(&path, "[serial]\nbaud_rate = 0\n").unwrap();
    let err = load_file(&path).expect_err("zero baud must fail");
    assert!(err.to_string().contains("feeder.toml"));
    assert!(format!("{err:#}").contains("baud_rate"));
}
