use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn silent_board(args: &[&str]) -> assert_cmd::assert::Assert {
    let dir = tempdir().unwrap();
    let toml = r#"
[backend]
kind = "simulated"

[serial]
read_slice_ms = 10

[timeouts]
sensor_ms = 100
calibration_ms = 100
"#;
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, toml).unwrap();

    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    cmd.env("FEEDER_TEST_SIM_SILENT", "1");
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }
    cmd.assert()
}

#[rstest]
fn silent_sensor_bubbles_to_cli() {
    silent_board(&["read-sensor", "PESO_A"])
        .code(2)
        .stdout(predicate::str::contains("No se recibió respuesta."))
        .stdout(predicate::str::contains("no_response"));
}

#[rstest]
#[case(&["tare", "B"])]
#[case(&["calibrate", "A", "--grams", "200"])]
fn silent_calibration_is_no_response(#[case] args: &[&str]) {
    silent_board(args)
        .code(2)
        .stdout(predicate::str::contains("\"status\":\"no_response\""));
}

#[rstest]
fn silent_self_check_reports_nulls() {
    silent_board(&["self-check"])
        .code(2)
        .stdout(predicate::str::contains("\"PESO_A\":null"));
}

#[rstest]
fn actuators_need_no_answer() {
    silent_board(&["motor"]).success();
}
