use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Simulated board with short deadlines so silent cases finish quickly
fn write_sim_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[backend]
kind = "simulated"

[serial]
read_slice_ms = 20

[timeouts]
sensor_ms = 300
calibration_ms = 300
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["read-sensor", "PESO_A"], 0, "\"PESO_A\"", "stdout")]
#[case(&["read-sensor", "distancia_b"], 0, "\"DISTANCIA_B\"", "stdout")]
#[case(&["read-sensor", "TEMPERATURA"], 4, "validation_error", "stdout")]
#[case(&["read-sensor"], 2, "required", "stderr")]
#[case(&["motor"], 0, "Comando de activación de motor ejecutado.", "stdout")]
#[case(&["pump"], 0, "Comando de activación de bomba ejecutado.", "stdout")]
#[case(&["tare", "A"], 0, "lista para calibrar", "stdout")]
#[case(&["tare", "C"], 4, "validation_error", "stdout")]
#[case(&["calibrate", "A", "--grams", "500"], 0, "Nuevo factor: 425.00", "stdout")]
#[case(&["calibrate", "B", "--grams", "-1"], 4, "validation_error", "stdout")]
#[case(&["channels"], 0, "\"code\":\"4\"", "stdout")]
#[case(&["self-check"], 0, "\"status\":\"ok\"", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);

    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();

    // Always include a config to avoid relying on the default path
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn sensor_reply_is_one_json_object() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);

    let out = Command::cargo_bin("feeder_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("read-sensor")
        .arg("PESO_B")
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let value = v["PESO_B"].as_str().unwrap();
    let grams: u32 = value.trim_end_matches(" g").parse().unwrap();
    assert!((10..=50).contains(&grams), "out of range: {value}");
}

#[rstest]
#[case("[serial]\nbaud_rate = 0\n", "baud_rate")]
#[case("[timeouts]\nsensor_ms = 0\n", "sensor_ms")]
#[case("[schedule]\ndefault_times = [\"8:00\"]\n", "8:00")]
#[case("[backend]\nkind = \"bluetooth\"\n", "Configuration")]
fn invalid_config_is_reported(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, toml).unwrap();

    Command::cargo_bin("feeder_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("channels")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[serial]\nbaud_rate = 0\n").unwrap();

    let out = Command::cargo_bin("feeder_cli")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("motor")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let line = String::from_utf8(out.stderr).unwrap();
    let last = line.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "Error");
    assert!(v["message"].as_str().unwrap().contains("What happened"));
}

#[cfg(not(feature = "hardware"))]
#[rstest]
fn serial_backend_needs_hardware_feature() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("serial.toml");
    fs::write(&cfg, "[backend]\nkind = \"serial\"\n").unwrap();

    Command::cargo_bin("feeder_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("motor")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--features hardware"));
}

#[rstest]
fn missing_config_file_is_reported() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("feeder_cli")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("channels")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}
