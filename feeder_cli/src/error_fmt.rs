//! Human-readable error descriptions, exit codes and structured JSON errors.

use feeder_core::{FeederError, ReplyStatus};
use serde_json::json;

pub const EXIT_OK: i32 = 0;
pub const EXIT_GENERIC: i32 = 1;
pub const EXIT_NO_RESPONSE: i32 = 2;
pub const EXIT_CONNECTION: i32 = 3;
pub const EXIT_VALIDATION: i32 = 4;
pub const EXIT_STORAGE: i32 = 5;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(fe) = err.downcast_ref::<FeederError>() {
        return match fe {
            FeederError::Connection(msg) => format!(
                "What happened: Could not open the link to the feeder board ({msg}).\nLikely causes: Wrong serial.port, board unplugged, or no permission on the device.\nHow to fix: Check [serial] port in the config and the device permissions, or set backend.kind = \"simulated\"."
            ),
            FeederError::Timeout => "What happened: The board did not answer in time.\nLikely causes: Board still resetting after the port opened, or a deadline set too low.\nHow to fix: Raise serial.settle_ms or the [timeouts] values in the config.".to_string(),
            FeederError::Validation(msg) => format!(
                "What happened: Invalid input ({msg}).\nLikely causes: Unknown sensor tag or scale, a weight out of range, or a time not written as HH:MM.\nHow to fix: Run `feeder channels` for valid tags; scales are A or B; times look like 08:00."
            ),
            FeederError::Storage(msg) => format!(
                "What happened: Saving the schedule failed ({msg}).\nLikely causes: State file not writable or corrupted.\nHow to fix: Check the --state path and its permissions; nothing was changed."
            ),
            FeederError::NotFound(what) => format!(
                "What happened: {what} does not exist.\nLikely causes: It was never added or was removed.\nHow to fix: Add it with `feeder schedule add-dispenser` or `add-pet` first."
            ),
            FeederError::Conflict(msg) => format!(
                "What happened: {msg}.\nLikely causes: The record was created before.\nHow to fix: Use `feeder schedule set` to replace its times."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("requires the `hardware` feature") {
        return format!(
            "What happened: {msg}.\nLikely causes: Binary built without serial support.\nHow to fix: Rebuild with `--features hardware`, or use the simulated backend."
        );
    }

    if lower.contains("config") {
        let cause = err
            .chain()
            .skip(1)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ");
        return format!(
            "What happened: Configuration is invalid or unreadable ({msg}{}{cause}).\nLikely causes: Typo in a key, or an out-of-range value.\nHow to fix: Edit the TOML config and try again.",
            if cause.is_empty() { "" } else { ": " }
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<FeederError>() {
        Some(FeederError::Timeout) => EXIT_NO_RESPONSE,
        Some(FeederError::Connection(_)) => EXIT_CONNECTION,
        Some(FeederError::Validation(_)) => EXIT_VALIDATION,
        Some(FeederError::Storage(_)) => EXIT_STORAGE,
        _ => EXIT_GENERIC,
    }
}

pub fn exit_code_for_status(status: ReplyStatus) -> i32 {
    match status {
        ReplyStatus::Ok => EXIT_OK,
        ReplyStatus::NoResponse => EXIT_NO_RESPONSE,
        ReplyStatus::ConnectionError => EXIT_CONNECTION,
        ReplyStatus::ValidationError => EXIT_VALIDATION,
        ReplyStatus::Error => EXIT_GENERIC,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<FeederError>() {
        Some(FeederError::Connection(_)) => "Connection",
        Some(FeederError::Timeout) => "Timeout",
        Some(FeederError::Validation(_)) => "Validation",
        Some(FeederError::Storage(_)) => "Storage",
        Some(FeederError::NotFound(_)) => "NotFound",
        Some(FeederError::Conflict(_)) => "Conflict",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FeederError::Timeout, 2, "did not answer")]
    #[case(FeederError::Connection("busy".into()), 3, "Could not open")]
    #[case(FeederError::Validation("bad tag".into()), 4, "Invalid input")]
    #[case(FeederError::Storage("disk full".into()), 5, "Saving the schedule failed")]
    #[case(FeederError::NotFound("pet 3".into()), 1, "pet 3 does not exist")]
    fn typed_errors(#[case] e: FeederError, #[case] code: i32, #[case] needle: &str) {
        let report = eyre::Report::new(e);
        assert_eq!(exit_code_for_error(&report), code);
        assert!(humanize(&report).contains(needle));
    }

    #[test]
    fn wrapped_errors_keep_their_code() {
        use eyre::WrapErr;
        let r: Result<(), FeederError> = Err(FeederError::Validation("x".into()));
        let report = r.wrap_err("schedule set").unwrap_err();
        assert_eq!(exit_code_for_error(&report), EXIT_VALIDATION);
    }

    #[test]
    fn json_error_has_reason_and_message() {
        let report = eyre::Report::new(FeederError::Timeout);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&report)).unwrap();
        assert_eq!(v["reason"], "Timeout");
        assert!(v["message"].as_str().unwrap().starts_with("What happened"));
    }
}
