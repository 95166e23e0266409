//! Maps `Box<dyn Error>` from trait boundaries to typed `FeederError`.
//!
//! The traits in `feeder_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `feeder_hardware::HwError` downcasting.

use crate::error::FeederError;

/// Map a trait-boundary error raised while a link was in use.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> FeederError {
    #[cfg(feature = "hardware-errors")]
    {
        use feeder_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Open { .. } | HwError::DeviceReset => {
                    FeederError::Connection(hw.to_string())
                }
                HwError::Io(io) => FeederError::Io(io.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return FeederError::Io(io.to_string());
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        FeederError::Timeout
    } else {
        FeederError::Hardware(s)
    }
}

/// Map a failure to open a link. Any open failure is a connection error.
pub fn map_open_error(e: &(dyn std::error::Error + 'static)) -> FeederError {
    match map_hw_error(e) {
        FeederError::Connection(msg) => FeederError::Connection(msg),
        _ => FeederError::Connection(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_stay_io() {
        let e = std::io::Error::other("broken pipe");
        assert_eq!(map_hw_error(&e), FeederError::Io("broken pipe".into()));
    }

    #[test]
    fn timeout_text_maps_to_timeout() {
        let e: Box<dyn std::error::Error + Send + Sync> = "uart read timeout".into();
        assert_eq!(map_hw_error(&*e), FeederError::Timeout);
    }

    #[test]
    fn open_failures_are_connection_errors() {
        let e: Box<dyn std::error::Error + Send + Sync> = "no such device".into();
        match map_open_error(&*e) {
            FeederError::Connection(msg) => assert!(msg.contains("no such device")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_open_error_is_connection() {
        let e = feeder_hardware::error::HwError::Open {
            port: "/dev/ttyAMA10".into(),
            reason: "permission denied".into(),
        };
        match map_hw_error(&e) {
            FeederError::Connection(msg) => assert!(msg.contains("/dev/ttyAMA10")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn device_reset_mid_read_is_connection() {
        let e = feeder_hardware::error::HwError::from_read(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        match map_hw_error(&e) {
            FeederError::Connection(msg) => assert!(msg.contains("reset")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
