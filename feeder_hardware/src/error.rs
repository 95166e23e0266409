use std::io::ErrorKind;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("open serial port {port}: {reason}")]
    Open { port: String, reason: String },
    #[error("serial device reset")]
    DeviceReset,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl HwError {
    /// Classify an error raised while reading an open port.
    ///
    /// A USB serial adapter that is unplugged or re-enumerated mid-read
    /// surfaces as one of the "connection went away" kinds.
    pub fn from_read(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::ConnectionReset
            | ErrorKind::UnexpectedEof => HwError::DeviceReset,
            _ => HwError::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
