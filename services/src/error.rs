use std::fmt;
use std::io;

use thiserror::Error;

/// Normalized category for a failed terminal conversation, derived from the
/// underlying socket error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceErrorKind {
    Timeout,
    ConnectionRefused,
    HostUnreachable,
    NetworkUnreachable,
    Unknown,
}

impl fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceErrorKind::Timeout => "timeout",
            DeviceErrorKind::ConnectionRefused => "connection-refused",
            DeviceErrorKind::HostUnreachable => "host-unreachable",
            DeviceErrorKind::NetworkUnreachable => "network-unreachable",
            DeviceErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A failed conversation with a physical terminal.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub message: String,
}

impl DeviceError {
    pub fn new(kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Protocol-level fault: the socket worked but the device sent something
    /// outside the expected exchange.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(DeviceErrorKind::Unknown, message)
    }

    pub fn from_io(err: &io::Error, context: &str) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::TimedOut => DeviceErrorKind::Timeout,
            io::ErrorKind::ConnectionRefused => DeviceErrorKind::ConnectionRefused,
            io::ErrorKind::HostUnreachable => DeviceErrorKind::HostUnreachable,
            io::ErrorKind::NetworkUnreachable => DeviceErrorKind::NetworkUnreachable,
            _ => DeviceErrorKind::Unknown,
        };
        Self::new(kind, format!("{context}: {err}"))
    }
}

/// A failed read of the legacy vendor export file.
///
/// Carries the list of tables actually present in the file so an operator
/// can extend the candidate table list when the vendor renames things.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LegacyReadError {
    pub message: String,
    pub available_tables: Vec<String>,
}

impl LegacyReadError {
    pub fn new(message: impl Into<String>, available_tables: Vec<String>) -> Self {
        Self {
            message: message.into(),
            available_tables,
        }
    }
}
