//! Error types for service discovery operations.

use std::io;
use thiserror::Error;

/// Errors that can occur during service discovery operations.
#[derive(Error, Debug)]
pub enum SdError {
    /// Invalid client configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Frame too short to contain the expected structure.
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort { expected: usize, actual: usize },

    /// Entry type value not defined by the protocol.
    #[error("unknown entry type: 0x{0:02X}")]
    UnknownEntryType(u8),

    /// Wrong SOME/IP protocol version.
    #[error("wrong protocol version: expected 0x01, got 0x{0:02X}")]
    WrongProtocolVersion(u8),

    /// Frame is a valid SOME/IP message but not a service discovery one.
    #[error("not an SD message: service 0x{service_id:04X}, method 0x{method_id:04X}")]
    NotSdMessage { service_id: u16, method_id: u16 },
}

/// Result type alias for service discovery operations.
pub type Result<T> = std::result::Result<T, SdError>;

impl SdError {
    /// Create a new invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
