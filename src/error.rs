//! Error types for GPSD client operations
//!
//! Errors returned here are local to the caller: invalid configuration,
//! a client whose driver task has stopped, or a failed encode/decode.
//! Failures observed on the connection itself never surface as `Err`;
//! they are dispatched as events (see [`crate::event::Event`]).

use thiserror::Error;

/// Main error type for GPSD client operations
#[derive(Debug, Error)]
pub enum GpsdError {
    /// I/O error occurred during network communication
    ///
    /// Returned by connect futures when the attempt they observe fails.
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    ///
    /// Occurs when a payload does not match the typed message structure
    /// requested through [`crate::router::ParsedMessage::decode`].
    #[error("SerdeError: {0}")]
    Json(#[from] serde_json::Error),

    /// Client configuration rejected at construction time
    #[error("InvalidConfig: {0}")]
    InvalidConfig(&'static str),

    /// The client's driver task is no longer running
    #[error("ClientClosed")]
    ClientClosed,

    /// Protocol-level error
    ///
    /// Indicates a message that cannot be interpreted, such as a
    /// payload without a `class` discriminator.
    #[error("ProtocolError: {0}")]
    Protocol(&'static str),
}
