//! Error handling for Feldspar

use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum ServerError {
    /// IO error
    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unparseable packet data
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Name verification failed during the handshake
    #[error("Could not authenticate user.")]
    Auth,

    /// All player slots are taken
    #[error("server full")]
    ServerFull,

    /// Level file could not be loaded
    #[error("Level error: {0}")]
    Level(String),
}

/// Convenience type alias
pub type Result<T> = std::result::Result<T, ServerError>;
