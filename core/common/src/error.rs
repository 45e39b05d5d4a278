//! Common error types for aesgcm.

use thiserror::Error;

/// Exit status for a successful run.
pub const EXIT_SUCCESS: u8 = 0;

/// Exit status for I/O, entropy, key derivation, cipher and setup failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status reserved for an authentication tag mismatch on decrypt.
pub const EXIT_AUTHENTICATION: u8 = 2;

/// Top-level error type for aesgcm operations.
///
/// Every variant is fatal to the running operation. Only
/// [`Error::Authentication`] is an expected outcome of bad input
/// (wrong password or tampered stream); everything else is an
/// environment or programming fault.
#[derive(Debug, Error)]
pub enum Error {
    /// Stream read or write failed, including a truncated stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The secure random source could not produce bytes.
    #[error("Entropy error: {0}")]
    Entropy(String),

    /// The key-derivation primitive is unavailable or misconfigured.
    #[error("Key derivation error: {0}")]
    Kdf(String),

    /// Cipher setup, update or finalization failed.
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// The computed tag does not match the tag stored in the stream.
    #[error("Authentication failed: tag mismatch (wrong password or corrupted input)")]
    Authentication,

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Authentication => EXIT_AUTHENTICATION,
            _ => EXIT_FAILURE,
        }
    }

    /// Whether this error is a tag mismatch rather than a system fault.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication)
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
