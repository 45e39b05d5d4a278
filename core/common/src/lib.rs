//! Shared error taxonomy and secret buffer types for aesgcm.
//!
//! Both the crypto core and the command-line tool speak in terms of the
//! [`Error`] defined here, so the process exit status can be derived from
//! any failure without string matching.

pub mod error;
pub mod types;

pub use error::{Error, Result, EXIT_AUTHENTICATION, EXIT_FAILURE, EXIT_SUCCESS};
pub use types::{Password, SecretBytes, MAX_PASSWORD_LEN};
