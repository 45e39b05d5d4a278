//! Secret-holding buffer types.

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Longest password accepted, in bytes. Longer input is truncated.
pub const MAX_PASSWORD_LEN: usize = 127;

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Create new sensitive bytes, taking ownership of the allocation.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {} bytes])", self.0.len())
    }
}

/// User password.
///
/// Consumed by value by key derivation, so the bytes are wiped as soon
/// as derivation returns, whether it succeeded or not.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Password(SecretBytes);

impl Password {
    /// Wrap password bytes, truncating to [`MAX_PASSWORD_LEN`].
    ///
    /// The bytes past the limit are wiped before the allocation is kept.
    pub fn new(mut bytes: Vec<u8>) -> Self {
        if bytes.len() > MAX_PASSWORD_LEN {
            bytes[MAX_PASSWORD_LEN..].zeroize();
            bytes.truncate(MAX_PASSWORD_LEN);
        }
        Self(SecretBytes::new(bytes))
    }

    /// Strip a trailing line ending (`\n`, `\r\n`, or any run of them).
    pub fn trim_line_ending(mut self) -> Self {
        let bytes = &mut self.0 .0;
        while matches!(bytes.last(), Some(b'\n') | Some(b'\r')) {
            if let Some(last) = bytes.last_mut() {
                *last = 0;
            }
            bytes.pop();
        }
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes().ct_eq(other.as_bytes()).into()
    }
}

impl Eq for Password {}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password([REDACTED])")
    }
}
