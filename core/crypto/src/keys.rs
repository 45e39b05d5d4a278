//! Key types with secure memory handling.
//!
//! Secret key types zeroize their memory on drop so derived material
//! never outlives the cipher setup that consumes it.

use rand::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use aesgcm_common::{Error, Result};

/// Length of the AES-256 key in bytes.
pub const KEY_LENGTH: usize = 32;

/// Length of the GCM initialization vector in bytes.
pub const IV_LENGTH: usize = 16;

/// Total derived key material: key followed by IV.
pub const KEY_MATERIAL_LENGTH: usize = KEY_LENGTH + IV_LENGTH;

/// Length of the stream salt in bytes.
pub const SALT_LENGTH: usize = 16;

/// Length of the authentication tag in bytes.
pub const TAG_LENGTH: usize = 16;

/// Key and IV derived from the password.
///
/// Consumed by value by cipher setup and wiped right after.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; KEY_LENGTH],
    iv: [u8; IV_LENGTH],
}

impl KeyMaterial {
    /// Split raw derived bytes: the first [`KEY_LENGTH`] bytes are the key,
    /// the remaining [`IV_LENGTH`] bytes the IV.
    pub fn from_bytes(bytes: &[u8; KEY_MATERIAL_LENGTH]) -> Self {
        let mut material = Self {
            key: [0u8; KEY_LENGTH],
            iv: [0u8; IV_LENGTH],
        };
        material.key.copy_from_slice(&bytes[..KEY_LENGTH]);
        material.iv.copy_from_slice(&bytes[KEY_LENGTH..]);
        material
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn key(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Get the IV bytes.
    pub fn iv(&self) -> &[u8; IV_LENGTH] {
        &self.iv
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED])")
    }
}

/// Salt for key derivation, stored in clear as the stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a random salt from the operating system's entropy source.
    ///
    /// # Errors
    /// - `Error::Entropy` if the source cannot produce bytes
    pub fn generate() -> Result<Self> {
        Self::generate_with(&mut rand::rngs::OsRng)
    }

    /// Generate a random salt from the given secure source.
    pub fn generate_with<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Result<Self> {
        let mut salt = [0u8; SALT_LENGTH];
        rng.try_fill_bytes(&mut salt)
            .map_err(|e| Error::Entropy(format!("Entropy gather failed: {}", e)))?;
        Ok(Self(salt))
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}

/// GCM authentication tag.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Tag([u8; TAG_LENGTH]);

impl Tag {
    pub fn from_bytes(bytes: [u8; TAG_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TAG_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}
