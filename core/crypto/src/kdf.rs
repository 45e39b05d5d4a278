//! Key derivation using PBKDF2-HMAC-SHA512.
//!
//! The password is stretched into 48 bytes: an AES-256 key followed by a
//! 16-byte GCM IV. The salt is the random stream header, so every stream
//! gets its own key and IV.

use hmac::Hmac;
use sha2::Sha512;
use tracing::debug;
use zeroize::Zeroizing;

use crate::keys::{KeyMaterial, Salt, KEY_MATERIAL_LENGTH};
use aesgcm_common::{Error, Password, Result};

/// Iteration count used for both encryption and decryption.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Number of HMAC-SHA512 iterations.
    pub iterations: u32,
}

impl KdfParams {
    /// Parameters with a custom iteration count.
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Derive key material from a password and salt.
///
/// The password is taken by value and wiped when this function returns,
/// on success and on every error path.
///
/// # Preconditions
/// - `password` must not be empty
/// - `params.iterations` must be nonzero
///
/// # Errors
/// - `Error::InvalidInput` if the password is empty
/// - `Error::Kdf` if the parameters are invalid or the PRF cannot be keyed
pub fn derive_key_material(
    password: Password,
    salt: &Salt,
    params: &KdfParams,
) -> Result<KeyMaterial> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }
    if params.iterations == 0 {
        return Err(Error::Kdf("Iteration count must be nonzero".to_string()));
    }

    debug!(iterations = params.iterations, "deriving key material");

    let mut derived = Zeroizing::new([0u8; KEY_MATERIAL_LENGTH]);
    pbkdf2::pbkdf2::<Hmac<Sha512>>(
        password.as_bytes(),
        salt.as_bytes(),
        params.iterations,
        &mut derived[..],
    )
    .map_err(|e| Error::Kdf(format!("HMAC context initialization failed: {}", e)))?;

    Ok(KeyMaterial::from_bytes(&derived))
}
