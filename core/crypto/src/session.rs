//! Password-based encrypt and decrypt flows.
//!
//! Wires salt handling, key derivation, cipher setup and the streaming
//! pipeline together. Stream layout: `salt(16) || ciphertext(n) || tag(16)`.

use std::io::{self, Read, Write};

use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::aead::{AesGcmStream, Mode};
use crate::kdf::{derive_key_material, KdfParams};
use crate::keys::{Salt, SALT_LENGTH, TAG_LENGTH};
use crate::stream::{read_chunk, DecryptingStream, EncryptingStream, StreamSummary};
use aesgcm_common::{Password, Result};

/// Smallest well-formed stream: salt plus tag, empty ciphertext.
pub const MIN_STREAM_LEN: usize = SALT_LENGTH + TAG_LENGTH;

/// Encrypt `reader` into `writer` under a password, with an OS-random salt.
///
/// # Errors
/// - `Error::Entropy` if no salt can be generated; nothing is written
/// - `Error::InvalidInput` / `Error::Kdf` if the key cannot be derived
/// - `Error::Io` / `Error::Cipher` from the stream
pub fn encrypt<R: Read, W: Write>(
    password: Password,
    params: &KdfParams,
    reader: R,
    writer: W,
) -> Result<StreamSummary> {
    let salt = Salt::generate()?;
    seal_with_salt(password, &salt, params, reader, writer)
}

/// Encrypt with an explicit entropy source for the salt.
pub fn encrypt_with_rng<G, R, W>(
    password: Password,
    params: &KdfParams,
    rng: &mut G,
    reader: R,
    writer: W,
) -> Result<StreamSummary>
where
    G: RngCore + CryptoRng + ?Sized,
    R: Read,
    W: Write,
{
    let salt = Salt::generate_with(rng)?;
    seal_with_salt(password, &salt, params, reader, writer)
}

/// Start the cipher before anything is written, so a derivation failure
/// leaves the output untouched.
fn seal_with_salt<R: Read, W: Write>(
    password: Password,
    salt: &Salt,
    params: &KdfParams,
    reader: R,
    mut writer: W,
) -> Result<StreamSummary> {
    let cipher = start_cipher(password, salt, params, Mode::Encrypt)?;

    writer.write_all(salt.as_bytes())?;
    EncryptingStream::new(cipher).encrypt_stream(reader, &mut writer)
}

/// Decrypt `reader` into `writer` under a password.
///
/// Plaintext is written as it is recovered. On `Error::Authentication`
/// the caller must discard whatever was written.
///
/// # Errors
/// - `Error::Io` if the stream is shorter than [`MIN_STREAM_LEN`] or I/O fails
/// - `Error::InvalidInput` / `Error::Kdf` if the key cannot be derived
/// - `Error::Cipher` on cipher failure
/// - `Error::Authentication` on tag mismatch
pub fn decrypt<R: Read, W: Write>(
    password: Password,
    params: &KdfParams,
    mut reader: R,
    writer: W,
) -> Result<StreamSummary> {
    let salt = read_salt(&mut reader)?;
    let cipher = start_cipher(password, &salt, params, Mode::Decrypt)?;

    DecryptingStream::new(cipher).decrypt_stream(reader, writer)
}

/// Read the salt header from the front of a stream.
pub fn read_salt<R: Read + ?Sized>(reader: &mut R) -> Result<Salt> {
    let mut bytes = [0u8; SALT_LENGTH];
    let n = read_chunk(reader, &mut bytes)?;
    if n < SALT_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Failed to read random salt",
        )
        .into());
    }
    Ok(Salt::from_bytes(bytes))
}

/// Derive key material and start the cipher. Password and key material
/// are both consumed here and wiped before this returns.
fn start_cipher(
    password: Password,
    salt: &Salt,
    params: &KdfParams,
    mode: Mode,
) -> Result<AesGcmStream> {
    let material = derive_key_material(password, salt, params)?;
    let cipher = AesGcmStream::new(material, mode)?;
    debug!(?mode, "cipher ready");
    Ok(cipher)
}
