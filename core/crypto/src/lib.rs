//! Password-based streaming authenticated encryption.
//!
//! This crate provides:
//! - Key derivation using PBKDF2-HMAC-SHA512
//! - Chunk-wise AES-256-GCM built from the AES block cipher and GHASH
//! - Streaming encrypt/decrypt pipelines with trailing-tag separation
//! - Constant-time tag verification
//!
//! # Security Guarantees
//! - Passwords and derived key material are zeroized as soon as the
//!   cipher is set up, on every exit path
//! - No plaintext or key material is ever logged
//! - Tags are compared in constant time
//!
//! # Caveat
//! Decryption writes plaintext before the tag at the end of the stream
//! has been checked. Output of a run that fails with
//! [`Error::Authentication`](aesgcm_common::Error::Authentication) must
//! be discarded.

pub mod aead;
pub mod kdf;
pub mod keys;
pub mod session;
pub mod stream;
pub mod verify;

#[cfg(test)]
mod testing;

pub use aead::{AesGcmStream, AuthenticatedCipher, Mode};
pub use kdf::{derive_key_material, KdfParams, DEFAULT_ITERATIONS};
pub use keys::{KeyMaterial, Salt, Tag};
pub use session::{decrypt, encrypt, encrypt_with_rng, MIN_STREAM_LEN};
pub use stream::{DecryptingStream, EncryptingStream, StreamSummary, CHUNK_SIZE};
pub use verify::{tags_match, verify_tag};
