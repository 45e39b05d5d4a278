//! Chunk-wise authenticated encryption using AES-256-GCM.
//!
//! GCM is assembled from the AES-256 block cipher (counter-mode keystream)
//! and the GHASH universal hash (authentication) so that data can be fed
//! through one chunk at a time, without knowing the total length up front.
//! The result is byte-identical to a one-shot AES-256-GCM encryption with a
//! 16-byte IV and no associated data.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes256, Block};
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use zeroize::Zeroize;

use crate::keys::{KeyMaterial, Tag, TAG_LENGTH};
use aesgcm_common::{Error, Result};

/// Cipher block size; also the pipeline's chunk size.
pub const BLOCK_SIZE: usize = 16;

/// Largest message GCM can process under one key/IV (2^39 - 256 bits).
pub const MAX_MESSAGE_LEN: u64 = (1 << 36) - 32;

/// Which way data flows through the cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

/// Contract the streaming pipeline needs from an authenticated cipher.
///
/// `update` transforms input to same-length output. Every call except the
/// last must be a whole number of blocks; once a shorter chunk has been
/// processed, only empty updates are accepted. `finish` consumes the
/// cipher and yields the tag over everything processed.
pub trait AuthenticatedCipher {
    /// Transform `input` into `output`, which must have the same length.
    fn update(&mut self, input: &[u8], output: &mut [u8]) -> Result<()>;

    /// Finalize and return the authentication tag.
    fn finish(self) -> Result<Tag>;
}

/// Streaming AES-256-GCM context.
pub struct AesGcmStream {
    cipher: Aes256,
    ghash: GHash,
    /// Pre-counter block, masks the final GHASH value.
    j0: Block,
    counter: Block,
    mode: Mode,
    processed: u64,
    tail_seen: bool,
}

impl AesGcmStream {
    /// Set up a GCM context from derived key material.
    ///
    /// The key material is consumed and wiped when this returns.
    ///
    /// # Errors
    /// - `Error::Cipher` if the AES key schedule cannot be built
    pub fn new(material: KeyMaterial, mode: Mode) -> Result<Self> {
        let cipher = Aes256::new_from_slice(material.key())
            .map_err(|e| Error::Cipher(format!("Failed to initialize AES GCM context: {}", e)))?;

        let mut h = Block::default();
        cipher.encrypt_block(&mut h);
        let ghash = GHash::new(&h);
        h.as_mut_slice().zeroize();

        let j0 = pre_counter_block(&ghash, material.iv());
        let mut counter = j0;
        inc32(&mut counter);

        Ok(Self {
            cipher,
            ghash,
            j0,
            counter,
            mode,
            processed: 0,
            tail_seen: false,
        })
    }

    fn process_block(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        if self.tail_seen {
            return Err(Error::Cipher(
                "Update after a partial block; only the last chunk may be short".to_string(),
            ));
        }
        if self.processed + input.len() as u64 > MAX_MESSAGE_LEN {
            return Err(Error::Cipher("Message exceeds GCM length limit".to_string()));
        }

        let mut keystream = self.counter;
        self.cipher.encrypt_block(&mut keystream);
        inc32(&mut self.counter);

        for ((out, inp), ks) in output.iter_mut().zip(input).zip(keystream.iter()) {
            *out = inp ^ ks;
        }
        keystream.as_mut_slice().zeroize();

        // GHASH always runs over the ciphertext side.
        let ciphertext: &[u8] = match self.mode {
            Mode::Encrypt => &*output,
            Mode::Decrypt => input,
        };
        if ciphertext.len() == BLOCK_SIZE {
            self.ghash.update(&[*Block::from_slice(ciphertext)]);
        } else {
            self.ghash.update_padded(ciphertext);
            self.tail_seen = true;
        }

        self.processed += input.len() as u64;
        Ok(())
    }
}

impl AuthenticatedCipher for AesGcmStream {
    fn update(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        if input.len() != output.len() {
            return Err(Error::Cipher(format!(
                "Output buffer length {} does not match input length {}",
                output.len(),
                input.len()
            )));
        }

        for (inp, out) in input.chunks(BLOCK_SIZE).zip(output.chunks_mut(BLOCK_SIZE)) {
            self.process_block(inp, out)?;
        }
        Ok(())
    }

    fn finish(self) -> Result<Tag> {
        let Self {
            cipher,
            mut ghash,
            j0,
            processed,
            ..
        } = self;

        // No associated data: the length block is 0 || bitlen(C).
        let mut lengths = Block::default();
        lengths[8..].copy_from_slice(&(processed * 8).to_be_bytes());
        ghash.update(&[lengths]);
        let s = ghash.finalize();

        let mut mask = j0;
        cipher.encrypt_block(&mut mask);

        let mut tag = [0u8; TAG_LENGTH];
        for ((t, m), s) in tag.iter_mut().zip(mask.iter()).zip(s.iter()) {
            *t = m ^ s;
        }
        mask.as_mut_slice().zeroize();

        Ok(Tag::from_bytes(tag))
    }
}

/// J0 for a non-96-bit IV: GHASH(IV || pad || 0^64 || bitlen(IV)).
fn pre_counter_block(ghash: &GHash, iv: &[u8]) -> Block {
    let mut ghash = ghash.clone();
    ghash.update_padded(iv);

    let mut lengths = Block::default();
    lengths[8..].copy_from_slice(&((iv.len() as u64) * 8).to_be_bytes());
    ghash.update(&[lengths]);
    ghash.finalize()
}

/// Increment the low 32 bits of the counter block, big-endian, wrapping.
fn inc32(block: &mut Block) {
    let mut low = [0u8; 4];
    low.copy_from_slice(&block[12..]);
    let next = u32::from_be_bytes(low).wrapping_add(1);
    block[12..].copy_from_slice(&next.to_be_bytes());
}
