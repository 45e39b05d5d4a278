//! Streaming encryption for inputs of unknown length.
//!
//! Data moves through the cipher in 16-byte chunks, so memory use is
//! constant no matter how large the input is. The body format is
//! `ciphertext(n) || tag(16)` with no length field: on decrypt the tag is
//! separated from the ciphertext by holding back one chunk until the next
//! read shows whether more data follows.

use std::io::{self, Read, Write};

use tracing::debug;
use zeroize::Zeroizing;

use crate::aead::{AuthenticatedCipher, BLOCK_SIZE};
use crate::keys::{Tag, TAG_LENGTH};
use crate::verify::verify_tag;
use aesgcm_common::{Error, Result};

/// Processing unit size, equal to the cipher block size.
pub const CHUNK_SIZE: usize = BLOCK_SIZE;

/// Outcome of a completed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Plaintext bytes consumed (encrypt) or produced (decrypt).
    pub bytes_processed: u64,
    /// Tag appended (encrypt) or verified (decrypt).
    pub tag: Tag,
}

/// Fill `buf` from `reader` until it is full or the reader reports end of
/// input. Returns the number of bytes read; anything short of `buf.len()`
/// means the input is exhausted.
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encrypting stream that processes data in chunks.
pub struct EncryptingStream<C> {
    cipher: C,
}

impl<C: AuthenticatedCipher> EncryptingStream<C> {
    /// Create a new encrypting stream around a started cipher.
    pub fn new(cipher: C) -> Self {
        Self { cipher }
    }

    /// Encrypt data from reader and write `ciphertext || tag` to writer.
    ///
    /// Each ciphertext chunk is written as soon as it is produced. A chunk
    /// shorter than [`CHUNK_SIZE`] (possibly empty) ends the input.
    ///
    /// # Errors
    /// - `Error::Io` on read or write failure; bytes already written stay written
    /// - `Error::Cipher` if the cipher rejects an update or finalization
    pub fn encrypt_stream<R: Read, W: Write>(
        self,
        mut reader: R,
        mut writer: W,
    ) -> Result<StreamSummary> {
        let mut cipher = self.cipher;
        let mut plain = Zeroizing::new([0u8; CHUNK_SIZE]);
        let mut sealed = [0u8; CHUNK_SIZE];
        let mut total_bytes = 0u64;

        loop {
            let n = read_chunk(&mut reader, &mut plain[..])?;

            cipher.update(&plain[..n], &mut sealed[..n])?;
            writer.write_all(&sealed[..n])?;
            total_bytes += n as u64;

            if n < CHUNK_SIZE {
                break;
            }
        }

        let tag = cipher.finish()?;
        writer.write_all(tag.as_bytes())?;
        writer.flush()?;

        debug!(bytes = total_bytes, "stream encrypted");
        Ok(StreamSummary {
            bytes_processed: total_bytes,
            tag,
        })
    }
}

/// Where the lookahead buffer is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LookaheadState {
    /// Nothing read yet.
    Priming,
    /// One chunk is held back while the next is read.
    Streaming,
    /// A short read ended the input; the buffer head is the tag.
    Draining,
}

/// Two-slot buffer that separates the trailing tag from the ciphertext.
///
/// Slot one holds the chunk that is pending; slot two receives the next
/// read. A full read proves slot one was ciphertext. A short read of `n`
/// bytes means only the first `n` pending bytes were ciphertext and the
/// remaining [`TAG_LENGTH`] bytes are the tag.
#[derive(Debug)]
pub(crate) struct Lookahead {
    buf: [u8; 2 * CHUNK_SIZE],
    last_read: usize,
    state: LookaheadState,
}

impl Lookahead {
    pub fn new() -> Self {
        Self {
            buf: [0u8; 2 * CHUNK_SIZE],
            last_read: 0,
            state: LookaheadState::Priming,
        }
    }

    pub fn state(&self) -> LookaheadState {
        self.state
    }

    /// Read the first chunk into slot one.
    ///
    /// # Errors
    /// - `Error::Io` with `UnexpectedEof` if fewer than [`TAG_LENGTH`] bytes remain
    pub fn prime<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<()> {
        if self.state != LookaheadState::Priming {
            return Err(Error::Cipher(format!(
                "Lookahead primed twice (state {:?})",
                self.state
            )));
        }

        let n = read_chunk(reader, &mut self.buf[..CHUNK_SIZE])?;
        if n < TAG_LENGTH {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Failed to read first chunk: stream too short to hold an authentication tag",
            )
            .into());
        }

        self.state = LookaheadState::Streaming;
        Ok(())
    }

    /// Read up to one chunk into slot two and return the ciphertext that
    /// is now known not to be part of the tag.
    ///
    /// A short read switches to [`LookaheadState::Draining`].
    pub fn fill<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<&[u8]> {
        if self.state != LookaheadState::Streaming {
            return Err(Error::Cipher(format!(
                "Lookahead filled in state {:?}",
                self.state
            )));
        }

        let n = read_chunk(reader, &mut self.buf[CHUNK_SIZE..])?;
        self.last_read = n;
        if n < CHUNK_SIZE {
            self.state = LookaheadState::Draining;
        }
        Ok(&self.buf[..n])
    }

    /// Drop the ciphertext handed out by the last [`fill`](Self::fill).
    pub fn shift(&mut self) {
        self.buf.copy_within(self.last_read..self.last_read + CHUNK_SIZE, 0);
        self.last_read = 0;
    }

    /// Take the tag once the input is exhausted.
    pub fn into_tag(self) -> Result<Tag> {
        if self.state != LookaheadState::Draining || self.last_read != 0 {
            return Err(Error::Cipher(format!(
                "Tag requested before end of stream (state {:?})",
                self.state
            )));
        }

        let mut tag = [0u8; TAG_LENGTH];
        tag.copy_from_slice(&self.buf[..TAG_LENGTH]);
        Ok(Tag::from_bytes(tag))
    }
}

/// Decrypting stream that processes encrypted chunks.
pub struct DecryptingStream<C> {
    cipher: C,
}

impl<C: AuthenticatedCipher> DecryptingStream<C> {
    /// Create a new decrypting stream around a started cipher.
    pub fn new(cipher: C) -> Self {
        Self { cipher }
    }

    /// Decrypt `ciphertext || tag` from reader and write plaintext to writer.
    ///
    /// Plaintext is written before the tag has been checked. If this
    /// returns `Error::Authentication`, everything written so far must be
    /// discarded as untrusted.
    ///
    /// # Errors
    /// - `Error::Io` on read/write failure or if the input is shorter than a tag
    /// - `Error::Cipher` if the cipher rejects an update or finalization
    /// - `Error::Authentication` if the tag does not match
    pub fn decrypt_stream<R: Read, W: Write>(
        self,
        mut reader: R,
        mut writer: W,
    ) -> Result<StreamSummary> {
        let mut cipher = self.cipher;
        let mut lookahead = Lookahead::new();
        let mut plain = Zeroizing::new([0u8; CHUNK_SIZE]);
        let mut total_bytes = 0u64;

        lookahead.prime(&mut reader)?;

        while lookahead.state() == LookaheadState::Streaming {
            let pending = lookahead.fill(&mut reader)?;
            let n = pending.len();

            cipher.update(pending, &mut plain[..n])?;
            writer.write_all(&plain[..n])?;
            total_bytes += n as u64;

            lookahead.shift();
        }

        let received = lookahead.into_tag()?;
        let computed = cipher.finish()?;
        writer.flush()?;

        verify_tag(&computed, &received)?;

        debug!(bytes = total_bytes, "stream decrypted and authenticated");
        Ok(StreamSummary {
            bytes_processed: total_bytes,
            tag: received,
        })
    }
}

/// Encrypt a complete byte slice with the given cipher.
pub fn encrypt_bytes<C: AuthenticatedCipher>(cipher: C, data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() + TAG_LENGTH);
    EncryptingStream::new(cipher).encrypt_stream(data, &mut output)?;
    Ok(output)
}

/// Decrypt a complete `ciphertext || tag` slice with the given cipher.
pub fn decrypt_bytes<C: AuthenticatedCipher>(cipher: C, data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len().saturating_sub(TAG_LENGTH));
    DecryptingStream::new(cipher).decrypt_stream(data, &mut output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::{AesGcmStream, Mode};
    use crate::keys::{KeyMaterial, KEY_MATERIAL_LENGTH};
    use proptest::prelude::*;

    fn gcm(mode: Mode) -> AesGcmStream {
        AesGcmStream::new(KeyMaterial::from_bytes(&[42u8; KEY_MATERIAL_LENGTH]), mode).unwrap()
    }

    fn seal(data: &[u8]) -> Vec<u8> {
        encrypt_bytes(gcm(Mode::Encrypt), data).unwrap()
    }

    fn open(data: &[u8]) -> Result<Vec<u8>> {
        decrypt_bytes(gcm(Mode::Decrypt), data)
    }

    /// Hands out at most `step` bytes per read call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    /// Fails with an I/O error once `ok_bytes` have been delivered.
    struct Failing<'a> {
        data: &'a [u8],
        ok_bytes: usize,
    }

    impl Read for Failing<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.ok_bytes == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
            }
            let n = buf.len().min(self.ok_bytes).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            self.ok_bytes -= n;
            Ok(n)
        }
    }

    /// Fails with `Interrupted` on every other call, then hands out up to
    /// `step` bytes.
    struct Stuttering<'a> {
        data: &'a [u8],
        step: usize,
        interrupt_next: bool,
    }

    impl<'a> Stuttering<'a> {
        fn new(data: &'a [u8], step: usize) -> Self {
            Self {
                data,
                step,
                interrupt_next: true,
            }
        }
    }

    impl Read for Stuttering<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "signal"));
            }
            self.interrupt_next = true;
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    /// Cipher whose update always fails.
    struct BrokenCipher;

    impl AuthenticatedCipher for BrokenCipher {
        fn update(&mut self, _input: &[u8], _output: &mut [u8]) -> Result<()> {
            Err(Error::Cipher("Failed to execute AES encryption".to_string()))
        }

        fn finish(self) -> Result<Tag> {
            Ok(Tag::from_bytes([0u8; TAG_LENGTH]))
        }
    }

    #[test]
    fn test_stream_roundtrip_boundary_lengths() {
        for len in [0usize, 1, 15, 16, 17, 31, 32, 33, 48, 255, 4096, 4099] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

            let encrypted = seal(&plaintext);
            assert_eq!(encrypted.len(), len + TAG_LENGTH);

            let decrypted = open(&encrypted).unwrap();
            assert_eq!(decrypted, plaintext, "round-trip failed at length {}", len);
        }
    }

    #[test]
    fn test_stream_empty_data() {
        let encrypted = seal(b"");
        assert_eq!(encrypted.len(), TAG_LENGTH);
        assert!(open(&encrypted).unwrap().is_empty());
    }

    #[test]
    fn test_stream_summary_counts_bytes() {
        let mut out = Vec::new();
        let summary = EncryptingStream::new(gcm(Mode::Encrypt))
            .encrypt_stream(&[1u8; 40][..], &mut out)
            .unwrap();
        assert_eq!(summary.bytes_processed, 40);
        assert_eq!(summary.tag.as_bytes()[..], out[40..]);

        let mut plain = Vec::new();
        let summary = DecryptingStream::new(gcm(Mode::Decrypt))
            .decrypt_stream(&out[..], &mut plain)
            .unwrap();
        assert_eq!(summary.bytes_processed, 40);
    }

    #[test]
    fn test_stream_trickling_reader() {
        let plaintext: Vec<u8> = (0..100u8).collect();
        let encrypted = seal(&plaintext);

        for step in [1, 3, 7, 16, 17] {
            let reader = Trickle {
                data: &encrypted,
                step,
            };
            let mut out = Vec::new();
            DecryptingStream::new(gcm(Mode::Decrypt))
                .decrypt_stream(reader, &mut out)
                .unwrap();
            assert_eq!(out, plaintext, "step {}", step);
        }
    }

    #[test]
    fn test_read_chunk_retries_interrupted() {
        let data = [5u8; 40];
        let mut reader = Stuttering::new(&data, 16);
        let mut buf = [0u8; CHUNK_SIZE];

        // Interruptions land exactly on chunk boundaries here.
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), CHUNK_SIZE);
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), CHUNK_SIZE);
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), 8);
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_stream_interrupted_reader() {
        for len in [0usize, 15, 16, 32, 33, 100] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i * 3) as u8).collect();

            for step in [1, 5, 16] {
                let mut encrypted = Vec::new();
                EncryptingStream::new(gcm(Mode::Encrypt))
                    .encrypt_stream(Stuttering::new(&plaintext, step), &mut encrypted)
                    .unwrap();
                assert_eq!(encrypted, seal(&plaintext), "len {} step {}", len, step);

                let mut out = Vec::new();
                DecryptingStream::new(gcm(Mode::Decrypt))
                    .decrypt_stream(Stuttering::new(&encrypted, step), &mut out)
                    .unwrap();
                assert_eq!(out, plaintext, "len {} step {}", len, step);
            }
        }
    }

    #[test]
    fn test_stream_tampered_ciphertext_fails() {
        let mut encrypted = seal(b"Important data spanning two chunks");
        encrypted[5] ^= 0x01;

        assert!(matches!(open(&encrypted), Err(Error::Authentication)));
    }

    #[test]
    fn test_stream_tampered_tag_fails() {
        let mut encrypted = seal(b"Important data");
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x80;

        assert!(matches!(open(&encrypted), Err(Error::Authentication)));
    }

    #[test]
    fn test_stream_too_short_for_tag() {
        for len in [0usize, 1, 15] {
            let err = open(&vec![0u8; len]).unwrap_err();
            match err {
                Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
                other => panic!("expected I/O error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_stream_read_error_aborts() {
        let encrypted = seal(&[9u8; 64]);
        let reader = Failing {
            data: &encrypted,
            ok_bytes: 40,
        };
        let mut out = Vec::new();

        let err = DecryptingStream::new(gcm(Mode::Decrypt))
            .decrypt_stream(reader, &mut out)
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        // Chunks emitted before the failure are not retracted.
        assert_eq!(out.len(), 16);
    }

    #[test]
    fn test_stream_cipher_failure_is_fatal() {
        let err = encrypt_bytes(BrokenCipher, b"anything").unwrap_err();
        assert!(matches!(err, Error::Cipher(_)));
    }

    #[test]
    fn test_lookahead_state_transitions() {
        let data = [7u8; 20];
        let mut reader = &data[..];
        let mut lookahead = Lookahead::new();
        assert_eq!(lookahead.state(), LookaheadState::Priming);

        lookahead.prime(&mut reader).unwrap();
        assert_eq!(lookahead.state(), LookaheadState::Streaming);

        let pending = lookahead.fill(&mut reader).unwrap();
        assert_eq!(pending.len(), 4);
        assert_eq!(lookahead.state(), LookaheadState::Draining);

        lookahead.shift();
        assert!(lookahead.fill(&mut reader).is_err());
        assert_eq!(lookahead.into_tag().unwrap().as_bytes(), &[7u8; TAG_LENGTH]);
    }

    #[test]
    fn test_lookahead_tag_before_end_fails() {
        let data = [0u8; 48];
        let mut reader = &data[..];
        let mut lookahead = Lookahead::new();
        lookahead.prime(&mut reader).unwrap();

        assert!(matches!(lookahead.into_tag(), Err(Error::Cipher(_))));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..600)) {
            let encrypted = seal(&data);
            prop_assert_eq!(encrypted.len(), data.len() + TAG_LENGTH);
            prop_assert_eq!(open(&encrypted).unwrap(), data);
        }

        #[test]
        fn prop_any_bit_flip_detected(
            data in proptest::collection::vec(any::<u8>(), 0..80),
            pos in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut encrypted = seal(&data);
            let i = pos.index(encrypted.len());
            encrypted[i] ^= 1 << bit;
            prop_assert!(matches!(open(&encrypted), Err(Error::Authentication)));
        }
    }
}
