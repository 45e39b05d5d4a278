//! Constant-time tag comparison.

use subtle::ConstantTimeEq;

use crate::keys::Tag;
use aesgcm_common::{Error, Result};

/// Compare two tags without branching on their contents.
///
/// Every byte pair is XORed and OR-ed into one accumulator; the
/// accumulator is only inspected after all bytes have been visited, and
/// that final test goes through `subtle` so it is not turned back into an
/// early-exit comparison.
pub fn tags_match(computed: &Tag, received: &Tag) -> bool {
    let diff = computed
        .as_bytes()
        .iter()
        .zip(received.as_bytes().iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));

    diff.ct_eq(&0u8).into()
}

/// Verify a received tag against the one computed by the cipher.
///
/// # Errors
/// - `Error::Authentication` on mismatch
pub fn verify_tag(computed: &Tag, received: &Tag) -> Result<()> {
    if tags_match(computed, received) {
        Ok(())
    } else {
        Err(Error::Authentication)
    }
}
