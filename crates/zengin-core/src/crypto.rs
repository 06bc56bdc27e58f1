//! Message digests for integrity records.
//!
//! BLAKE3 with the default 256-bit output, rendered as lowercase hex.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    #[error("cannot digest empty input")]
    EmptyInput,
}

/// Hash a byte slice, returning a 32-byte BLAKE3 digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hex digest of a non-empty byte slice.
pub fn hex_digest(data: &[u8]) -> Result<String, DigestError> {
    if data.is_empty() {
        return Err(DigestError::EmptyInput);
    }
    Ok(hex::encode(hash(data)))
}

/// Compare `data` against an expected hex digest, ignoring case.
///
/// An empty `expected` never matches.
pub fn matches_hex_digest(data: &[u8], expected: &str) -> Result<bool, DigestError> {
    if expected.is_empty() {
        return Ok(false);
    }
    Ok(hex_digest(data)?.eq_ignore_ascii_case(expected))
}
