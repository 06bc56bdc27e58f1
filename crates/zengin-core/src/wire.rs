//! Zengin wire format: control bytes and fixed-width envelope records.
//!
//! These types ARE the protocol. Every offset and every length below is
//! byte-exact: a header or trailer that is one byte off silently corrupts
//! the banking data that follows it.
//!
//! Envelope records are #[repr(C)] structs of byte arrays with zerocopy
//! derives, so they serialize without copying field by field and without
//! unsafe code. Sizes are guarded at compile time.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Control Bytes ─────────────────────────────────────────────────────────────

/// Single-byte protocol primitives exchanged during handshake and framing.
///
/// Control bytes never appear inside a message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlByte {
    /// Start of text: opens a data frame.
    Stx = 0x02,
    /// End of text: closes a data frame.
    Etx = 0x03,
    /// End of transmission: sent before the client closes the connection.
    Eot = 0x04,
    /// Enquiry: the client's connection request.
    Enq = 0x05,
    /// Positive acknowledgement.
    Ack = 0x06,
    /// Negative acknowledgement.
    Nak = 0x15,
}

impl TryFrom<u8> for ControlByte {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x02 => Ok(ControlByte::Stx),
            0x03 => Ok(ControlByte::Etx),
            0x04 => Ok(ControlByte::Eot),
            0x05 => Ok(ControlByte::Enq),
            0x06 => Ok(ControlByte::Ack),
            0x15 => Ok(ControlByte::Nak),
            other => Err(WireError::UnknownControlByte(other)),
        }
    }
}

impl From<ControlByte> for u8 {
    fn from(c: ControlByte) -> u8 {
        c as u8
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Magic prefix of both envelope records.
pub const MAGIC: [u8; 4] = *b"ZEDI";

/// Record type written into the trailer after the magic.
pub const TRAILER_RECORD_TYPE: [u8; 2] = *b"99";

/// Header record length in bytes.
pub const HEADER_LEN: usize = 80;

/// Data record length in bytes.
pub const DATA_RECORD_LEN: usize = 120;

/// Trailer record length in bytes.
pub const TRAILER_LEN: usize = 80;

/// Smallest well-formed message: header plus trailer, no data records.
pub const MIN_MESSAGE_LEN: usize = HEADER_LEN + TRAILER_LEN;

/// Width of the sender and receiver id fields.
pub const PARTY_ID_LEN: usize = 10;

/// Width of the file id field.
pub const FILE_ID_LEN: usize = 10;

/// chrono format of the 14-digit header timestamp (`yyyyMMddHHmmss`).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Padding byte for every text field and reserved area.
pub const PAD: u8 = b' ';

// ── Header Record ─────────────────────────────────────────────────────────────

/// Routing metadata preceding the data records.
///
/// Wire size: 80 bytes.
#[derive(Debug, Clone, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct HeaderRecord {
    /// Always `ZEDI`.
    pub magic: [u8; 4],
    /// Sender id, space-padded or truncated.
    pub sender_id: [u8; PARTY_ID_LEN],
    /// Receiver id, space-padded or truncated.
    pub receiver_id: [u8; PARTY_ID_LEN],
    /// Two ASCII digits, see `MessageType::code`.
    pub type_code: [u8; 2],
    /// `yyyyMMddHHmmss`.
    pub timestamp: [u8; 14],
    /// File id, space-padded or truncated.
    pub file_id: [u8; FILE_ID_LEN],
    /// Spaces.
    pub reserved: [u8; 30],
}

assert_eq_size!(HeaderRecord, [u8; HEADER_LEN]);

// ── Trailer Record ────────────────────────────────────────────────────────────

/// Record-count checksum following the data records.
///
/// Wire size: 80 bytes.
#[derive(Debug, Clone, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct TrailerRecord {
    /// Always `ZEDI`.
    pub magic: [u8; 4],
    /// Always `99`.
    pub record_type: [u8; 2],
    /// Number of data records, zero-padded decimal.
    pub record_count: [u8; 8],
    /// Spaces.
    pub reserved: [u8; 66],
}

assert_eq_size!(TrailerRecord, [u8; TRAILER_LEN]);

impl TrailerRecord {
    /// Build a trailer announcing `count` data records.
    pub fn for_count(count: usize) -> Self {
        let mut record_count = [b'0'; 8];
        let digits = format!("{:08}", count);
        // Counts above 99,999,999 keep their lowest eight digits.
        let digits = &digits.as_bytes()[digits.len() - 8..];
        record_count.copy_from_slice(digits);
        Self {
            magic: MAGIC,
            record_type: TRAILER_RECORD_TYPE,
            record_count,
            reserved: [PAD; 66],
        }
    }

    /// The announced record count, if the field is a decimal number.
    pub fn announced_count(&self) -> Result<u32, WireError> {
        let text = field_text(&self.record_count);
        text.parse::<u32>()
            .map_err(|_| WireError::InvalidTrailerCount(text))
    }
}

// ── Field helpers ─────────────────────────────────────────────────────────────

/// Copy `src` into a fixed-width field, truncating or space-padding it.
pub fn fill_field<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut field = [PAD; N];
    let n = src.len().min(N);
    field[..n].copy_from_slice(&src[..n]);
    field
}

/// Read a fixed-width text field, trimming surrounding spaces.
pub fn field_text(field: &[u8]) -> String {
    String::from_utf8_lossy(field).trim().to_string()
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("malformed message: {len} bytes, need at least {}", MIN_MESSAGE_LEN)]
    MalformedMessage { len: usize },

    #[error("unknown message type code: {0:?}")]
    UnknownMessageType(String),

    #[error("invalid header timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid trailer record count: {0:?}")]
    InvalidTrailerCount(String),

    #[error("data record must be {} bytes, got {0}", DATA_RECORD_LEN)]
    InvalidRecordLength(usize),

    #[error("unknown control byte: 0x{0:02x}")]
    UnknownControlByte(u8),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
