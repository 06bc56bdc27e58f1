//! Zengin message model and codec.
//!
//! A message is one transmission unit: an 80-byte header, any number of
//! 120-byte data records, and an 80-byte trailer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, NaiveDateTime, Timelike};
use zerocopy::{AsBytes, FromBytes};

use crate::wire::{
    field_text, fill_field, HeaderRecord, TrailerRecord, WireError, DATA_RECORD_LEN,
    HEADER_LEN, MAGIC, MIN_MESSAGE_LEN, PAD, TIMESTAMP_FORMAT, TRAILER_LEN,
};

/// Message type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Transfer,
    Inquiry,
    Response,
    Notification,
}

impl MessageType {
    /// Two-character wire code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Transfer => "01",
            Self::Inquiry => "02",
            Self::Response => "03",
            Self::Notification => "04",
        }
    }

    /// Parse a two-character wire code.
    pub fn from_code(code: &[u8]) -> Option<Self> {
        match code {
            b"01" => Some(Self::Transfer),
            b"02" => Some(Self::Inquiry),
            b"03" => Some(Self::Response),
            b"04" => Some(Self::Notification),
            _ => None,
        }
    }
}

// ── Data Record ───────────────────────────────────────────────────────────────

/// One fixed-length business entry.
///
/// The internal layout belongs to the caller; only the integrity layer
/// reads a numeric amount subfield out of it.
#[derive(Clone, PartialEq, Eq)]
pub struct DataRecord([u8; DATA_RECORD_LEN]);

impl DataRecord {
    /// Wrap exactly one record's worth of bytes.
    pub fn new(bytes: [u8; DATA_RECORD_LEN]) -> Self {
        Self(bytes)
    }

    /// A record of spaces with `text` written at the start.
    pub fn from_text(text: &str) -> Self {
        Self(fill_field(text.as_bytes()))
    }

    /// The raw record bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Mutable access for filling caller-defined subfields.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl TryFrom<&[u8]> for DataRecord {
    type Error = WireError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; DATA_RECORD_LEN] = bytes
            .try_into()
            .map_err(|_| WireError::InvalidRecordLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for DataRecord {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for DataRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DataRecord")
            .field(&String::from_utf8_lossy(&self.0))
            .finish()
    }
}

// ── File Id ───────────────────────────────────────────────────────────────────

/// Last issued file id sequence, in wall-clock milliseconds.
static LAST_FILE_SEQ: AtomicU64 = AtomicU64::new(0);

const FILE_ID_MODULUS: u64 = 1_000_000_000;

/// Generate a file id: `F` followed by nine digits of wall-clock millis.
///
/// Ids are strictly increasing within a process, so two messages built in
/// the same millisecond never collide.
pub fn next_file_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let prev = LAST_FILE_SEQ
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
            Some(if now > prev { now } else { prev + 1 })
        })
        .unwrap_or(now);
    let issued = if now > prev { now } else { prev + 1 };
    format!("F{:09}", issued % FILE_ID_MODULUS)
}

// ── Message ───────────────────────────────────────────────────────────────────

/// Header and trailer exactly as received from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Envelope {
    header: HeaderRecord,
    trailer: TrailerRecord,
}

/// One transmission unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    message_type: MessageType,
    sender_id: String,
    receiver_id: String,
    transmitted_at: NaiveDateTime,
    file_id: String,
    data_records: Vec<DataRecord>,
    /// Set only on decoded messages; re-emitted verbatim by `encode`.
    received: Option<Envelope>,
}

impl Message {
    /// Create a message stamped with the current local time and a fresh file id.
    pub fn new(
        message_type: MessageType,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
    ) -> Self {
        let now = Local::now().naive_local();
        Self {
            message_type,
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            transmitted_at: now.with_nanosecond(0).unwrap_or(now),
            file_id: next_file_id(),
            data_records: Vec::new(),
            received: None,
        }
    }

    /// Replace the data records. Any received envelope is discarded, so
    /// header and trailer are regenerated on the next encode.
    pub fn with_data_records(mut self, records: Vec<DataRecord>) -> Self {
        self.data_records = records;
        self.received = None;
        self
    }

    pub fn with_file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = file_id.into();
        self.received = None;
        self
    }

    pub fn with_transmitted_at(mut self, at: NaiveDateTime) -> Self {
        self.transmitted_at = at.with_nanosecond(0).unwrap_or(at);
        self.received = None;
        self
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    pub fn transmitted_at(&self) -> NaiveDateTime {
        self.transmitted_at
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn data_records(&self) -> &[DataRecord] {
        &self.data_records
    }

    /// Total encoded size in bytes.
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.data_records.len() * DATA_RECORD_LEN + TRAILER_LEN
    }

    /// The record count announced by the trailer: the received trailer for
    /// decoded messages, otherwise the one `encode` would generate.
    pub fn trailer_record_count(&self) -> Result<u32, WireError> {
        match &self.received {
            Some(envelope) => envelope.trailer.announced_count(),
            None => TrailerRecord::for_count(self.data_records.len()).announced_count(),
        }
    }

    fn header_record(&self) -> HeaderRecord {
        let timestamp = self.transmitted_at.format(TIMESTAMP_FORMAT).to_string();
        HeaderRecord {
            magic: MAGIC,
            sender_id: fill_field(self.sender_id.as_bytes()),
            receiver_id: fill_field(self.receiver_id.as_bytes()),
            type_code: fill_field(self.message_type.code().as_bytes()),
            timestamp: fill_field(timestamp.as_bytes()),
            file_id: fill_field(self.file_id.as_bytes()),
            reserved: [PAD; 30],
        }
    }

    /// Serialize to the wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        match &self.received {
            Some(envelope) => out.extend_from_slice(envelope.header.as_bytes()),
            None => out.extend_from_slice(self.header_record().as_bytes()),
        }
        for record in &self.data_records {
            out.extend_from_slice(record.as_bytes());
        }
        match &self.received {
            Some(envelope) => out.extend_from_slice(envelope.trailer.as_bytes()),
            None => out.extend_from_slice(
                TrailerRecord::for_count(self.data_records.len()).as_bytes(),
            ),
        }
        out
    }

    /// Parse a message from the wire layout.
    ///
    /// The data record count is `(len - 160) / 120`; bytes that do not fill
    /// a whole record are ignored. The trailer is always the final 80 bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < MIN_MESSAGE_LEN {
            return Err(WireError::MalformedMessage { len: bytes.len() });
        }

        let header = HeaderRecord::read_from(&bytes[..HEADER_LEN])
            .ok_or(WireError::MalformedMessage { len: bytes.len() })?;
        let trailer = TrailerRecord::read_from(&bytes[bytes.len() - TRAILER_LEN..])
            .ok_or(WireError::MalformedMessage { len: bytes.len() })?;

        let message_type = MessageType::from_code(&header.type_code).ok_or_else(|| {
            WireError::UnknownMessageType(String::from_utf8_lossy(&header.type_code).into_owned())
        })?;

        let timestamp = field_text(&header.timestamp);
        let transmitted_at = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
            .map_err(|_| WireError::InvalidTimestamp(timestamp.clone()))?;

        let count = (bytes.len() - MIN_MESSAGE_LEN) / DATA_RECORD_LEN;
        let data_records = bytes[HEADER_LEN..HEADER_LEN + count * DATA_RECORD_LEN]
            .chunks_exact(DATA_RECORD_LEN)
            .map(DataRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            message_type,
            sender_id: field_text(&header.sender_id),
            receiver_id: field_text(&header.receiver_id),
            transmitted_at,
            file_id: field_text(&header.file_id),
            data_records,
            received: Some(Envelope { header, trailer }),
        })
    }
}
