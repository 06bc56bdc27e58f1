//! Integrity guard: hashes, record counts and amount totals.
//!
//! Every message is snapshotted once, keyed by its file id. A later check
//! recomputes the snapshot from the live message and compares all three
//! values. Mismatches are returned as a `Verification`, never raised: the
//! caller decides whether a mismatch is fatal.

use std::fmt;
use std::sync::Arc;

use zengin_core::config::IntegrityConfig;
use zengin_core::crypto::{self, DigestError};
use zengin_core::{DataRecord, Message};

use crate::integrity_store::{IntegrityRecord, IntegrityStore, StoreError};

/// Location of the numeric amount subfield inside each data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountField {
    pub offset: usize,
    pub length: usize,
}

impl Default for AmountField {
    fn default() -> Self {
        Self {
            offset: 30,
            length: 12,
        }
    }
}

impl From<&IntegrityConfig> for AmountField {
    fn from(config: &IntegrityConfig) -> Self {
        Self {
            offset: config.amount_offset,
            length: config.amount_length,
        }
    }
}

/// Outcome of comparing a message against a reference snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified,
    /// No stored record for this message id.
    NotFound,
    HashMismatch,
    RecordCountMismatch { expected: u32, actual: u32 },
    AmountMismatch { expected: i64, actual: i64 },
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified)
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => f.write_str("verified"),
            Self::NotFound => f.write_str("no integrity record"),
            Self::HashMismatch => f.write_str("hash mismatch"),
            Self::RecordCountMismatch { expected, actual } => {
                write!(f, "record count mismatch: expected {expected}, got {actual}")
            }
            Self::AmountMismatch { expected, actual } => {
                write!(f, "total amount mismatch: expected {expected}, got {actual}")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    #[error(transparent)]
    Digest(#[from] DigestError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Hex digest of `data`. Empty input is an error.
pub fn hash(data: &[u8]) -> Result<String, IntegrityError> {
    Ok(crypto::hex_digest(data)?)
}

/// Case-insensitive digest comparison; an empty `expected` is `false`.
pub fn verify_hash(data: &[u8], expected: &str) -> Result<bool, IntegrityError> {
    Ok(crypto::matches_hex_digest(data, expected)?)
}

pub fn record_count(records: &[DataRecord]) -> u32 {
    u32::try_from(records.len()).unwrap_or(u32::MAX)
}

/// Sum the amount subfield `[offset, offset + length)` of every record.
///
/// A subfield that is out of range, not UTF-8, or not a decimal integer
/// after trimming contributes 0.
pub fn total_amount(records: &[DataRecord], offset: usize, length: usize) -> i64 {
    records
        .iter()
        .filter_map(|record| {
            let field = record.as_bytes().get(offset..offset.checked_add(length)?)?;
            std::str::from_utf8(field).ok()?.trim().parse::<i64>().ok()
        })
        .fold(0i64, |sum, amount| sum.saturating_add(amount))
}

/// Computes, persists and checks integrity records.
#[derive(Clone)]
pub struct IntegrityGuard {
    store: Arc<dyn IntegrityStore>,
    amount: AmountField,
}

impl IntegrityGuard {
    pub fn new(store: Arc<dyn IntegrityStore>, amount: AmountField) -> Self {
        Self { store, amount }
    }

    pub fn store(&self) -> &Arc<dyn IntegrityStore> {
        &self.store
    }

    pub fn amount_field(&self) -> AmountField {
        self.amount
    }

    fn total_amount_of(&self, message: &Message) -> i64 {
        total_amount(message.data_records(), self.amount.offset, self.amount.length)
    }

    /// Snapshot `message` and persist the snapshot under its file id.
    pub fn generate_and_store(&self, message: &Message) -> Result<IntegrityRecord, IntegrityError> {
        let record = IntegrityRecord::new(
            message.file_id(),
            hash(&message.encode())?,
            record_count(message.data_records()),
            self.total_amount_of(message),
        );
        self.store.put(record.clone())?;
        Ok(record)
    }

    /// Compare `message` against its stored snapshot.
    ///
    /// On a full match the stored record is marked verified; on any other
    /// outcome the store is left untouched.
    pub fn check(&self, message: &Message) -> Result<Verification, IntegrityError> {
        let Some(mut stored) = self.store.get_by_message_id(message.file_id())? else {
            return Ok(Verification::NotFound);
        };

        if !verify_hash(&message.encode(), &stored.hash_value)? {
            return Ok(Verification::HashMismatch);
        }

        let actual_count = record_count(message.data_records());
        if actual_count != stored.record_count {
            return Ok(Verification::RecordCountMismatch {
                expected: stored.record_count,
                actual: actual_count,
            });
        }

        let actual_amount = self.total_amount_of(message);
        if actual_amount != stored.total_amount {
            return Ok(Verification::AmountMismatch {
                expected: stored.total_amount,
                actual: actual_amount,
            });
        }

        stored.verified = true;
        self.store.put(stored)?;
        Ok(Verification::Verified)
    }

    pub fn verify(&self, message: &Message) -> Result<bool, IntegrityError> {
        Ok(self.check(message)?.is_verified())
    }

    /// Compare a message's body against counts claimed for it. Pure.
    pub fn trailer_consistency(
        &self,
        message: &Message,
        expected_count: u32,
        expected_amount: i64,
    ) -> Verification {
        let actual_count = record_count(message.data_records());
        if actual_count != expected_count {
            return Verification::RecordCountMismatch {
                expected: expected_count,
                actual: actual_count,
            };
        }
        let actual_amount = self.total_amount_of(message);
        if actual_amount != expected_amount {
            return Verification::AmountMismatch {
                expected: expected_amount,
                actual: actual_amount,
            };
        }
        Verification::Verified
    }

    pub fn verify_trailer_consistency(
        &self,
        message: &Message,
        expected_count: u32,
        expected_amount: i64,
    ) -> bool {
        self.trailer_consistency(message, expected_count, expected_amount)
            .is_verified()
    }

    /// True iff a record already exists for `message_id`.
    pub fn is_duplicate(&self, message_id: &str) -> Result<bool, IntegrityError> {
        Ok(self.store.get_by_message_id(message_id)?.is_some())
    }
}
