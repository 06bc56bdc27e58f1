use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Verification snapshot for one transmitted or received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityRecord {
    /// The message's file id. Primary key.
    pub message_id: String,
    /// Lowercase hex digest of the encoded message.
    pub hash_value: String,
    pub record_count: u32,
    /// Sum of the amount subfields of every data record.
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
    /// Set once a later verification matched this snapshot.
    pub verified: bool,
}

impl IntegrityRecord {
    pub fn new(
        message_id: impl Into<String>,
        hash_value: impl Into<String>,
        record_count: u32,
        total_amount: i64,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            hash_value: hash_value.into(),
            record_count,
            total_amount,
            created_at: Utc::now(),
            verified: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("integrity store backend failed: {0}")]
    Backend(#[from] rusqlite::Error),
    #[error("stored record {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Key-value persistence for integrity records.
///
/// Implementations must give read-your-writes consistency per key and be
/// safe to share across threads. No multi-key transactions are needed:
/// every flow touches exactly one message id.
pub trait IntegrityStore: Send + Sync {
    /// Insert or replace the record keyed by `record.message_id`.
    fn put(&self, record: IntegrityRecord) -> Result<(), StoreError>;

    fn get_by_message_id(&self, message_id: &str) -> Result<Option<IntegrityRecord>, StoreError>;

    fn list_all(&self) -> Result<Vec<IntegrityRecord>, StoreError>;

    /// Records created strictly after `cutoff`.
    fn list_created_after(&self, cutoff: DateTime<Utc>) -> Result<Vec<IntegrityRecord>, StoreError>;

    /// Returns true if a record was removed.
    fn delete_by_message_id(&self, message_id: &str) -> Result<bool, StoreError>;

    /// Records created within the last `days` days. Non-positive `days` yields nothing.
    fn list_recent(&self, days: i64) -> Result<Vec<IntegrityRecord>, StoreError> {
        if days <= 0 {
            return Ok(Vec::new());
        }
        self.list_created_after(Utc::now() - Duration::days(days))
    }
}

/// In-memory integrity store
#[derive(Clone, Default)]
pub struct MemoryIntegrityStore {
    /// message_id -> IntegrityRecord
    records: Arc<DashMap<String, IntegrityRecord>>,
}

impl MemoryIntegrityStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl IntegrityStore for MemoryIntegrityStore {
    fn put(&self, record: IntegrityRecord) -> Result<(), StoreError> {
        self.records.insert(record.message_id.clone(), record);
        Ok(())
    }

    fn get_by_message_id(&self, message_id: &str) -> Result<Option<IntegrityRecord>, StoreError> {
        Ok(self.records.get(message_id).map(|r| r.value().clone()))
    }

    fn list_all(&self) -> Result<Vec<IntegrityRecord>, StoreError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }

    fn list_created_after(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<IntegrityRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.created_at > cutoff)
            .map(|r| r.value().clone())
            .collect())
    }

    fn delete_by_message_id(&self, message_id: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(message_id).is_some())
    }
}
