//! Durable integrity store backed by SQLite.
//!
//! One table, keyed by message id. Timestamps are stored as UTC
//! nanoseconds so range queries compare integers.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::integrity_store::{IntegrityRecord, IntegrityStore, StoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS integrity_records (
        message_id    TEXT PRIMARY KEY,
        hash_value    TEXT    NOT NULL,
        record_count  INTEGER NOT NULL,
        total_amount  INTEGER NOT NULL,
        created_at_ns INTEGER NOT NULL,
        verified      INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS integrity_records_created_at
        ON integrity_records (created_at_ns);
";

const COLUMNS: &str =
    "message_id, hash_value, record_count, total_amount, created_at_ns, verified";

pub struct SqliteIntegrityStore {
    conn: Mutex<Connection>,
}

impl SqliteIntegrityStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// A private database that lives as long as the store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<IntegrityRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM integrity_records {filter} ORDER BY created_at_ns"
        ))?;
        let rows = stmt.query_map(args, RawRecord::from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }
}

/// A row as read, before the integer columns are range-checked.
struct RawRecord {
    message_id: String,
    hash_value: String,
    record_count: i64,
    total_amount: i64,
    created_at_ns: i64,
    verified: bool,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            message_id: row.get(0)?,
            hash_value: row.get(1)?,
            record_count: row.get(2)?,
            total_amount: row.get(3)?,
            created_at_ns: row.get(4)?,
            verified: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<IntegrityRecord, StoreError> {
        let record_count = u32::try_from(self.record_count).map_err(|_| StoreError::Corrupt {
            id: self.message_id.clone(),
            reason: format!("record_count {} out of range", self.record_count),
        })?;
        Ok(IntegrityRecord {
            message_id: self.message_id,
            hash_value: self.hash_value,
            record_count,
            total_amount: self.total_amount,
            created_at: Utc.timestamp_nanos(self.created_at_ns),
            verified: self.verified,
        })
    }
}

fn to_nanos(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

impl IntegrityStore for SqliteIntegrityStore {
    fn put(&self, record: IntegrityRecord) -> Result<(), StoreError> {
        self.conn.lock().execute(
            &format!(
                "INSERT OR REPLACE INTO integrity_records ({COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                record.message_id,
                record.hash_value,
                record.record_count,
                record.total_amount,
                to_nanos(record.created_at),
                record.verified,
            ],
        )?;
        Ok(())
    }

    fn get_by_message_id(&self, message_id: &str) -> Result<Option<IntegrityRecord>, StoreError> {
        let raw = self
            .conn
            .lock()
            .query_row(
                &format!("SELECT {COLUMNS} FROM integrity_records WHERE message_id = ?1"),
                params![message_id],
                RawRecord::from_row,
            )
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    fn list_all(&self) -> Result<Vec<IntegrityRecord>, StoreError> {
        self.query("", &[])
    }

    fn list_created_after(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<IntegrityRecord>, StoreError> {
        self.query("WHERE created_at_ns > ?1", &[&to_nanos(cutoff)])
    }

    fn delete_by_message_id(&self, message_id: &str) -> Result<bool, StoreError> {
        let removed = self.conn.lock().execute(
            "DELETE FROM integrity_records WHERE message_id = ?1",
            params![message_id],
        )?;
        Ok(removed > 0)
    }
}
