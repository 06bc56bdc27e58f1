//! zengin-services: integrity records, their stores, and the integrity guard.

pub mod integrity;
pub mod integrity_store;
pub mod sqlite_store;

pub use integrity::{AmountField, IntegrityError, IntegrityGuard, Verification};
pub use integrity_store::{IntegrityRecord, IntegrityStore, MemoryIntegrityStore, StoreError};
pub use sqlite_store::SqliteIntegrityStore;
