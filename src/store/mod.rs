pub mod database;
pub mod in_memory;

use crate::model::{Address, AddressId, CommuteSample, NewSample, Role, Route};

pub use database::RedbStore;
pub use in_memory::InMemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("failed to open table: {0}")]
    Table(#[from] redb::TableError),
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("commit failed: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("failed to encode record: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode record: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("index points at missing sample {0}")]
    DanglingIndex(u64),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Addresses a commute can start or end at.
pub trait AddressRegistry: Send + Sync {
    fn add_address(&self, label: &str, address: &str, role: Role)
        -> Result<Address, StoreError>;

    /// All addresses, or only those with the given role, in id order.
    fn addresses(&self, role: Option<Role>) -> Result<Vec<Address>, StoreError>;

    fn address(&self, id: AddressId) -> Result<Option<Address>, StoreError>;

    /// Returns false if no such address existed. Samples referencing the
    /// address are left alone.
    fn delete_address(&self, id: AddressId) -> Result<bool, StoreError>;
}

/// Append-only log of commute samples.
pub trait SampleStore: Send + Sync {
    /// Assigns the next sample id and persists the sample. Concurrent appends
    /// never share an id.
    fn append(&self, sample: NewSample) -> Result<CommuteSample, StoreError>;

    /// Every sample for a route, ordered by (day of week, hour, id).
    fn samples_for_route(&self, route: Route) -> Result<Vec<CommuteSample>, StoreError>;
}
