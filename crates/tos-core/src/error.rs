use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, TosError>;

#[derive(Debug, Error)]
pub enum TosError {
    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Cache lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("No active terms of service")]
    NoActiveTerms,

    #[error("Cache counter missing: {0}")]
    CounterMissing(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(u64),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl TosError {
    /// True for transport and backing-store failures of the cache or the
    /// persistent store. These must reach the request pipeline untouched.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            TosError::Storage(_)
                | TosError::Database(_)
                | TosError::Table(_)
                | TosError::Transaction(_)
                | TosError::Commit(_)
                | TosError::StorageOperation(_)
                | TosError::Serialization(_)
                | TosError::LockPoisoned(_)
        )
    }
}
