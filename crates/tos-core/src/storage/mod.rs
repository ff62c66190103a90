mod redb_storage;
mod stats;
mod traits;

pub use redb_storage::{RedbTermsStore, CURRENT_SCHEMA_VERSION};
pub use stats::{DocumentSave, StoreStats};
pub use traits::TermsStore;
