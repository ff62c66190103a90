pub mod types;
pub mod storage;
pub mod error;
pub mod cache;
pub mod config;
pub mod invalidator;
pub mod staff;
pub mod gate;
pub mod session;
pub mod redirect;
pub mod terms;
pub mod api;

pub use error::{TosError, Result};
pub use types::*;
pub use storage::{TermsStore, RedbTermsStore, DocumentSave, StoreStats, CURRENT_SCHEMA_VERSION};
pub use cache::{keys, CacheStats, CacheValue, MemoryCache, Version, VersionedCache, DEFAULT_VERSION};
pub use config::GateConfig;
pub use invalidator::GenerationInvalidator;
pub use staff::StaffSkipIndex;
pub use gate::{AgreementGate, DecisionPath, GateDecision, GateOutcome, GateRequest};
pub use session::{MemorySessionStore, PendingAcceptance, SessionData, SessionStore};
pub use redirect::{is_same_origin_path, safe_redirect};
pub use api::TermsOfService;

#[cfg(test)]
mod tests;
