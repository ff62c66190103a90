//! Versioned key/value cache.
//!
//! Every derived entry lives under a version number. Reading with a newer
//! version makes older entries unreachable, so a whole family of cached facts
//! is invalidated by bumping one counter. Stale entries are never deleted by
//! the gate; the backend's own expiry reclaims them.
//!
//! Counters (the version counter itself) are unversioned and must support
//! atomic `add` (set-if-absent) and `incr`.

mod memory;

pub use memory::{CacheStats, MemoryCache};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Version number scoping derived cache entries.
pub type Version = i64;

/// Version used when no counter has been established yet. Bumps start the
/// counter at 0 and increment, so they never produce this value.
pub const DEFAULT_VERSION: Version = 0;

/// Cache key names shared by the invalidator, the staff index and the gate.
pub mod keys {
    use crate::types::UserId;

    /// Unversioned generation counter.
    pub const KEY_VERSION: &str = "key_version";

    pub fn agreed(user_id: UserId) -> String {
        format!("agreed:{}", user_id)
    }

    pub fn skip_tos_check(user_id: UserId) -> String {
        format!("skip_tos_check:{}", user_id)
    }
}

/// A cached value. Absence is expressed with `Option`, so a cached `false`
/// is always distinguishable from a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheValue {
    Bool(bool),
    Int(i64),
}

impl CacheValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CacheValue::Bool(b) => Some(*b),
            CacheValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CacheValue::Int(i) => Some(*i),
            CacheValue::Bool(_) => None,
        }
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        CacheValue::Bool(value)
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        CacheValue::Int(value)
    }
}

/// Cache backend contract.
///
/// Implementations must make `add` and `incr` atomic across concurrent
/// callers. `set_many` may apply entries one by one.
pub trait VersionedCache: Send + Sync {
    // === Versioned entries ===

    /// Read an entry written under `version`. `None` is a normal miss.
    fn get(&self, version: Version, key: &str) -> Result<Option<CacheValue>>;

    /// Write an entry under `version`.
    fn set(&self, version: Version, key: &str, value: CacheValue) -> Result<()>;

    /// Write several entries under `version`.
    fn set_many(&self, version: Version, entries: Vec<(String, CacheValue)>) -> Result<()>;

    /// Remove an entry. Returns whether it existed.
    fn delete(&self, version: Version, key: &str) -> Result<bool>;

    // === Counters ===

    /// Read an unversioned counter.
    fn counter(&self, key: &str) -> Result<Option<i64>>;

    /// Establish a counter if absent. Returns `true` only for the caller that
    /// created it.
    fn add(&self, key: &str, initial: i64) -> Result<bool>;

    /// Atomically increment a counter and return the new value.
    /// Fails with `CounterMissing` when the counter was never added.
    fn incr(&self, key: &str) -> Result<i64>;

    // === Maintenance ===

    /// Drop everything, counters included.
    fn clear(&self) -> Result<()>;
}

impl<C: VersionedCache + ?Sized> VersionedCache for Arc<C> {
    fn get(&self, version: Version, key: &str) -> Result<Option<CacheValue>> {
        (**self).get(version, key)
    }

    fn set(&self, version: Version, key: &str, value: CacheValue) -> Result<()> {
        (**self).set(version, key, value)
    }

    fn set_many(&self, version: Version, entries: Vec<(String, CacheValue)>) -> Result<()> {
        (**self).set_many(version, entries)
    }

    fn delete(&self, version: Version, key: &str) -> Result<bool> {
        (**self).delete(version, key)
    }

    fn counter(&self, key: &str) -> Result<Option<i64>> {
        (**self).counter(key)
    }

    fn add(&self, key: &str, initial: i64) -> Result<bool> {
        (**self).add(key, initial)
    }

    fn incr(&self, key: &str) -> Result<i64> {
        (**self).incr(key)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}
