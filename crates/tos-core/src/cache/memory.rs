use super::{CacheValue, Version, VersionedCache};
use crate::error::{Result, TosError};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process cache backend.
///
/// Versioned entries expire after the configured TTL, which is what
/// eventually reclaims entries abandoned by a version bump. Counters never
/// expire. `add` and `incr` run under the counter write lock, so they are
/// atomic for every thread sharing this instance.
pub struct MemoryCache {
    prefix: String,
    ttl: Option<Duration>,

    /// "<prefix>:<version>:<key>" → entry
    entries: RwLock<HashMap<String, Entry>>,

    /// "<prefix>::<key>" → counter value
    counters: RwLock<HashMap<String, i64>>,
}

impl MemoryCache {
    /// Create a cache whose entries never expire.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ttl: None,
            entries: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
        }
    }

    /// Expire versioned entries `ttl` after they are written.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn make_key(&self, version: Version, key: &str) -> String {
        format!("{}:{}:{}", self.prefix, version, key)
    }

    fn make_counter_key(&self, key: &str) -> String {
        format!("{}::{}", self.prefix, key)
    }

    fn entries_read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .read()
            .map_err(|_| TosError::LockPoisoned("memory cache entries"))
    }

    fn entries_write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .write()
            .map_err(|_| TosError::LockPoisoned("memory cache entries"))
    }

    fn counters_write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, i64>>> {
        self.counters
            .write()
            .map_err(|_| TosError::LockPoisoned("memory cache counters"))
    }

    fn entry(&self, value: CacheValue, now: Instant) -> Entry {
        Entry {
            value,
            expires_at: self.ttl.map(|ttl| now + ttl),
        }
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut entries = self.entries_write()?;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok(before - entries.len())
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let entries = self.entries_read()?.len();
        let counters = self
            .counters
            .read()
            .map_err(|_| TosError::LockPoisoned("memory cache counters"))?
            .len();
        Ok(CacheStats { entries, counters })
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new("tos")
    }
}

impl VersionedCache for MemoryCache {
    fn get(&self, version: Version, key: &str) -> Result<Option<CacheValue>> {
        let now = Instant::now();
        let entries = self.entries_read()?;
        Ok(entries
            .get(&self.make_key(version, key))
            .filter(|e| e.is_live(now))
            .map(|e| e.value))
    }

    fn set(&self, version: Version, key: &str, value: CacheValue) -> Result<()> {
        let entry = self.entry(value, Instant::now());
        self.entries_write()?.insert(self.make_key(version, key), entry);
        Ok(())
    }

    fn set_many(&self, version: Version, entries: Vec<(String, CacheValue)>) -> Result<()> {
        let now = Instant::now();
        let mut map = self.entries_write()?;
        for (key, value) in entries {
            map.insert(self.make_key(version, &key), self.entry(value, now));
        }
        Ok(())
    }

    fn delete(&self, version: Version, key: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self.entries_write()?.remove(&self.make_key(version, key));
        Ok(removed.is_some_and(|e| e.is_live(now)))
    }

    fn counter(&self, key: &str) -> Result<Option<i64>> {
        let counters = self
            .counters
            .read()
            .map_err(|_| TosError::LockPoisoned("memory cache counters"))?;
        Ok(counters.get(&self.make_counter_key(key)).copied())
    }

    fn add(&self, key: &str, initial: i64) -> Result<bool> {
        let mut counters = self.counters_write()?;
        let full_key = self.make_counter_key(key);
        if counters.contains_key(&full_key) {
            return Ok(false);
        }
        counters.insert(full_key, initial);
        Ok(true)
    }

    fn incr(&self, key: &str) -> Result<i64> {
        let mut counters = self.counters_write()?;
        match counters.get_mut(&self.make_counter_key(key)) {
            Some(value) => {
                *value += 1;
                Ok(*value)
            }
            None => Err(TosError::CounterMissing(key.to_string())),
        }
    }

    fn clear(&self) -> Result<()> {
        self.entries_write()?.clear();
        self.counters_write()?.clear();
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub counters: usize,
}
