//! Generation counter behind the versioned cache.
//!
//! Every derived entry (`agreed:*`, `skip_tos_check:*`) is written under the
//! current value of `key_version`. Bumping the counter makes all of them
//! unreachable at once. Nothing is deleted; the backend's expiry reclaims the
//! abandoned entries.

use crate::cache::{keys, Version, VersionedCache, DEFAULT_VERSION};
use crate::error::Result;
use crate::types::WriteOrigin;
use log::{debug, info, warn};
use std::sync::Arc;

pub struct GenerationInvalidator<C: VersionedCache> {
    cache: Arc<C>,
}

impl<C: VersionedCache> Clone for GenerationInvalidator<C> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<C: VersionedCache> GenerationInvalidator<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    /// Advance the generation. Returns the new version.
    ///
    /// `add` establishes the counter at 0 on the first bump ever; `incr` is
    /// the backend's atomic increment, so concurrent bumps never collapse.
    pub fn bump(&self) -> Result<Version> {
        self.cache.add(keys::KEY_VERSION, 0)?;
        let version = self.cache.incr(keys::KEY_VERSION)?;
        debug!("TOS cache key version bumped to {}", version);
        Ok(version)
    }

    /// Post-write hook for document saves. Raw writes leave the cache alone.
    pub fn on_document_saved(&self, origin: WriteOrigin) -> Result<Option<Version>> {
        if origin.is_raw() {
            return Ok(None);
        }
        self.bump().map(Some)
    }

    /// Startup hook: make sure a version exists before any request is served.
    ///
    /// Does nothing when the counter is already present, unless `force`.
    /// A missing counter means any cached entries predate the generation
    /// scheme, so the cache is wiped before the first bump.
    /// Returns the version in effect afterwards.
    pub fn initialize(&self, force: bool) -> Result<Version> {
        match self.cache.counter(keys::KEY_VERSION)? {
            Some(version) if !force => Ok(version),
            counter => {
                if counter.is_none() {
                    self.cache.clear()?;
                }
                let version = self.bump()?;
                info!("TOS cache key version initialized at {}", version);
                Ok(version)
            }
        }
    }

    /// The version to read and write derived entries under.
    pub fn current(&self) -> Result<Version> {
        match self.cache.counter(keys::KEY_VERSION)? {
            Some(version) => Ok(version),
            None => {
                warn!(
                    "TOS cache key version missing; using default version {}",
                    DEFAULT_VERSION
                );
                Ok(DEFAULT_VERSION)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheValue, MemoryCache};
    use proptest::prelude::*;
    use std::thread;

    fn invalidator() -> (GenerationInvalidator<MemoryCache>, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::default());
        (GenerationInvalidator::new(cache.clone()), cache)
    }

    #[test]
    fn test_first_bump_starts_at_one() {
        let (invalidator, cache) = invalidator();
        assert_eq!(cache.counter(keys::KEY_VERSION).unwrap(), None);

        assert_eq!(invalidator.bump().unwrap(), 1);
        assert_eq!(invalidator.bump().unwrap(), 2);
        assert_eq!(invalidator.current().unwrap(), 2);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (invalidator, cache) = invalidator();

        assert_eq!(invalidator.initialize(false).unwrap(), 1);
        assert_eq!(invalidator.initialize(false).unwrap(), 1);
        assert_eq!(cache.counter(keys::KEY_VERSION).unwrap(), Some(1));

        assert_eq!(invalidator.initialize(true).unwrap(), 2);
    }

    #[test]
    fn test_raw_save_does_not_bump() {
        let (invalidator, cache) = invalidator();
        invalidator.initialize(false).unwrap();

        assert_eq!(invalidator.on_document_saved(WriteOrigin::Raw).unwrap(), None);
        assert_eq!(cache.counter(keys::KEY_VERSION).unwrap(), Some(1));

        assert_eq!(invalidator.on_document_saved(WriteOrigin::Save).unwrap(), Some(2));
    }

    #[test]
    fn test_bump_abandons_old_entries() {
        let (invalidator, cache) = invalidator();
        let old = invalidator.initialize(false).unwrap();
        cache.set(old, &keys::agreed(9), CacheValue::Bool(true)).unwrap();

        let new = invalidator.bump().unwrap();

        assert_eq!(cache.get(new, &keys::agreed(9)).unwrap(), None);
        // Still stored under the old version, just never looked up again
        assert_eq!(cache.get(old, &keys::agreed(9)).unwrap(), Some(CacheValue::Bool(true)));
    }

    #[test]
    fn test_current_without_counter_uses_default() {
        let (invalidator, _cache) = invalidator();
        assert_eq!(invalidator.current().unwrap(), DEFAULT_VERSION);
    }

    #[test]
    fn test_first_bump_hides_entries_written_before_it() {
        let (invalidator, cache) = invalidator();
        let fallback = invalidator.current().unwrap();
        cache.set(fallback, &keys::agreed(7), CacheValue::Bool(true)).unwrap();

        let version = invalidator.bump().unwrap();

        assert_ne!(version, fallback);
        assert_eq!(cache.get(version, &keys::agreed(7)).unwrap(), None);
    }

    #[test]
    fn test_initialize_clears_entries_without_counter() {
        let (invalidator, cache) = invalidator();
        cache.set(1, &keys::agreed(7), CacheValue::Bool(true)).unwrap();

        let version = invalidator.initialize(false).unwrap();

        assert_eq!(version, 1);
        assert_eq!(cache.get(version, &keys::agreed(7)).unwrap(), None);
    }

    #[test]
    fn test_forced_initialize_keeps_counter() {
        let (invalidator, cache) = invalidator();
        invalidator.initialize(false).unwrap();
        invalidator.bump().unwrap();

        assert_eq!(invalidator.initialize(true).unwrap(), 3);
        assert_eq!(cache.counter(keys::KEY_VERSION).unwrap(), Some(3));
    }

    #[test]
    fn test_concurrent_bumps_count_exactly() {
        let (invalidator, cache) = invalidator();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let invalidator = invalidator.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        invalidator.bump().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.counter(keys::KEY_VERSION).unwrap(), Some(800));
    }

    proptest! {
        #[test]
        fn prop_n_bumps_yield_n(n in 1usize..200) {
            let (invalidator, _cache) = invalidator();
            let mut last = 0;
            for _ in 0..n {
                let version = invalidator.bump().unwrap();
                prop_assert!(version > last);
                last = version;
            }
            prop_assert_eq!(invalidator.current().unwrap(), n as i64);
        }
    }
}
