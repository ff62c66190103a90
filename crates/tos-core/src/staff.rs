//! Cached set of users who bypass the acceptance check.
//!
//! Entries live under the current generation like every other derived fact,
//! so a version bump drops the whole index. `rebuild_all` repopulates it in
//! one `set_many`; `sync_one` keeps it current as users change.

use crate::cache::{keys, CacheValue, VersionedCache};
use crate::error::Result;
use crate::invalidator::GenerationInvalidator;
use crate::storage::TermsStore;
use crate::types::{User, UserId, WriteOrigin};
use log::{debug, info};
use std::sync::Arc;

pub struct StaffSkipIndex<C: VersionedCache, S: TermsStore> {
    cache: Arc<C>,
    store: Arc<S>,
    generation: GenerationInvalidator<C>,
}

impl<C: VersionedCache, S: TermsStore> StaffSkipIndex<C, S> {
    pub fn new(cache: Arc<C>, store: Arc<S>) -> Self {
        let generation = GenerationInvalidator::new(cache.clone());
        Self {
            cache,
            store,
            generation,
        }
    }

    /// Write a skip entry for every staff user and superuser.
    ///
    /// Safe to call repeatedly. Returns the number of entries written.
    pub fn rebuild_all(&self, origin: WriteOrigin) -> Result<usize> {
        if origin.is_raw() {
            return Ok(0);
        }

        let version = self.generation.current()?;
        let entries: Vec<(String, CacheValue)> = self
            .store
            .list_staff_users()?
            .into_iter()
            .map(|user| (keys::skip_tos_check(user.id), CacheValue::Bool(true)))
            .collect();
        let count = entries.len();

        self.cache.set_many(version, entries)?;
        info!("Added {} staff users to TOS skip cache (version {})", count, version);
        Ok(count)
    }

    /// Post-write hook for user saves.
    ///
    /// Staff and superusers get a skip entry. Anyone else loses theirs, so a
    /// demotion takes effect on the next request.
    pub fn sync_one(&self, user: &User, origin: WriteOrigin) -> Result<()> {
        if origin.is_raw() {
            return Ok(());
        }

        let version = self.generation.current()?;
        let key = keys::skip_tos_check(user.id);

        if user.may_skip_check() {
            self.cache.set(version, &key, CacheValue::Bool(true))?;
            debug!("User {} may skip the TOS check", user.id);
        } else if self.cache.get(version, &key)?.is_some() {
            self.cache.delete(version, &key)?;
            debug!("User {} no longer skips the TOS check", user.id);
        }
        Ok(())
    }

    /// Whether the user currently holds a skip entry.
    pub fn is_skipped(&self, user_id: UserId) -> Result<bool> {
        let version = self.generation.current()?;
        Ok(self
            .cache
            .get(version, &keys::skip_tos_check(user_id))?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::storage::RedbTermsStore;
    use tempfile::TempDir;

    struct Fixture {
        index: StaffSkipIndex<MemoryCache, RedbTermsStore>,
        cache: Arc<MemoryCache>,
        store: Arc<RedbTermsStore>,
        _temp: TempDir,
    }

    /// Users 1..10: ids below 3 are staff, even ids are superusers.
    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(RedbTermsStore::open(temp.path().join("staff.redb")).unwrap());
        for i in 1..10u64 {
            let user = User::new(i, format!("user{}", i))
                .with_staff(i < 3)
                .with_superuser(i % 2 == 0);
            store.put_user(&user).unwrap();
        }

        let cache = Arc::new(MemoryCache::default());
        GenerationInvalidator::new(cache.clone()).initialize(false).unwrap();

        Fixture {
            index: StaffSkipIndex::new(cache.clone(), store.clone()),
            cache,
            store,
            _temp: temp,
        }
    }

    fn expected_skip(i: u64) -> bool {
        i < 3 || i % 2 == 0
    }

    #[test]
    fn test_rebuild_all_marks_staff_and_superusers() {
        let f = fixture();
        for i in 1..10 {
            assert!(!f.index.is_skipped(i).unwrap());
        }

        let written = f.index.rebuild_all(WriteOrigin::Save).unwrap();
        assert_eq!(written, 6);

        for i in 1..10 {
            assert_eq!(f.index.is_skipped(i).unwrap(), expected_skip(i), "user {}", i);
        }

        // Idempotent
        assert_eq!(f.index.rebuild_all(WriteOrigin::Save).unwrap(), 6);
    }

    #[test]
    fn test_raw_origin_is_noop() {
        let f = fixture();
        assert_eq!(f.index.rebuild_all(WriteOrigin::Raw).unwrap(), 0);
        let admin = f.store.get_user(1).unwrap().unwrap();
        f.index.sync_one(&admin, WriteOrigin::Raw).unwrap();

        assert_eq!(f.cache.stats().unwrap().entries, 0);
    }

    #[test]
    fn test_sync_one_follows_privileges() {
        let f = fixture();
        for i in 1..10 {
            let user = f.store.get_user(i).unwrap().unwrap();
            f.index.sync_one(&user, WriteOrigin::Save).unwrap();
            assert_eq!(f.index.is_skipped(i).unwrap(), expected_skip(i), "user {}", i);

            if !expected_skip(i) {
                // A stale entry for a regular user is removed on the next sync
                let version = f.cache.counter(keys::KEY_VERSION).unwrap().unwrap();
                f.cache.set(version, &keys::skip_tos_check(i), true.into()).unwrap();
                f.index.sync_one(&user, WriteOrigin::Save).unwrap();
                assert!(!f.index.is_skipped(i).unwrap());
            }
        }
    }

    #[test]
    fn test_demotion_removes_bypass() {
        let f = fixture();
        let admin = f.store.get_user(1).unwrap().unwrap();
        f.index.sync_one(&admin, WriteOrigin::Save).unwrap();
        assert!(f.index.is_skipped(1).unwrap());

        let demoted = admin.with_staff(false);
        f.store.put_user(&demoted).unwrap();
        f.index.sync_one(&demoted, WriteOrigin::Save).unwrap();

        assert!(!f.index.is_skipped(1).unwrap());
    }

    #[test]
    fn test_bump_drops_index() {
        let f = fixture();
        f.index.rebuild_all(WriteOrigin::Save).unwrap();
        GenerationInvalidator::new(f.cache.clone()).bump().unwrap();

        assert!(!f.index.is_skipped(1).unwrap());
    }
}
