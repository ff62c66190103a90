use crate::error::{Result, TosError};
use crate::storage::stats::{DocumentSave, StoreStats};
use crate::storage::traits::TermsStore;
use crate::types::{Agreement, Document, DocumentId, User, UserId};
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Table definitions
const DOCUMENTS: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("documents");
const AGREEMENTS: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("agreements");
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

// Unique (user_id BE ++ document_id) → agreement_id. Sorted by user first, so
// one user's agreements form a contiguous range.
const AGREEMENT_INDEX: TableDefinition<&[u8], &[u8; 16]> =
    TableDefinition::new("agreements_by_user_document");

// Metadata table
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Redb-based store implementation
pub struct RedbTermsStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbTermsStore {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TosError::Validation(format!("Failed to create directory: {}", e))
            })?;
        }

        let is_new = !path.exists();
        let db = Database::create(&path)?;

        if !is_new {
            Self::check_schema_version(&db)?;
        }

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DOCUMENTS)?;
            let _ = write_txn.open_table(AGREEMENTS)?;
            let _ = write_txn.open_table(AGREEMENT_INDEX)?;
            let _ = write_txn.open_table(USERS)?;
            let mut meta = write_txn.open_table(META)?;
            if is_new {
                meta.insert(SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string().as_bytes())?;
            }
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    fn check_schema_version(db: &Database) -> Result<()> {
        let read_txn = db.begin_read()?;
        let version = read_txn
            .open_table(META)
            .ok()
            .and_then(|t| {
                t.get(SCHEMA_VERSION_KEY).ok().flatten().and_then(|v| {
                    std::str::from_utf8(v.value())
                        .ok()
                        .and_then(|s| s.parse::<u32>().ok())
                })
            })
            .unwrap_or(CURRENT_SCHEMA_VERSION);

        if version > CURRENT_SCHEMA_VERSION {
            return Err(TosError::Validation(format!(
                "Database schema v{} is newer than this binary v{}.",
                version, CURRENT_SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn uuid_to_bytes(id: &uuid::Uuid) -> [u8; 16] {
        *id.as_bytes()
    }

    fn agreement_key(user_id: UserId, document_id: &DocumentId) -> [u8; 24] {
        let mut key = [0u8; 24];
        key[..8].copy_from_slice(&user_id.to_be_bytes());
        key[8..].copy_from_slice(document_id.as_bytes());
        key
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(TosError::from)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(TosError::from)
    }

    fn all_documents<T: ReadableTable<&'static [u8; 16], &'static [u8]>>(
        table: &T,
    ) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            documents.push(Self::deserialize::<Document>(value.value())?);
        }
        documents.sort_by_key(|d| d.created);
        Ok(documents)
    }
}

impl TermsStore for RedbTermsStore {
    fn save_document(&self, document: &Document, allow_no_active: bool) -> Result<DocumentSave> {
        let write_txn = self.db.begin_write()?;
        let mut outcome = DocumentSave::default();
        {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            let others: Vec<Document> = Self::all_documents(&table)?
                .into_iter()
                .filter(|d| d.id != document.id)
                .collect();

            if document.active {
                let now = Utc::now();
                for mut other in others.into_iter().filter(|d| d.active) {
                    other.active = false;
                    other.modified = now;
                    let bytes = Self::serialize(&other)?;
                    table.insert(&Self::uuid_to_bytes(&other.id), bytes.as_slice())?;
                    outcome.deactivated += 1;
                }
            } else if !others.iter().any(|d| d.active) {
                if !allow_no_active {
                    // Dropping the transaction aborts it
                    return Err(TosError::NoActiveTerms);
                }
                outcome.left_without_active = true;
            }

            let bytes = Self::serialize(document)?;
            table.insert(&Self::uuid_to_bytes(&document.id), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(outcome)
    }

    fn put_documents_raw(&self, documents: &[Document]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            for document in documents {
                let bytes = Self::serialize(document)?;
                table.insert(&Self::uuid_to_bytes(&document.id), bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;

        if let Some(bytes) = table.get(&Self::uuid_to_bytes(&id))? {
            Ok(Some(Self::deserialize(bytes.value())?))
        } else {
            Ok(None)
        }
    }

    fn list_documents(&self) -> Result<Vec<Document>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;
        Self::all_documents(&table)
    }

    fn active_document(&self) -> Result<Option<Document>> {
        // Raw loads can leave several active; the newest one wins.
        Ok(self
            .list_documents()?
            .into_iter()
            .rev()
            .find(|d| d.active))
    }

    fn has_agreement(&self, user_id: UserId, document_id: DocumentId) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(AGREEMENT_INDEX)?;
        let key = Self::agreement_key(user_id, &document_id);
        Ok(index.get(key.as_slice())?.is_some())
    }

    fn agree(&self, user_id: UserId, document_id: DocumentId) -> Result<Agreement> {
        let write_txn = self.db.begin_write()?;
        let key = Self::agreement_key(user_id, &document_id);

        let existing_id = {
            let documents = write_txn.open_table(DOCUMENTS)?;
            if documents.get(&Self::uuid_to_bytes(&document_id))?.is_none() {
                return Err(TosError::DocumentNotFound(document_id));
            }
            let index = write_txn.open_table(AGREEMENT_INDEX)?;
            let found = index.get(key.as_slice())?.map(|guard| *guard.value());
            found
        };

        if let Some(agreement_id) = existing_id {
            let agreements = write_txn.open_table(AGREEMENTS)?;
            let bytes = agreements
                .get(&agreement_id)?
                .map(|guard| guard.value().to_vec())
                .ok_or_else(|| {
                    TosError::Validation(format!(
                        "Agreement index points at missing row for user {}",
                        user_id
                    ))
                })?;
            return Self::deserialize(&bytes);
        }

        let agreement = Agreement::new(user_id, document_id);
        let agreement_id = Self::uuid_to_bytes(&agreement.id);
        {
            let mut agreements = write_txn.open_table(AGREEMENTS)?;
            let bytes = Self::serialize(&agreement)?;
            agreements.insert(&agreement_id, bytes.as_slice())?;

            let mut index = write_txn.open_table(AGREEMENT_INDEX)?;
            index.insert(key.as_slice(), &agreement_id)?;
        }
        write_txn.commit()?;
        Ok(agreement)
    }

    fn agreements_for_user(&self, user_id: UserId) -> Result<Vec<Agreement>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(AGREEMENT_INDEX)?;
        let agreements = read_txn.open_table(AGREEMENTS)?;

        let mut start = [0x00u8; 24];
        let mut end = [0xffu8; 24];
        start[..8].copy_from_slice(&user_id.to_be_bytes());
        end[..8].copy_from_slice(&user_id.to_be_bytes());

        let mut result = Vec::new();
        for item in index.range(start.as_slice()..=end.as_slice())? {
            let (_, agreement_id) = item?;
            if let Some(bytes) = agreements.get(agreement_id.value())? {
                result.push(Self::deserialize::<Agreement>(bytes.value())?);
            }
        }
        result.sort_by_key(|a| a.created);
        Ok(result)
    }

    fn put_user(&self, user: &User) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            let bytes = Self::serialize(user)?;
            table.insert(user.id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        if let Some(bytes) = table.get(id)? {
            Ok(Some(Self::deserialize(bytes.value())?))
        } else {
            Ok(None)
        }
    }

    fn list_staff_users(&self) -> Result<Vec<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        let mut staff = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            let user: User = Self::deserialize(value.value())?;
            if user.may_skip_check() {
                staff.push(user);
            }
        }
        Ok(staff)
    }

    fn stats(&self) -> Result<StoreStats> {
        let read_txn = self.db.begin_read()?;
        let documents = Self::all_documents(&read_txn.open_table(DOCUMENTS)?)?;
        let agreement_count = read_txn.open_table(AGREEMENTS)?.iter()?.count() as u64;

        let users = read_txn.open_table(USERS)?;
        let mut user_count = 0;
        let mut staff_count = 0;
        for item in users.iter()? {
            let (_, value) = item?;
            let user: User = Self::deserialize(value.value())?;
            user_count += 1;
            if user.may_skip_check() {
                staff_count += 1;
            }
        }

        Ok(StoreStats {
            document_count: documents.len() as u64,
            agreement_count,
            user_count,
            staff_count,
            has_active_document: documents.iter().any(|d| d.active),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RedbTermsStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("tos_test.redb");
        let store = RedbTermsStore::open(&db_path).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_activating_deactivates_others() {
        let (store, _temp) = create_test_store();
        let first = Document::new("first edition of the terms of service", true);
        let mut second = Document::new("second edition of the terms of service", false);
        store.save_document(&first, false).unwrap();
        store.save_document(&second, false).unwrap();

        second.active = true;
        let outcome = store.save_document(&second, false).unwrap();
        assert_eq!(outcome.deactivated, 1);

        let first = store.get_document(first.id).unwrap().unwrap();
        assert!(!first.active);
        assert_eq!(store.active_document().unwrap().unwrap().id, second.id);
    }

    #[test]
    fn test_deactivating_last_active_is_rejected() {
        let (store, _temp) = create_test_store();
        let mut only = Document::new("the only terms", true);
        store.save_document(&only, false).unwrap();

        only.active = false;
        let err = store.save_document(&only, false).unwrap_err();
        assert!(matches!(err, TosError::NoActiveTerms));

        // Rejected save left the stored row untouched
        assert!(store.get_document(only.id).unwrap().unwrap().active);
    }

    #[test]
    fn test_tolerated_save_reports_missing_active() {
        let (store, _temp) = create_test_store();
        let doc = Document::new("draft", false);

        let outcome = store.save_document(&doc, true).unwrap();
        assert!(outcome.left_without_active);
        assert!(store.active_document().unwrap().is_none());
    }

    #[test]
    fn test_raw_put_skips_invariant() {
        let (store, _temp) = create_test_store();
        store
            .put_documents_raw(&[Document::new("The only TOS", false)])
            .unwrap();

        assert_eq!(store.list_documents().unwrap().len(), 1);
        assert!(store.active_document().unwrap().is_none());
    }

    #[test]
    fn test_agree_is_idempotent() {
        let (store, _temp) = create_test_store();
        let doc = Document::new("terms", true);
        store.save_document(&doc, false).unwrap();

        let first = store.agree(7, doc.id).unwrap();
        let second = store.agree(7, doc.id).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.agreements_for_user(7).unwrap().len(), 1);
        assert_eq!(store.stats().unwrap().agreement_count, 1);
        assert!(store.has_agreement(7, doc.id).unwrap());
        assert!(!store.has_agreement(8, doc.id).unwrap());
    }

    #[test]
    fn test_agree_unknown_document() {
        let (store, _temp) = create_test_store();
        let missing = uuid::Uuid::now_v7();
        let err = store.agree(1, missing).unwrap_err();
        assert!(matches!(err, TosError::DocumentNotFound(id) if id == missing));
    }

    #[test]
    fn test_agreements_for_user_are_scoped() {
        let (store, _temp) = create_test_store();
        let d1 = Document::new("v1", true);
        let d2 = Document::new("v2", true);
        store.save_document(&d1, false).unwrap();
        store.save_document(&d2, false).unwrap();

        store.agree(1, d1.id).unwrap();
        store.agree(1, d2.id).unwrap();
        store.agree(2, d2.id).unwrap();
        store.agree(u64::MAX, d1.id).unwrap();

        assert_eq!(store.agreements_for_user(1).unwrap().len(), 2);
        assert_eq!(store.agreements_for_user(2).unwrap().len(), 1);
        assert_eq!(store.agreements_for_user(u64::MAX).unwrap().len(), 1);
        assert!(store.agreements_for_user(3).unwrap().is_empty());
    }

    #[test]
    fn test_staff_listing() {
        let (store, _temp) = create_test_store();
        store.put_user(&User::new(1, "user1").with_staff(true)).unwrap();
        store.put_user(&User::new(2, "user2").with_superuser(true)).unwrap();
        store.put_user(&User::new(3, "user3")).unwrap();

        let mut ids: Vec<_> = store.list_staff_users().unwrap().iter().map(|u| u.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);

        let stats = store.stats().unwrap();
        assert_eq!(stats.user_count, 3);
        assert_eq!(stats.staff_count, 2);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("reopen.redb");

        let doc_id = {
            let store = RedbTermsStore::open(&db_path).unwrap();
            let doc = Document::new("persisted", true);
            store.save_document(&doc, false).unwrap();
            store.agree(5, doc.id).unwrap();
            doc.id
        };

        let store = RedbTermsStore::open(&db_path).unwrap();
        assert_eq!(store.active_document().unwrap().unwrap().id, doc_id);
        assert!(store.has_agreement(5, doc_id).unwrap());
    }
}
