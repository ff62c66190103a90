use crate::error::Result;
use crate::storage::stats::{DocumentSave, StoreStats};
use crate::types::{Agreement, Document, DocumentId, User, UserId};
use std::sync::Arc;

/// Persistent store behind the gate.
pub trait TermsStore: Send + Sync {
    // === Documents ===

    /// Insert or update a document, keeping at most one active.
    ///
    /// Saving an active document deactivates every other one in the same
    /// transaction. Saving an inactive document when no other document is
    /// active fails with `NoActiveTerms`, unless `allow_no_active` is set.
    fn save_document(&self, document: &Document, allow_no_active: bool) -> Result<DocumentSave>;

    /// Write documents as-is. No invariant enforcement. Used for fixture
    /// loads and migrations.
    fn put_documents_raw(&self, documents: &[Document]) -> Result<()>;

    /// Retrieve a document by ID
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>>;

    /// All documents, oldest first
    fn list_documents(&self) -> Result<Vec<Document>>;

    /// The active document, if any
    fn active_document(&self) -> Result<Option<Document>>;

    // === Agreements ===

    /// Whether the user accepted this document revision
    fn has_agreement(&self, user_id: UserId, document_id: DocumentId) -> Result<bool>;

    /// Get-or-create the agreement for (user, document). Never creates a
    /// second row for the same pair.
    fn agree(&self, user_id: UserId, document_id: DocumentId) -> Result<Agreement>;

    /// All agreements a user has made, oldest first
    fn agreements_for_user(&self, user_id: UserId) -> Result<Vec<Agreement>>;

    // === Users ===

    /// Insert or update a user
    fn put_user(&self, user: &User) -> Result<()>;

    /// Retrieve a user by ID
    fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Users with `is_staff` or `is_superuser` set
    fn list_staff_users(&self) -> Result<Vec<User>>;

    // === Maintenance ===

    /// Get store statistics
    fn stats(&self) -> Result<StoreStats>;
}

impl<S: TermsStore + ?Sized> TermsStore for Arc<S> {
    fn save_document(&self, document: &Document, allow_no_active: bool) -> Result<DocumentSave> {
        (**self).save_document(document, allow_no_active)
    }

    fn put_documents_raw(&self, documents: &[Document]) -> Result<()> {
        (**self).put_documents_raw(documents)
    }

    fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        (**self).get_document(id)
    }

    fn list_documents(&self) -> Result<Vec<Document>> {
        (**self).list_documents()
    }

    fn active_document(&self) -> Result<Option<Document>> {
        (**self).active_document()
    }

    fn has_agreement(&self, user_id: UserId, document_id: DocumentId) -> Result<bool> {
        (**self).has_agreement(user_id, document_id)
    }

    fn agree(&self, user_id: UserId, document_id: DocumentId) -> Result<Agreement> {
        (**self).agree(user_id, document_id)
    }

    fn agreements_for_user(&self, user_id: UserId) -> Result<Vec<Agreement>> {
        (**self).agreements_for_user(user_id)
    }

    fn put_user(&self, user: &User) -> Result<()> {
        (**self).put_user(user)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        (**self).get_user(id)
    }

    fn list_staff_users(&self) -> Result<Vec<User>> {
        (**self).list_staff_users()
    }

    fn stats(&self) -> Result<StoreStats> {
        (**self).stats()
    }
}
