use crate::cache::{MemoryCache, Version, VersionedCache};
use crate::config::GateConfig;
use crate::error::Result;
use crate::gate::AgreementGate;
use crate::invalidator::GenerationInvalidator;
use crate::staff::StaffSkipIndex;
use crate::storage::{DocumentSave, RedbTermsStore, TermsStore};
use crate::terms;
use crate::types::{Agreement, Document, User, UserId, WriteOrigin};
use chrono::Utc;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

/// The gate and its write paths, wired to one cache and one store.
///
/// Document and user writes go through here so the cache hooks run
/// explicitly after each write: a document save bumps the generation, a
/// user save syncs that user's skip entry.
///
/// # Example
/// ```rust,no_run
/// use tos_core::{GateConfig, TermsOfService};
///
/// let tos = TermsOfService::open("./tos.redb", GateConfig::default()).unwrap();
/// tos.initialize().unwrap();
/// tos.publish("These are the terms.").unwrap();
/// ```
pub struct TermsOfService<C: VersionedCache, S: TermsStore> {
    store: Arc<S>,
    cache: Arc<C>,
    generation: GenerationInvalidator<C>,
    staff: StaffSkipIndex<C, S>,
    gate: AgreementGate<C, S>,
    config: GateConfig,
}

impl TermsOfService<MemoryCache, RedbTermsStore> {
    /// Open (or create) a store at the given path, backed by an in-process cache.
    pub fn open(path: impl AsRef<Path>, config: GateConfig) -> Result<Self> {
        let store = Arc::new(RedbTermsStore::open(path)?);
        let mut cache = MemoryCache::new(config.key_prefix.clone());
        if let Some(ttl) = config.cache_ttl() {
            cache = cache.with_ttl(ttl);
        }
        Ok(Self::new(store, Arc::new(cache), config))
    }
}

impl<C: VersionedCache, S: TermsStore> TermsOfService<C, S> {
    pub fn new(store: Arc<S>, cache: Arc<C>, config: GateConfig) -> Self {
        Self {
            generation: GenerationInvalidator::new(cache.clone()),
            staff: StaffSkipIndex::new(cache.clone(), store.clone()),
            gate: AgreementGate::new(cache.clone(), store.clone(), config.clone()),
            store,
            cache,
            config,
        }
    }

    /// Startup hook: establish the generation counter, then warm the staff
    /// index under it.
    pub fn initialize(&self) -> Result<Version> {
        let version = self.generation.initialize(false)?;
        self.staff.rebuild_all(WriteOrigin::Save)?;
        Ok(version)
    }

    // === Documents ===

    /// Save a document through the normal write path.
    ///
    /// Raw writes land as-is and leave the cache alone. Normal saves enforce
    /// the single-active rule, then bump the generation and re-warm the staff
    /// index under the new version.
    pub fn save_document(&self, document: &mut Document, origin: WriteOrigin) -> Result<DocumentSave> {
        if origin.is_raw() {
            self.store.put_documents_raw(std::slice::from_ref(document))?;
            return Ok(DocumentSave::default());
        }

        document.modified = Utc::now();
        let outcome = self.store.save_document(document, self.config.debug)?;
        if outcome.left_without_active {
            warn!("Saved terms {} but no terms of service are active", document.id);
        }

        let Some(version) = self.generation.on_document_saved(origin)? else {
            return Ok(outcome);
        };
        self.staff.rebuild_all(origin)?;
        info!(
            "Saved terms {} (active: {}), cache version now {}",
            document.id, document.active, version
        );
        Ok(outcome)
    }

    /// Create a new document and make it the active one.
    pub fn publish(&self, content: impl Into<String>) -> Result<Document> {
        let mut document = Document::new(content, true);
        self.save_document(&mut document, WriteOrigin::Save)?;
        Ok(document)
    }

    /// Bulk load. No invariant checks, no cache maintenance.
    pub fn load_documents_raw(&self, documents: &[Document]) -> Result<()> {
        self.store.put_documents_raw(documents)
    }

    /// The active document. See [`terms::current_document`].
    pub fn current_document(&self) -> Result<Option<Document>> {
        terms::current_document(&*self.store, self.config.debug)
    }

    pub fn list_documents(&self) -> Result<Vec<Document>> {
        self.store.list_documents()
    }

    // === Users ===

    /// Save a user and keep their skip entry in step.
    pub fn save_user(&self, user: &User, origin: WriteOrigin) -> Result<()> {
        self.store.put_user(user)?;
        self.staff.sync_one(user, origin)
    }

    // === Agreements ===

    /// Uncached check against the store.
    pub fn has_user_agreed_latest(&self, user_id: UserId) -> Result<bool> {
        terms::has_user_agreed_latest(&*self.store, user_id, self.config.debug)
    }

    /// Record acceptance of the active document. See
    /// [`AgreementGate::complete_acceptance`].
    pub fn accept(&self, user_id: UserId) -> Result<Agreement> {
        self.gate.complete_acceptance(user_id)
    }

    // === Components ===

    pub fn gate(&self) -> &AgreementGate<C, S> {
        &self.gate
    }

    pub fn staff(&self) -> &StaffSkipIndex<C, S> {
        &self.staff
    }

    pub fn generation(&self) -> &GenerationInvalidator<C> {
        &self.generation
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}
