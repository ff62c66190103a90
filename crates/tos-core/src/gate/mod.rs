//! Per-request agreement check.
//!
//! Evaluation runs in four steps: fast skip on request shape, cache check
//! under the current generation, store fallback on a miss (with write-back),
//! then the decision. No lock is held across steps; concurrent requests for
//! the same user may both fall back to the store, which is harmless.

use crate::cache::{keys, CacheValue, VersionedCache};
use crate::config::GateConfig;
use crate::error::{Result, TosError};
use crate::invalidator::GenerationInvalidator;
use crate::session::{PendingAcceptance, SessionData};
use crate::storage::TermsStore;
use crate::terms::current_document;
use crate::types::{Agreement, UserId};
use log::debug;
use std::fmt;
use std::sync::Arc;

/// The request shape the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Asynchronous/background sub-request.
    pub is_ajax: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Send the user to the acceptance page. `location` carries the
    /// original path in the redirect field.
    RedirectToAcceptance { location: String },
}

/// Which step settled the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionPath {
    SkipMethod,
    SkipAjax,
    SkipAcceptancePage,
    SkipAnonymous,
    StaffBypass,
    CachedVerdict,
    StoreLookup,
    /// Debug mode only: no active document, user treated as not agreed.
    NoActiveTerms,
}

impl DecisionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionPath::SkipMethod => "skip_method",
            DecisionPath::SkipAjax => "skip_ajax",
            DecisionPath::SkipAcceptancePage => "skip_acceptance_page",
            DecisionPath::SkipAnonymous => "skip_anonymous",
            DecisionPath::StaffBypass => "staff_bypass",
            DecisionPath::CachedVerdict => "cached_verdict",
            DecisionPath::StoreLookup => "store_lookup",
            DecisionPath::NoActiveTerms => "no_active_terms",
        }
    }

    /// Settled before touching the cache or the store.
    pub fn is_fast_skip(&self) -> bool {
        matches!(
            self,
            DecisionPath::SkipMethod
                | DecisionPath::SkipAjax
                | DecisionPath::SkipAcceptancePage
                | DecisionPath::SkipAnonymous
        )
    }
}

impl fmt::Display for DecisionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub decision: GateDecision,
    pub path: DecisionPath,
}

impl GateOutcome {
    fn allow(path: DecisionPath) -> Self {
        Self {
            decision: GateDecision::Allow,
            path,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == GateDecision::Allow
    }
}

pub struct AgreementGate<C: VersionedCache, S: TermsStore> {
    cache: Arc<C>,
    store: Arc<S>,
    generation: GenerationInvalidator<C>,
    config: GateConfig,
}

impl<C: VersionedCache, S: TermsStore> AgreementGate<C, S> {
    pub fn new(cache: Arc<C>, store: Arc<S>, config: GateConfig) -> Self {
        let generation = GenerationInvalidator::new(cache.clone());
        Self {
            cache,
            store,
            generation,
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Decide whether the request may proceed.
    ///
    /// On redirect, the pending user and their auth backend are stashed in
    /// `session` for the acceptance flow. Cache and store failures propagate;
    /// they never turn into `Allow`.
    pub fn evaluate(&self, request: &GateRequest<'_>, session: &mut SessionData) -> Result<GateOutcome> {
        // Fast skip
        if !request.method.eq_ignore_ascii_case("GET") {
            return Ok(GateOutcome::allow(DecisionPath::SkipMethod));
        }
        if request.is_ajax {
            return Ok(GateOutcome::allow(DecisionPath::SkipAjax));
        }
        if request.path == self.config.acceptance_path {
            return Ok(GateOutcome::allow(DecisionPath::SkipAcceptancePage));
        }
        let user_id = match session.auth_user_id {
            Some(id) => id,
            None => return Ok(GateOutcome::allow(DecisionPath::SkipAnonymous)),
        };

        // Cache check
        let version = self.generation.current()?;
        let skip = self
            .cache
            .get(version, &keys::skip_tos_check(user_id))?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if skip {
            return Ok(GateOutcome::allow(DecisionPath::StaffBypass));
        }

        let agreed_key = keys::agreed(user_id);
        let cached = self.cache.get(version, &agreed_key)?.and_then(|v| v.as_bool());

        // Store fallback
        let (agreed, path) = match cached {
            Some(agreed) => (agreed, DecisionPath::CachedVerdict),
            None => match current_document(&*self.store, self.config.debug)? {
                Some(document) => {
                    let agreed = self.store.has_agreement(user_id, document.id)?;
                    self.cache.set(version, &agreed_key, CacheValue::Bool(agreed))?;
                    (agreed, DecisionPath::StoreLookup)
                }
                None => (false, DecisionPath::NoActiveTerms),
            },
        };

        // Decision
        if agreed {
            return Ok(GateOutcome::allow(path));
        }

        let backend = session.auth_backend.clone().unwrap_or_default();
        session.stash_pending(PendingAcceptance { user_id, backend });
        let location = self.acceptance_location(request.path);
        debug!("User {} has not agreed to the active terms; redirecting", user_id);

        Ok(GateOutcome {
            decision: GateDecision::RedirectToAcceptance { location },
            path,
        })
    }

    fn acceptance_location(&self, next: &str) -> String {
        format!(
            "{}?{}={}",
            self.config.acceptance_path,
            self.config.redirect_field,
            urlencoding::encode(next)
        )
    }

    /// Record acceptance of the active document.
    ///
    /// Get-or-create keeps a second submission from adding a row. The cached
    /// verdict is deleted explicitly: acceptance does not bump the
    /// generation, so a cached `false` would otherwise outlive the agreement.
    pub fn complete_acceptance(&self, user_id: UserId) -> Result<Agreement> {
        let document = current_document(&*self.store, false)?
            .ok_or(TosError::NoActiveTerms)?;
        let agreement = self.store.agree(user_id, document.id)?;

        let version = self.generation.current()?;
        self.cache.delete(version, &keys::agreed(user_id))?;
        debug!("User {} agreed to terms {}", user_id, document.id);
        Ok(agreement)
    }
}
