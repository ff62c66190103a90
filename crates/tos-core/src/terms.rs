use crate::error::{Result, TosError};
use crate::storage::TermsStore;
use crate::types::{Document, UserId};
use log::warn;

/// The active document.
///
/// Without one this is `NoActiveTerms`, except in debug mode where it is
/// logged and reported as `None`.
pub fn current_document<S: TermsStore + ?Sized>(store: &S, debug: bool) -> Result<Option<Document>> {
    match store.active_document()? {
        Some(document) => Ok(Some(document)),
        None if debug => {
            warn!("There are no active terms of service");
            Ok(None)
        }
        None => Err(TosError::NoActiveTerms),
    }
}

/// Whether the user accepted the currently active document. Reads the store
/// directly, bypassing the cache.
pub fn has_user_agreed_latest<S: TermsStore + ?Sized>(
    store: &S,
    user_id: UserId,
    debug: bool,
) -> Result<bool> {
    match current_document(store, debug)? {
        Some(document) => store.has_agreement(user_id, document.id),
        None => Ok(false),
    }
}
