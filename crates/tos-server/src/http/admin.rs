use super::{new_session_id, AppResult, AppState, JsonResponse};
use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tos_core::{CacheStats, Document, SessionData, SessionStore, TermsStore, TosError, User, UserId, Version, WriteOrigin};
use tracing::info;
use uuid::Uuid;

// ── Documents ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PublishRequest {
    content: String,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct DocumentData {
    id: Uuid,
    active: bool,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    content: String,
}

impl From<Document> for DocumentData {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            active: doc.active,
            created: doc.created,
            modified: doc.modified,
            content: doc.content,
        }
    }
}

#[derive(Serialize)]
pub struct PublishData {
    document: DocumentData,
    deactivated: usize,
    version: Version,
}

pub async fn publish_document(
    State(state): State<AppState>,
    Json(body): Json<PublishRequest>,
) -> AppResult<Json<JsonResponse<PublishData>>> {
    if body.content.trim().is_empty() {
        return Err(TosError::Validation("content must not be empty".into()).into());
    }

    let mut document = Document::new(body.content, body.active);
    let outcome = state.tos.save_document(&mut document, WriteOrigin::Save)?;
    let version = state.tos.generation().current()?;
    state.metrics.record_bump(version);

    Ok(Json(JsonResponse::ok(PublishData {
        document: document.into(),
        deactivated: outcome.deactivated,
        version,
    })))
}

pub async fn list_documents(State(state): State<AppState>) -> AppResult<Json<JsonResponse<Vec<DocumentData>>>> {
    let documents = state.tos.list_documents()?;
    Ok(Json(JsonResponse::ok(documents.into_iter().map(DocumentData::from).collect())))
}

// ── Users ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UserRequest {
    username: String,
    #[serde(default)]
    is_staff: bool,
    #[serde(default)]
    is_superuser: bool,
}

#[derive(Serialize)]
pub struct UserData {
    id: UserId,
    username: String,
    is_staff: bool,
    is_superuser: bool,
    skips_check: bool,
}

pub async fn put_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<UserRequest>,
) -> AppResult<Json<JsonResponse<UserData>>> {
    let user = User::new(id, body.username)
        .with_staff(body.is_staff)
        .with_superuser(body.is_superuser);
    state.tos.save_user(&user, WriteOrigin::Save)?;

    Ok(Json(JsonResponse::ok(UserData {
        skips_check: state.tos.staff().is_skipped(id)?,
        id: user.id,
        username: user.username,
        is_staff: user.is_staff,
        is_superuser: user.is_superuser,
    })))
}

// ── Sessions ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SessionRequest {
    user_id: UserId,
    #[serde(default = "default_backend")]
    backend: String,
}

fn default_backend() -> String {
    "password".to_string()
}

#[derive(Serialize)]
pub struct SessionCreated {
    session_id: String,
    cookie: String,
}

/// Log a known user in and hand back the session id for the cookie.
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<SessionRequest>,
) -> AppResult<Json<JsonResponse<SessionCreated>>> {
    if state.tos.store().get_user(body.user_id)?.is_none() {
        return Err(TosError::UserNotFound(body.user_id).into());
    }

    let session_id = new_session_id();
    state
        .sessions
        .save(&session_id, &SessionData::authenticated(body.user_id, body.backend))?;

    Ok(Json(JsonResponse::ok(SessionCreated {
        cookie: format!("{}={}", state.session_cookie, session_id),
        session_id,
    })))
}

// ── Cache ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct RebuildData {
    added: usize,
}

pub async fn rebuild_staff_cache(State(state): State<AppState>) -> AppResult<Json<JsonResponse<RebuildData>>> {
    let added = state.tos.staff().rebuild_all(WriteOrigin::Save)?;
    info!("Successfully added staff users to TOS staff ({} users)", added);
    Ok(Json(JsonResponse::ok(RebuildData { added })))
}

#[derive(Serialize)]
pub struct VersionData {
    version: Version,
    cache_entries: usize,
    cache_counters: usize,
}

pub async fn cache_version(State(state): State<AppState>) -> AppResult<Json<JsonResponse<VersionData>>> {
    let version = state.tos.generation().current()?;
    let CacheStats { entries, counters } = state.tos.cache().stats()?;
    Ok(Json(JsonResponse::ok(VersionData {
        version,
        cache_entries: entries,
        cache_counters: counters,
    })))
}
