mod acceptance;
mod admin;
pub mod auth;
pub mod gate;
pub mod metrics;
mod routes;

pub use metrics::TosMetrics;
pub use routes::create_router;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tos_core::{MemoryCache, MemorySessionStore, RedbTermsStore, SessionData, SessionStore, TermsOfService, TosError};

/// Concrete service type shared across HTTP handlers
pub type HttpTermsOfService = TermsOfService<MemoryCache, RedbTermsStore>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub tos: Arc<HttpTermsOfService>,
    pub sessions: Arc<MemorySessionStore>,
    pub metrics: Arc<TosMetrics>,
    pub session_cookie: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(tos: Arc<HttpTermsOfService>, session_cookie: impl Into<String>) -> Self {
        Self::with_sessions(tos, session_cookie, MemorySessionStore::new())
    }

    pub fn with_sessions(
        tos: Arc<HttpTermsOfService>,
        session_cookie: impl Into<String>,
        sessions: MemorySessionStore,
    ) -> Self {
        Self {
            tos,
            sessions: Arc::new(sessions),
            metrics: Arc::new(TosMetrics::new()),
            session_cookie: session_cookie.into(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Session id from the request cookie, if any.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        session_cookie(headers, &self.session_cookie)
    }

    /// Load the caller's session. Unknown or missing ids give an anonymous
    /// session.
    pub fn load_session(&self, headers: &HeaderMap) -> tos_core::Result<(Option<String>, SessionData)> {
        let id = self.session_id(headers);
        let data = match &id {
            Some(id) => self.sessions.load(id)?.unwrap_or_default(),
            None => SessionData::default(),
        };
        Ok((id, data))
    }
}

/// Read one cookie value from the `Cookie` header.
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

/// Random 128-bit session id, hex encoded.
pub fn new_session_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Headers that keep the response out of every cache.
pub fn add_never_cache_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("max-age=0, no-cache, no-store, must-revalidate, private"),
    );
    let expires = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    if let Ok(value) = HeaderValue::from_str(&expires) {
        headers.insert(header::EXPIRES, value);
    }
}

/// JSON response wrapper
#[derive(Serialize)]
pub struct JsonResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Custom error type for HTTP handlers
pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<TosError>() {
            Some(TosError::NoActiveTerms) => StatusCode::SERVICE_UNAVAILABLE,
            Some(TosError::DocumentNotFound(_)) | Some(TosError::UserNotFound(_)) => StatusCode::NOT_FOUND,
            Some(TosError::Validation(_)) => StatusCode::BAD_REQUEST,
            Some(err) if err.is_store_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(JsonResponse::<()>::err(self.0.to_string()))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;
