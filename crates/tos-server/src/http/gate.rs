use super::{add_never_cache_headers, AppError, AppState};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tos_core::{GateDecision, GateRequest, SessionStore};
use tracing::debug;

/// Header value marking an asynchronous request.
const AJAX_MARKER: &str = "XMLHttpRequest";

/// Agreement gate as axum middleware.
///
/// Loads the caller's session from the cookie, lets the core gate decide,
/// persists whatever the gate stashed in the session, and either forwards
/// the request or answers with an uncacheable redirect to the acceptance page.
pub async fn check(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match evaluate(&state, &req) {
        Ok(None) => next.run(req).await,
        Ok(Some(location)) => redirect(&location),
        Err(e) => {
            state.metrics.gate_errors.inc();
            e.into_response()
        }
    }
}

/// Returns the redirect location when the request must not proceed.
fn evaluate(state: &AppState, req: &Request) -> Result<Option<String>, AppError> {
    let (session_id, mut session) = state.load_session(req.headers())?;
    let before = session.clone();

    let ajax_header = state.tos.config().ajax_header.as_str();
    let is_ajax = req
        .headers()
        .get(ajax_header)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case(AJAX_MARKER))
        .unwrap_or(false);

    let request = GateRequest {
        method: req.method().as_str(),
        path: req.uri().path(),
        is_ajax,
    };
    let outcome = state.tos.gate().evaluate(&request, &mut session)?;
    state.metrics.record_decision(outcome.path, outcome.is_allowed());

    if let Some(id) = &session_id {
        if session != before {
            state.sessions.save(id, &session)?;
        }
    }

    match outcome.decision {
        GateDecision::Allow => Ok(None),
        GateDecision::RedirectToAcceptance { location } => {
            debug!("Gate redirect for {} via {}", request.path, outcome.path);
            Ok(Some(location))
        }
    }
}

pub fn redirect(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
    add_never_cache_headers(response.headers_mut());
    response
}
