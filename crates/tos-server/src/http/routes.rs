use super::{acceptance, admin, auth, gate, AppResult, AppState, JsonResponse};
use axum::{
    extract::State,
    http::header,
    middleware,
    response::{Html, IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tos_core::{SessionStore, TermsStore};
use tower_http::trace::TraceLayer;

/// Build the full router.
///
/// Host pages and the acceptance page sit behind the gate middleware; the
/// admin API sits behind bearer auth. `/health` and `/metrics` are open.
pub fn create_router(state: AppState, auth_enabled: bool, admin_token: Option<String>) -> Router {
    let acceptance_path = state.tos.config().acceptance_path.clone();

    let gated = Router::new()
        .route("/", get(index))
        .route("/tos/", get(acceptance::show_terms))
        .route(&acceptance_path, get(acceptance::show_check).post(acceptance::submit_check))
        .route_layer(middleware::from_fn_with_state(state.clone(), gate::check));

    let admin = Router::new()
        .route("/documents", get(admin::list_documents).post(admin::publish_document))
        .route("/users/:id", put(admin::put_user))
        .route("/sessions", post(admin::create_session))
        .route("/staff-cache/rebuild", post(admin::rebuild_staff_cache))
        .route("/version", get(admin::cache_version))
        .route_layer(middleware::from_fn(move |req, next| {
            let token = admin_token.clone();
            async move { auth::check(req, next, auth_enabled, token).await }
        }));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(gated)
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    version: String,
    uptime_seconds: u64,
    cache_version: i64,
    stats: StatsData,
}

#[derive(Serialize)]
struct StatsData {
    document_count: u64,
    agreement_count: u64,
    user_count: u64,
    staff_count: u64,
    has_active_document: bool,
}

async fn health(State(state): State<AppState>) -> AppResult<Json<JsonResponse<HealthResponse>>> {
    let stats = state.tos.store().stats()?;

    Ok(Json(JsonResponse::ok(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        cache_version: state.tos.generation().current()?,
        stats: StatsData {
            document_count: stats.document_count,
            agreement_count: stats.agreement_count,
            user_count: stats.user_count,
            staff_count: stats.staff_count,
            has_active_document: stats.has_active_document,
        },
    })))
}

async fn metrics(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = state.tos.store().stats()?;
    let version = state.tos.generation().current()?;
    let body = state
        .metrics
        .render(&stats, version, state.start_time.elapsed().as_secs());

    Ok((
        [(header::CONTENT_TYPE, "application/openmetrics-text; version=1.0.0; charset=utf-8")],
        body,
    ))
}

/// Demo host page. Shows who the gate let through.
async fn index(State(state): State<AppState>, headers: axum::http::HeaderMap) -> AppResult<Html<String>> {
    let greeting = match state.session_id(&headers) {
        Some(id) => match state.sessions.load(&id)?.and_then(|s| s.auth_user_id) {
            Some(user_id) => format!("Signed in as user {}.", user_id),
            None => "Not signed in.".to_string(),
        },
        None => "Not signed in.".to_string(),
    };

    Ok(Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Home</title></head>\n<body>\n<h1>Home</h1>\n<p>{}</p>\n<p><a href=\"/tos/\">Terms of Service</a></p>\n</body>\n</html>\n",
        greeting
    )))
}
