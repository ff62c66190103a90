//! Acceptance page and plain terms display.

use super::{add_never_cache_headers, gate::redirect, AppResult, AppState};
use axum::{
    extract::{Form, Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use std::collections::HashMap;
use tos_core::{safe_redirect, Document, SessionStore, TosError};
use tracing::info;

pub const REJECTION_MESSAGE: &str = "You cannot login without agreeing to the terms of this site.";

pub async fn show_check(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Response> {
    let config = state.tos.config();
    let next = params.get(&config.redirect_field).map(String::as_str);
    let document = state.tos.current_document()?;
    Ok(check_page(&state, document.as_ref(), next, None))
}

pub async fn submit_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let config = state.tos.config();
    let next = form.get(&config.redirect_field).map(String::as_str);

    if form.get("accept").map(String::as_str) != Some("accept") {
        state.metrics.rejections.inc();
        let document = state.tos.current_document()?;
        return Ok(check_page(&state, document.as_ref(), next, Some(REJECTION_MESSAGE)));
    }

    let (session_id, mut session) = state.load_session(&headers)?;
    let session_id = session_id
        .ok_or_else(|| TosError::Validation("No session cookie on acceptance".into()))?;
    let pending = session
        .pending()
        .ok_or_else(|| TosError::Validation("No pending acceptance in this session".into()))?;

    let agreement = state.tos.accept(pending.user_id)?;
    session.complete_pending();
    state.sessions.save(&session_id, &session)?;
    state.metrics.acceptances.inc();
    info!(
        "User {} accepted terms {} (backend {})",
        pending.user_id, agreement.document_id, pending.backend
    );

    Ok(redirect(safe_redirect(next, &config.fallback_redirect)))
}

/// Read-only display of the active terms.
pub async fn show_terms(State(state): State<AppState>) -> AppResult<Html<String>> {
    let body = match state.tos.current_document()? {
        Some(doc) => format!("<pre class=\"tos\">{}</pre>", escape_html(&doc.content)),
        None => "<p>No terms of service are active.</p>".to_string(),
    };
    Ok(Html(page("Terms of Service", &body)))
}

fn check_page(state: &AppState, document: Option<&Document>, next: Option<&str>, message: Option<&str>) -> Response {
    let config = state.tos.config();
    let mut body = String::new();

    if let Some(message) = message {
        body.push_str(&format!("<p class=\"error\">{}</p>\n", escape_html(message)));
    }
    match document {
        Some(doc) => body.push_str(&format!("<pre class=\"tos\">{}</pre>\n", escape_html(&doc.content))),
        None => body.push_str("<p>No terms of service are active.</p>\n"),
    }
    body.push_str(&format!(
        concat!(
            "<form method=\"post\" action=\"{action}\">\n",
            "  <input type=\"hidden\" name=\"{field}\" value=\"{next}\">\n",
            "  <button type=\"submit\" name=\"accept\" value=\"accept\">Accept</button>\n",
            "  <button type=\"submit\" name=\"accept\" value=\"reject\">Reject</button>\n",
            "</form>\n"
        ),
        action = escape_html(&config.acceptance_path),
        field = escape_html(&config.redirect_field),
        next = escape_html(next.unwrap_or("")),
    ));

    let mut response = Html(page("Terms of Service", &body)).into_response();
    add_never_cache_headers(response.headers_mut());
    response
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n",
        title = escape_html(title),
        body = body,
    )
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#x27;s&lt;/a&gt;"
        );
    }
}
