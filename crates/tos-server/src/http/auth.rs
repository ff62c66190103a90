use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};

use super::JsonResponse;

/// Why an admin request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Denied {
    NotConfigured,
    MissingToken,
    WrongToken,
}

impl IntoResponse for Denied {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Denied::NotConfigured => (StatusCode::INTERNAL_SERVER_ERROR, "Admin token not configured"),
            Denied::MissingToken => (StatusCode::UNAUTHORIZED, "Admin bearer token required"),
            Denied::WrongToken => (StatusCode::UNAUTHORIZED, "Admin bearer token rejected"),
        };
        let mut response = (status, Json(JsonResponse::<()>::err(message))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"tos-admin\""),
            );
        }
        response
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn authorize(headers: &HeaderMap, token: Option<&str>) -> Result<(), Denied> {
    let expected = token.ok_or(Denied::NotConfigured)?;
    match bearer(headers) {
        None => Err(Denied::MissingToken),
        Some(presented) if presented == expected => Ok(()),
        Some(_) => Err(Denied::WrongToken),
    }
}

/// Bearer token check for `/admin`. Passes everything when auth is disabled.
pub async fn check(req: Request, next: Next, auth_enabled: bool, token: Option<String>) -> Response {
    if !auth_enabled {
        return next.run(req).await;
    }
    match authorize(req.headers(), token.as_deref()) {
        Ok(()) => next.run(req).await,
        Err(denied) => {
            tracing::debug!("Admin request to {} denied: {:?}", req.uri().path(), denied);
            denied.into_response()
        }
    }
}
