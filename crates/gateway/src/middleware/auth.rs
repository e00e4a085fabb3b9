//! Access control for the API and admin areas

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use classroom_common::{auth::check_api_key, errors::Result};

use crate::AppState;

fn authorization(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// `Authorization` must carry the API key secret verbatim
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    check_api_key(authorization(&request), &state.config.auth.api_key_secret)?;
    Ok(next.run(request).await)
}

/// HTTP Basic admin credentials; a failure asks the browser to prompt
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match state.admin.verify(authorization(&request)) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            let mut response = e.into_response();
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"classroom admin\""),
            );
            response
        }
    }
}
