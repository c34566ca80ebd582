use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::resolve_session;
use crate::error::ItsmError;
use crate::state::{AppState, blocking};

pub const SESSION_COOKIE: &str = "itsm_session";

/// Session token from the cookie, falling back to `Authorization: Bearer`.
pub fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Resolve the caller's session and hand it to handlers as an extension.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ItsmError> {
    let token = extract_token(&jar, req.headers()).ok_or(ItsmError::Unauthorized)?;

    let session = blocking(&state, move |st| resolve_session(st, &token)).await?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
