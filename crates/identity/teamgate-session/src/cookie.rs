//! Cookies and headers carrying session tokens.

use chrono::{DateTime, Utc};
use http::header::{AUTHORIZATION, COOKIE, InvalidHeaderValue};
use http::{HeaderMap, HeaderValue};

/// Cookie holding `"Bearer <token>"` after a successful login.
pub const SESSION_COOKIE_NAME: &str = "ATC-Authorization";

/// Short-lived cookie binding an OAuth callback to the begin request that started it.
pub const STATE_COOKIE_NAME: &str = "oauth_state";

const BEARER_PREFIX: &str = "Bearer ";

/// Value stored in the session cookie and returned to non-browser clients.
pub fn bearer_value(token: &str) -> String {
    format!("{BEARER_PREFIX}{token}")
}

/// Build a `Set-Cookie` header value scoped to `/` that expires at `expires_at`.
///
/// Values containing a space or comma are quoted, as `"Bearer <token>"` would
/// otherwise not be a legal cookie value.
pub fn set_cookie(
    name: &str,
    value: &str,
    expires_at: DateTime<Utc>,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let value = if value.contains([' ', ',']) {
        format!("\"{value}\"")
    } else {
        value.to_string()
    };
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);

    HeaderValue::from_str(&format!(
        "{name}={value}; Path=/; Expires={}; Max-Age={max_age}; HttpOnly; SameSite=Lax",
        http_date(expires_at)
    ))
}

pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// First cookie called `name` in the request, with surrounding quotes removed.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| unquote(value.trim()).to_string())
        })
        .next()
}

/// Session token from the `Authorization` header, falling back to the session cookie.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    from_header
        .or_else(|| read_cookie(headers, SESSION_COOKIE_NAME))
        .and_then(|value| strip_bearer(&value).map(str::to_string))
}

fn strip_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix(BEARER_PREFIX)
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
