//! Cookie-based identity resolution.
//!
//! Credential design is not this server's concern: the cookie simply
//! carries an opaque user id, issued on first visit. Everything past this
//! module only sees a resolved [`User`].

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use gather_shared::{User, UserId};
use gather_store::Database;

use crate::api::AppState;
use crate::error::ApiError;

/// Cookie carrying the caller's user id.
pub const USER_COOKIE: &str = "userID";

/// One year, in seconds.
const COOKIE_MAX_AGE: u64 = 365 * 24 * 3600;

/// The authenticated caller, inserted into request extensions by
/// [`require_user`].
#[derive(Clone)]
pub struct CurrentUser(pub User);

/// Build the `Set-Cookie` value that logs a browser in as `user_id`.
pub fn session_cookie(user_id: UserId) -> String {
    format!("{USER_COOKIE}={user_id}; Max-Age={COOKIE_MAX_AGE}; Path=/; HttpOnly; SameSite=Strict")
}

/// Extract the user id from the request's cookies, if present and
/// well-formed.
fn user_id_from_headers(headers: &HeaderMap) -> Option<UserId> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == USER_COOKIE {
            value.parse::<UserId>().ok()
        } else {
            None
        }
    })
}

/// Resolve the request's cookie to a user, or `None` if there is no
/// cookie, it is malformed, or no such user exists. Only store errors are
/// surfaced.
pub async fn check_cookie(db: &Database, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    let Some(user_id) = user_id_from_headers(headers) else {
        return Ok(None);
    };
    Ok(db.read_user(user_id).await?)
}

/// Middleware that rejects unauthenticated requests and hands the resolved
/// [`CurrentUser`] to the handler via request extensions.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = check_cookie(&state.db, request.headers())
        .await?
        .ok_or(ApiError::Unauthorized("missing cookie or unknown user"))?;
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_user_cookie() {
        let headers = headers_with_cookie("theme=dark; userID=42; lang=en");
        assert_eq!(user_id_from_headers(&headers), Some(42));
    }

    #[test]
    fn rejects_malformed_cookie() {
        assert_eq!(
            user_id_from_headers(&headers_with_cookie("userID=not-a-number")),
            None
        );
        assert_eq!(user_id_from_headers(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn unknown_user_resolves_to_none() {
        let db = Database::in_memory();
        let headers = headers_with_cookie("userID=7");
        assert!(check_cookie(&db, &headers).await.unwrap().is_none());
    }
}
