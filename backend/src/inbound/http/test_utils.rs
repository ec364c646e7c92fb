//! Test helpers for inbound HTTP components.

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;

/// Cookie name used by [`test_session_middleware`].
pub const TEST_SESSION_COOKIE: &str = "session";

/// Session middleware with a fresh key and `Secure` disabled for plain HTTP.
#[must_use]
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name(TEST_SESSION_COOKIE.to_owned())
        .cookie_secure(false)
        .build()
}

/// Extract the session cookie set by `res`.
///
/// # Panics
///
/// Panics when the response did not set a session cookie.
#[must_use]
pub fn session_cookie<B>(res: &ServiceResponse<B>) -> Cookie<'static> {
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == TEST_SESSION_COOKIE)
        .map(Cookie::into_owned)
        .unwrap_or_else(|| panic!("response should set the {TEST_SESSION_COOKIE} cookie"))
}
