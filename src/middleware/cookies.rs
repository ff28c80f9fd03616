use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::{CookieJar, PrivateCookieJar};
use time::Duration;

use super::config::AuthSettings;
use crate::types::SessionId;

const PKCE_COOKIE_NAME: &str = "__fameliza_pkce";
const STATE_COOKIE_NAME: &str = "__fameliza_state";
const LOGIN_COOKIE_TTL: Duration = Duration::minutes(5);

/// What the request carried under the session cookie name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCookie {
    Missing,
    /// Present, but it failed decryption or authentication.
    Unreadable,
    Present(SessionId),
}

/// Create PKCE verifier + state cookies for the authorization request.
pub(super) fn pkce_cookies(
    code_verifier: &str,
    state: &str,
    settings: &AuthSettings,
) -> (Cookie<'static>, Cookie<'static>) {
    let build = |name: &'static str, value: &str| {
        Cookie::build((name, value.to_owned()))
            .http_only(true)
            .secure(settings.secure_cookies)
            .same_site(SameSite::Lax)
            .path(settings.auth_path.clone())
            .max_age(LOGIN_COOKIE_TTL)
            .build()
    };
    (build(PKCE_COOKIE_NAME, code_verifier), build(STATE_COOKIE_NAME, state))
}

/// Create removal cookies for PKCE verifier + state.
pub(super) fn clear_pkce_cookies(auth_path: &str) -> (Cookie<'static>, Cookie<'static>) {
    let clear = |name: &'static str| {
        Cookie::build((name, ""))
            .path(auth_path.to_owned())
            .max_age(Duration::ZERO)
            .build()
    };
    (clear(PKCE_COOKIE_NAME), clear(STATE_COOKIE_NAME))
}

pub(super) fn session_cookie(session_id: &SessionId, settings: &AuthSettings) -> Cookie<'static> {
    Cookie::build((
        settings.session_cookie_name.clone(),
        session_id.as_str().to_owned(),
    ))
    .http_only(true)
    .secure(settings.secure_cookies)
    .same_site(SameSite::Lax)
    .path("/")
    .max_age(settings.session_max_age)
    .build()
}

pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_owned(), ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

pub(super) fn pkce_verifier(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(PKCE_COOKIE_NAME).map(|c| c.value().to_owned())
}

pub(super) fn login_state(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(STATE_COOKIE_NAME).map(|c| c.value().to_owned())
}

/// Read the session cookie. `raw` is the undecrypted jar for the same request, used to
/// tell a tampered cookie from an absent one.
pub(super) fn read_session(jar: &PrivateCookieJar, raw: &CookieJar, name: &str) -> SessionCookie {
    match jar.get(name) {
        Some(cookie) if !cookie.value().is_empty() => {
            SessionCookie::Present(SessionId::from(cookie.value().to_owned()))
        }
        Some(_) => SessionCookie::Unreadable,
        None if raw.get(name).is_some() => SessionCookie::Unreadable,
        None => SessionCookie::Missing,
    }
}
