use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::{CookieJar, PrivateCookieJar};

use super::cookies::{self, SessionCookie};
use super::error::AuthError;
use super::state::AuthState;
use crate::principal::Principal;
use crate::session::SessionLookup;

/// Principal of the active browser session, resolved from the encrypted session cookie.
///
/// Bearer keys are not accepted here. Rejects with `401` when there is no session or it
/// has expired.
#[derive(Debug, Clone)]
pub(super) struct AuthPrincipal(pub(super) Principal);

impl FromRequestParts<AuthState> for AuthPrincipal {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.settings.cookie_key.clone());
        let raw = CookieJar::from_headers(&parts.headers);

        let session_id =
            match cookies::read_session(&jar, &raw, &state.settings.session_cookie_name) {
                SessionCookie::Missing => return Err(AuthError::AuthenticationRequired),
                SessionCookie::Unreadable => return Err(AuthError::InvalidCredential),
                SessionCookie::Present(id) => id,
            };

        match state
            .guard
            .sessions()
            .resolve(&session_id)
            .await
            .map_err(AuthError::session)?
        {
            SessionLookup::Active(principal) => Ok(Self(principal)),
            SessionLookup::Expired | SessionLookup::Absent => Err(AuthError::InvalidCredential),
        }
    }
}
