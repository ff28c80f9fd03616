use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::{CookieJar, PrivateCookieJar};

use super::cookies::{self, SessionCookie};
use super::error::AuthError;
use super::state::AuthState;
use crate::api_key::ApiKeyRegistry;
use crate::policy::PolicyBucket;
use crate::principal::Principal;
use crate::session::{SessionCodec, SessionLookup};

/// How a request on a protected path authenticated.
///
/// Inserted into request extensions by the access middleware, and usable as an extractor
/// in handlers behind it.
#[derive(Debug, Clone)]
pub enum Credential {
    Session(Principal),
    /// A valid bearer key. Which key matched is deliberately not exposed.
    ApiKey,
}

impl Credential {
    /// The session principal, if the request authenticated with a session.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Session(principal) => Some(principal),
            Self::ApiKey => None,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Credential {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Credential>()
            .cloned()
            .ok_or(AuthError::AuthenticationRequired)
    }
}

/// Decides whether a request may proceed, given its path bucket and presented credentials.
///
/// Deny by default: only an active session or a validated key yields a [`Credential`].
#[derive(Clone)]
pub struct AuthorizationGuard {
    sessions: SessionCodec,
    api_keys: ApiKeyRegistry,
}

impl AuthorizationGuard {
    #[must_use]
    pub fn new(sessions: SessionCodec, api_keys: ApiKeyRegistry) -> Self {
        Self { sessions, api_keys }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionCodec {
        &self.sessions
    }

    #[must_use]
    pub fn api_keys(&self) -> &ApiKeyRegistry {
        &self.api_keys
    }

    /// `Ok(None)` for public paths, `Ok(Some(_))` once a credential checked out.
    ///
    /// A session is tried before the bearer key. On [`PolicyBucket::ApiKeyOnly`] the
    /// session is not consulted at all.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AuthenticationRequired`] when nothing usable was presented
    /// - [`AuthError::InvalidCredential`] for a rejected key or a stale session cookie
    /// - [`AuthError::Session`] / [`AuthError::Registry`] when a store fails
    pub async fn authorize(
        &self,
        bucket: PolicyBucket,
        session: &SessionCookie,
        bearer: Option<&str>,
    ) -> Result<Option<Credential>, AuthError> {
        match bucket {
            PolicyBucket::Public => Ok(None),
            PolicyBucket::ApiKeyOnly => self.check_bearer(bearer, false).await.map(Some),
            PolicyBucket::SessionOrApiKey => {
                let stale_session = match session {
                    SessionCookie::Missing => false,
                    SessionCookie::Unreadable => true,
                    SessionCookie::Present(id) => {
                        match self.sessions.resolve(id).await.map_err(AuthError::session)? {
                            SessionLookup::Active(principal) => {
                                return Ok(Some(Credential::Session(principal)));
                            }
                            SessionLookup::Expired | SessionLookup::Absent => true,
                        }
                    }
                };
                self.check_bearer(bearer, stale_session).await.map(Some)
            }
        }
    }

    async fn check_bearer(
        &self,
        bearer: Option<&str>,
        stale_session: bool,
    ) -> Result<Credential, AuthError> {
        match bearer {
            Some(key) => {
                if self.api_keys.validate(key).await.map_err(AuthError::registry)? {
                    Ok(Credential::ApiKey)
                } else {
                    tracing::warn!("Rejected bearer API key");
                    Err(AuthError::InvalidCredential)
                }
            }
            None if stale_session => Err(AuthError::InvalidCredential),
            None => Err(AuthError::AuthenticationRequired),
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header. The scheme is case-insensitive.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Access middleware: classify the path, authorize, then forward or reject.
pub(super) async fn enforce_access(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let bucket = state.policy.classify(req.uri().path());
    if bucket == PolicyBucket::Public {
        return next.run(req).await;
    }

    let raw = CookieJar::from_headers(req.headers());
    let session = cookies::read_session(&jar, &raw, &state.settings.session_cookie_name);
    let bearer = bearer_token(req.headers());

    match state.guard.authorize(bucket, &session, bearer).await {
        Ok(credential) => {
            if let Some(credential) = credential {
                req.extensions_mut().insert(credential);
            }
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(path = %req.uri().path(), %bucket, error = %e, "Request rejected");
            e.into_response()
        }
    }
}
