use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::{CookieJar, PrivateCookieJar};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::cookies::{self, SessionCookie};
use super::error::AuthError;
use super::extractor::AuthPrincipal;
use super::state::AuthState;
use crate::login::LoginOutcome;

const IDENTITY_PROVIDER_ERROR: &str = "identity_provider_error";

/// The gateway's own routes: login flow under the auth path, plus `/health`.
pub(super) fn auth_routes(state: AuthState) -> Router {
    let auth_path = state.settings.auth_path.clone();

    Router::new()
        .route(&format!("{auth_path}/login"), get(login))
        .route(&format!("{auth_path}/callback"), get(callback))
        .route(&format!("{auth_path}/logout"), get(logout).post(logout))
        .route(&format!("{auth_path}/me"), get(me))
        .route(&format!("{auth_path}/failure"), get(failure))
        .route(&format!("{auth_path}/api-key"), post(issue_api_key))
        .route("/health", get(health))
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login(State(state): State<AuthState>, jar: PrivateCookieJar) -> (PrivateCookieJar, Response) {
    let auth_req = state.identity.begin_login();

    let (pkce_cookie, state_cookie) =
        cookies::pkce_cookies(&auth_req.code_verifier, &auth_req.state, &state.settings);

    (jar.add(pkce_cookie).add(state_cookie), found(&auth_req.url))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> (PrivateCookieJar, Response) {
    let outcome = finish_login(&state, &jar, params).await;

    // The login cookies are single-use whatever the outcome.
    let (clear_pkce, clear_state) = cookies::clear_pkce_cookies(&state.settings.auth_path);
    let jar = jar.remove(clear_pkce).remove(clear_state);

    match outcome {
        Ok(session_cookie) => (
            jar.add(session_cookie),
            found(&state.settings.login_redirect),
        ),
        Err(response) => (jar, response),
    }
}

/// Verify the callback, run the code exchange and open a session. Returns the session
/// cookie, or the failure response to send.
async fn finish_login(
    state: &AuthState,
    jar: &PrivateCookieJar,
    params: CallbackParams,
) -> Result<Cookie<'static>, Response> {
    let failure_path = state.settings.failure_path();

    if let Some(error) = &params.error {
        let desc = params.error_description.as_deref().unwrap_or("Unknown error");
        tracing::warn!(error = %error, description = %desc, "OAuth2 error from identity provider");
        return Err(login_failure(&failure_path, IDENTITY_PROVIDER_ERROR));
    }

    let code = params
        .code
        .ok_or_else(|| login_failure(&failure_path, "missing_code"))?;

    let received_state = params
        .state
        .ok_or_else(|| login_failure(&failure_path, "state_mismatch"))?;

    let stored_state =
        cookies::login_state(jar).ok_or_else(|| login_failure(&failure_path, "state_mismatch"))?;

    if received_state != stored_state {
        tracing::warn!("OAuth state mismatch");
        return Err(login_failure(&failure_path, "state_mismatch"));
    }

    let code_verifier = cookies::pkce_verifier(jar)
        .ok_or_else(|| login_failure(&failure_path, "missing_verifier"))?;

    let principal = match state.identity.complete_login(&code, &code_verifier).await {
        LoginOutcome::Success(principal) => principal,
        LoginOutcome::Denied { reason, .. } => {
            return Err(login_failure(&failure_path, reason.code()));
        }
        LoginOutcome::Error(e) => {
            tracing::error!(error = %e, "Login failed at the identity provider");
            return Err(login_failure(&failure_path, IDENTITY_PROVIDER_ERROR));
        }
    };

    let session_id = state
        .guard
        .sessions()
        .establish(&principal)
        .await
        .map_err(|e| AuthError::session(e).into_response())?;

    tracing::info!(principal_id = %principal.id(), "OAuth2 login successful");

    Ok(cookies::session_cookie(&session_id, &state.settings))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    raw: CookieJar,
) -> Result<(PrivateCookieJar, Response), Response> {
    let name = &state.settings.session_cookie_name;

    if let SessionCookie::Present(session_id) = cookies::read_session(&jar, &raw, name) {
        if let Err(e) = state.guard.sessions().logout(&session_id).await {
            tracing::error!(error = %e, "Session deletion failed during logout");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Logout failed" })),
            )
                .into_response());
        }
    }

    let clear_cookie = cookies::clear_session_cookie(name);
    Ok((jar.remove(clear_cookie), found(&state.settings.logout_redirect)))
}

// ── Session info ───────────────────────────────────────────────────

async fn me(AuthPrincipal(principal): AuthPrincipal) -> Json<serde_json::Value> {
    Json(json!({ "user": principal, "authenticated": true }))
}

#[derive(Deserialize)]
struct FailureParams {
    error: Option<String>,
}

async fn failure(Query(params): Query<FailureParams>) -> Response {
    let reason = params.error.as_deref().unwrap_or(IDENTITY_PROVIDER_ERROR);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Authentication failed", "reason": reason })),
    )
        .into_response()
}

// ── API keys ───────────────────────────────────────────────────────

async fn issue_api_key(
    State(state): State<AuthState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<serde_json::Value>, AuthError> {
    let key = state
        .guard
        .api_keys()
        .issue(Some(principal.id().clone()))
        .await
        .map_err(AuthError::registry)?;

    tracing::info!(principal_id = %principal.id(), key_id = %key.id(), "API key issued from session");
    Ok(Json(json!({ "apiKey": key.into_string() })))
}

// ── Health ─────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({ "status": "ok", "timestamp": timestamp }))
}

// ── Helpers ────────────────────────────────────────────────────────

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

fn login_failure(failure_path: &str, code: &str) -> Response {
    let encoded = urlencoding::encode(code);
    found(&format!("{failure_path}?error={encoded}"))
}
