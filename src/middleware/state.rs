use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AuthSettings;
use super::guard::AuthorizationGuard;
use crate::login::IdentityProviderAdapter;
use crate::policy::AccessPolicy;

/// Shared state for the auth routes and the access middleware.
#[derive(Clone)]
pub(super) struct AuthState {
    pub(super) identity: Arc<IdentityProviderAdapter>,
    pub(super) guard: AuthorizationGuard,
    pub(super) policy: Arc<AccessPolicy>,
    pub(super) settings: AuthSettings,
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.settings.cookie_key.clone()
    }
}
