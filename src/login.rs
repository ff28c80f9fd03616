use crate::allowlist::{AllowList, DenialReason};
use crate::error::Error;
use crate::oauth::{AuthorizationRequest, ProviderClient};
use crate::principal::Principal;

/// Result of the callback half of the login flow.
///
/// Every branch must be handled by the caller. Nothing is signalled out of band.
#[derive(Debug)]
pub enum LoginOutcome {
    Success(Principal),
    Denied {
        principal: Principal,
        reason: DenialReason,
    },
    Error(Error),
}

/// Drives the authorization-code exchange and applies the [`AllowList`].
pub struct IdentityProviderAdapter {
    client: ProviderClient,
    allow_list: AllowList,
}

impl IdentityProviderAdapter {
    #[must_use]
    pub fn new(client: ProviderClient, allow_list: AllowList) -> Self {
        Self { client, allow_list }
    }

    #[must_use]
    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    #[must_use]
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Start the flow. The caller redirects to `url` and keeps `state` + `code_verifier`.
    #[must_use]
    pub fn begin_login(&self) -> AuthorizationRequest {
        self.client.authorization_url()
    }

    /// Exchange `code`, fetch the profile and admit or deny the resulting principal.
    pub async fn complete_login(&self, code: &str, code_verifier: &str) -> LoginOutcome {
        let token = match self.client.exchange_code(code, code_verifier).await {
            Ok(token) => token,
            Err(e) => return LoginOutcome::Error(e),
        };

        let principal = match self.client.fetch_principal(&token.access_token).await {
            Ok(principal) => principal,
            Err(e) => return LoginOutcome::Error(e),
        };

        match self.allow_list.check(&principal) {
            Ok(()) => LoginOutcome::Success(principal),
            Err(reason) => {
                tracing::warn!(
                    principal_id = %principal.id(),
                    reason = reason.code(),
                    "Login denied by allow-list"
                );
                LoginOutcome::Denied { principal, reason }
            }
        }
    }
}
