use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::principal::{GroupMembership, Principal};
use crate::secret;
use crate::types::PrincipalId;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// `OAuth2` identity provider configuration.
///
/// Required fields are constructor parameters. Endpoints default to Discord and can be
/// overridden with the `with_*` methods.
///
/// ```rust,ignore
/// use fameliza_auth::ProviderConfig;
///
/// let config = ProviderConfig::new(
///     "client-id",
///     "client-secret",
///     "https://my-app.com/auth/callback".parse()?,
/// )
/// .with_timeout(std::time::Duration::from_secs(5));
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub struct ProviderConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) redirect_uri: Url,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) profile_url: Url,
    pub(crate) groups_url: Option<Url>,
    pub(crate) scopes: Vec<String>,
    pub(crate) timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("auth_url", &self.auth_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("profile_url", &self.profile_url.as_str())
            .field("groups_url", &self.groups_url.as_ref().map(Url::as_str))
            .field("scopes", &self.scopes)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri,
            auth_url: "https://discord.com/oauth2/authorize"
                .parse()
                .expect("valid default URL"),
            token_url: "https://discord.com/api/oauth2/token"
                .parse()
                .expect("valid default URL"),
            profile_url: "https://discord.com/api/users/@me"
                .parse()
                .expect("valid default URL"),
            groups_url: Some(
                "https://discord.com/api/users/@me/guilds"
                    .parse()
                    .expect("valid default URL"),
            ),
            scopes: vec!["identify".into(), "email".into(), "guilds".into()],
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the provider authorize endpoint.
    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    /// Override the provider token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    /// Override the provider user profile endpoint.
    #[must_use]
    pub fn with_profile_url(mut self, url: Url) -> Self {
        self.profile_url = url;
        self
    }

    /// Endpoint listing group memberships. `None` skips the lookup.
    ///
    /// Discord's `/users/@me/guilds` returns partial guild objects without member roles,
    /// so against the stock endpoint every group has an empty role list and a role
    /// allow-list admits nobody. Role checks need an endpoint that reports roles, such
    /// as an aggregating proxy over the per-guild `/users/@me/guilds/{id}/member` lookup.
    #[must_use]
    pub fn with_groups_url(mut self, url: Option<Url>) -> Self {
        self.groups_url = url;
        self
    }

    /// Override the scopes (default: `["identify", "email", "guilds"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Per-request timeout for the token exchange and profile calls (default 10s).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// OAuth client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Callback URL registered with the provider.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Provider authorize endpoint.
    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Requested scopes.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Per-request timeout for outbound provider calls.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Authorization redirect plus the values the callback must verify.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

/// Token endpoint response. Only the access token is used.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// User profile as returned by the provider's user endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ProviderProfile {
    /// Build the [`Principal`], rejecting profiles without an id or a username.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedProfile`] when a required field is blank.
    pub fn into_principal(self, groups: Vec<GroupMembership>) -> Result<Principal, Error> {
        if self.id.trim().is_empty() {
            return Err(Error::MalformedProfile("empty id".into()));
        }
        if self.username.trim().is_empty() {
            return Err(Error::MalformedProfile("empty username".into()));
        }
        Ok(Principal::new(
            PrincipalId(self.id),
            self.username,
            self.discriminator.unwrap_or_else(|| "0".into()),
        )
        .with_avatar(self.avatar)
        .with_email(self.email)
        .with_groups(groups))
    }
}

/// `OAuth2` authorization-code client for the identity provider.
pub struct ProviderClient {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl ProviderClient {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (connection pool reuse, proxies, tests).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build the authorize URL with a fresh `state` and PKCE S256 challenge.
    #[must_use]
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let state = secret::generate_state();
        let code_verifier = secret::generate_code_verifier();
        let code_challenge = secret::code_challenge(&code_verifier);
        let scope = self.config.scopes.join(" ");

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &scope)
            .append_pair("state", &state)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256");

        AuthorizationRequest {
            url: url.into(),
            state,
            code_verifier,
        }
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] past the configured timeout, [`Error::Http`] on network or
    /// decode failure, [`Error::IdentityProvider`] on a non-2xx response.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, Error> {
        const OPERATION: &str = "token exchange";
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(self.config.token_url.clone())
            .timeout(self.config.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| classify(e, OPERATION))?;

        let response = Self::ensure_success(response, OPERATION).await?;
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| classify(e, OPERATION))
    }

    /// Fetch the user profile and, when configured, the group memberships.
    ///
    /// # Errors
    ///
    /// Same as [`exchange_code`](Self::exchange_code), plus [`Error::MalformedProfile`].
    pub async fn fetch_principal(&self, access_token: &str) -> Result<Principal, Error> {
        let profile: ProviderProfile = self
            .get_json(self.config.profile_url.clone(), access_token, "profile request")
            .await?;

        let groups: Vec<GroupMembership> = match &self.config.groups_url {
            Some(url) => {
                self.get_json(url.clone(), access_token, "groups request")
                    .await?
            }
            None => Vec::new(),
        };

        profile.into_principal(groups)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        access_token: &str,
        operation: &'static str,
    ) -> Result<T, Error> {
        let response = self
            .http
            .get(url)
            .timeout(self.config.timeout)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| classify(e, operation))?;

        let response = Self::ensure_success(response, operation).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| classify(e, operation))
    }

    /// Return the response on 2xx, otherwise an error carrying status and body.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::IdentityProvider {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

fn classify(err: reqwest::Error, operation: &'static str) -> Error {
    if err.is_timeout() {
        Error::Timeout { operation }
    } else if err.is_decode() {
        Error::MalformedProfile(format!("{operation}: {err}"))
    } else {
        Error::Http(err)
    }
}
