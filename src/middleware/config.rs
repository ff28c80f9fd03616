use std::time::Duration as StdDuration;

use argon2::Params;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use time::Duration;
use url::Url;

use super::error::AuthError;
use crate::allowlist::AllowList;
use crate::oauth::{ProviderClient, ProviderConfig};
use crate::policy::{AccessPolicy, PolicyBucket};
use crate::session::codec::DEFAULT_SESSION_TTL;

const MIN_SESSION_SECRET_LEN: usize = 32;

/// Cookie and routing settings shared by config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_max_age: Duration,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) login_redirect: String,
    pub(crate) logout_redirect: String,
}

impl AuthSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "fameliza_session".into(),
            session_max_age: DEFAULT_SESSION_TTL,
            secure_cookies: true,
            auth_path: "/auth".into(),
            login_redirect: "/".into(),
            logout_redirect: "/".into(),
        }
    }

    pub(crate) fn failure_path(&self) -> String {
        format!("{}/failure", self.auth_path)
    }
}

/// Gateway configuration.
///
/// The provider client is a constructor parameter. Everything else has a default and a
/// `with_*` override. [`from_env`](GatewayConfig::from_env) covers the usual deployment.
pub struct GatewayConfig {
    pub(super) client: ProviderClient,
    pub(super) allow_list: AllowList,
    pub(super) policy: Option<AccessPolicy>,
    pub(super) hash_params: Params,
    pub(super) settings: AuthSettings,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(client: ProviderClient) -> Self {
        Self {
            client,
            allow_list: AllowList::new(),
            policy: None,
            hash_params: Params::DEFAULT,
            settings: AuthSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `DISCORD_CLIENT_ID`, `DISCORD_CLIENT_SECRET`: OAuth2 client credentials
    /// - `DISCORD_CALLBACK_URL`: OAuth2 redirect URI (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `OAUTH_AUTH_URL`, `OAUTH_TOKEN_URL`, `OAUTH_PROFILE_URL`: endpoint overrides
    /// - `OAUTH_GROUPS_URL`: groups endpoint override; empty disables the lookup
    /// - `OAUTH_SCOPES`: comma-separated scopes
    /// - `OAUTH_TIMEOUT_SECS`: outbound request timeout
    /// - `SESSION_SECRET`: cookie key material, at least 32 bytes
    /// - `SESSION_MAX_AGE_SECS`: session lifetime (default 86400)
    /// - `ALLOWED_DISCORD_USER_IDS`, `ALLOWED_DISCORD_GUILD_ROLES`: comma-separated allow-lists
    /// - `DEV_AUTH`: `"1"` or `"true"` drops the `Secure` cookie flag for plain-HTTP development
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required vars are missing or a value does not parse.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) with an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AuthError::Config(format!("{name} is required")))
        };
        let url = |name: &str, value: &str| {
            value
                .parse::<Url>()
                .map_err(|e| AuthError::Config(format!("{name}: {e}")))
        };

        let client_id = required("DISCORD_CLIENT_ID")?;
        let client_secret = required("DISCORD_CLIENT_SECRET")?;
        let callback = required("DISCORD_CALLBACK_URL")?;
        let mut provider =
            ProviderConfig::new(client_id, client_secret, url("DISCORD_CALLBACK_URL", &callback)?);

        if let Some(value) = lookup("OAUTH_AUTH_URL") {
            provider = provider.with_auth_url(url("OAUTH_AUTH_URL", &value)?);
        }
        if let Some(value) = lookup("OAUTH_TOKEN_URL") {
            provider = provider.with_token_url(url("OAUTH_TOKEN_URL", &value)?);
        }
        if let Some(value) = lookup("OAUTH_PROFILE_URL") {
            provider = provider.with_profile_url(url("OAUTH_PROFILE_URL", &value)?);
        }
        if let Some(value) = lookup("OAUTH_GROUPS_URL") {
            let groups = match value.trim() {
                "" => None,
                v => Some(url("OAUTH_GROUPS_URL", v)?),
            };
            provider = provider.with_groups_url(groups);
        }
        if let Some(scopes) = lookup("OAUTH_SCOPES") {
            provider = provider.with_scopes(
                scopes
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect(),
            );
        }
        if let Some(secs) = lookup("OAUTH_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| AuthError::Config(format!("OAUTH_TIMEOUT_SECS: {e}")))?;
            provider = provider.with_timeout(StdDuration::from_secs(secs));
        }

        let dev_auth = matches!(lookup("DEV_AUTH").as_deref(), Some("1") | Some("true"));

        let mut config = Self::new(ProviderClient::new(provider))
            .with_allow_list(AllowList::from_csv(
                lookup("ALLOWED_DISCORD_USER_IDS").as_deref(),
                lookup("ALLOWED_DISCORD_GUILD_ROLES").as_deref(),
            ))
            .with_secure_cookies(!dev_auth);

        match lookup("SESSION_SECRET") {
            Some(secret) => config = config.with_session_secret(&secret)?,
            None => tracing::warn!(
                "SESSION_SECRET is not set; using an ephemeral cookie key, sessions will not survive a restart"
            ),
        }

        if let Some(secs) = lookup("SESSION_MAX_AGE_SECS") {
            let secs: i64 = secs
                .trim()
                .parse()
                .map_err(|e| AuthError::Config(format!("SESSION_MAX_AGE_SECS: {e}")))?;
            if secs <= 0 {
                return Err(AuthError::Config("SESSION_MAX_AGE_SECS must be positive".into()));
            }
            config = config.with_session_max_age(Duration::seconds(secs));
        }

        Ok(config)
    }

    /// Derive the cookie key from a shared secret, so every instance given the same
    /// secret can read each other's cookies.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the secret is shorter than 32 bytes.
    pub fn with_session_secret(self, secret: &str) -> Result<Self, AuthError> {
        if secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(AuthError::Config(format!(
                "SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes"
            )));
        }
        let material = Sha512::digest(secret.as_bytes());
        Ok(self.with_cookie_key(Key::from(material.as_slice())))
    }

    /// Use an explicit cookie encryption key.
    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    /// Restrict login to the given principal ids and roles.
    #[must_use]
    pub fn with_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    /// Replace the path policy. Defaults to [`AccessPolicy::standard`] with a public fallback.
    #[must_use]
    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Argon2 cost for newly issued API keys.
    #[must_use]
    pub fn with_api_key_hash_params(mut self, params: Params) -> Self {
        self.hash_params = params;
        self
    }

    /// Override the session cookie name (default `fameliza_session`).
    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    /// Absolute session lifetime and session cookie max-age.
    #[must_use]
    pub fn with_session_max_age(mut self, max_age: Duration) -> Self {
        self.settings.session_max_age = max_age;
        self
    }

    /// Set the `Secure` flag on every cookie (default `true`).
    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Mount the auth routes under `path` (default `/auth`). A trailing `/` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] for a path that is empty, `/`, not absolute or
    /// contains a wildcard.
    pub fn with_auth_path(mut self, path: &str) -> Result<Self, AuthError> {
        let trimmed = path.trim().trim_end_matches('/');
        if trimmed.is_empty() || !trimmed.starts_with('/') || trimmed.contains('*') {
            return Err(AuthError::Config(format!(
                "auth path must be a non-root absolute path, got {path:?}"
            )));
        }
        self.settings.auth_path = trimmed.to_owned();
        Ok(self)
    }

    /// Where a successful login lands (default `/`).
    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    /// Where logout lands (default `/`).
    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    pub(super) fn resolved_policy(&self) -> AccessPolicy {
        self.policy
            .clone()
            .unwrap_or_else(|| AccessPolicy::standard(&self.settings.auth_path, PolicyBucket::Public))
    }
}
