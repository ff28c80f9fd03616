/// Low-level failures raised by the provider client, the key registry and the session store.
///
/// The HTTP-facing taxonomy lives in [`crate::middleware::AuthError`]; this type carries
/// the cause. Display strings never contain key material or hashes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("identity provider {operation} failed (status {status:?}): {detail}")]
    IdentityProvider {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[cfg(feature = "oauth")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity provider {operation} timed out")]
    Timeout { operation: &'static str },
    #[error("malformed provider profile: {0}")]
    MalformedProfile(String),
    #[error("API key registry error: {0}")]
    Registry(String),
    #[error("session store error: {0}")]
    Session(String),
}

impl Error {
    /// True for failures that originate at the identity provider (network, timeout, bad payload).
    #[must_use]
    pub fn is_identity_provider(&self) -> bool {
        match self {
            Self::IdentityProvider { .. } | Self::Timeout { .. } | Self::MalformedProfile(_) => {
                true
            }
            #[cfg(feature = "oauth")]
            Self::Http(_) => true,
            Self::Registry(_) | Self::Session(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failures_are_classified() {
        assert!(Error::Timeout { operation: "token exchange" }.is_identity_provider());
        assert!(Error::MalformedProfile("missing id".into()).is_identity_provider());
        assert!(!Error::Registry("poisoned".into()).is_identity_provider());
        assert!(!Error::Session("unreachable".into()).is_identity_provider());
    }

    #[test]
    fn provider_error_display_includes_operation() {
        let err = Error::IdentityProvider {
            operation: "profile request",
            status: Some(502),
            detail: "bad gateway".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("profile request"));
        assert!(msg.contains("502"));
    }
}
