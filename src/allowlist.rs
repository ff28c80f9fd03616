use std::collections::HashSet;

use crate::principal::Principal;
use crate::types::PrincipalId;

/// Login-time admission policy.
///
/// Each list gates only when non-empty. With both lists empty every authenticated
/// principal is admitted.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    principal_ids: HashSet<PrincipalId>,
    roles: HashSet<String>,
}

/// Why a successfully authenticated principal was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenialReason {
    #[error("principal is not on the allow-list")]
    PrincipalNotAllowed,
    #[error("principal does not hold a required role")]
    MissingRequiredRole,
}

impl DenialReason {
    /// Short machine-readable code for the failure page.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PrincipalNotAllowed => "principal_not_allowed",
            Self::MissingRequiredRole => "missing_required_role",
        }
    }
}

impl AllowList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_principal_ids<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<PrincipalId>,
    {
        self.principal_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_roles<I, T>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Parse the comma-separated form used in configuration. Blank entries are skipped.
    #[must_use]
    pub fn from_csv(principal_ids: Option<&str>, roles: Option<&str>) -> Self {
        Self::new()
            .with_principal_ids(split_csv(principal_ids).map(PrincipalId::from))
            .with_roles(split_csv(roles))
    }

    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.principal_ids.is_empty() && self.roles.is_empty()
    }

    /// Id list first, then role list. Both must pass when both are configured.
    ///
    /// # Errors
    ///
    /// Returns the [`DenialReason`] of the first list the principal fails.
    pub fn check(&self, principal: &Principal) -> Result<(), DenialReason> {
        if !self.principal_ids.is_empty() && !self.principal_ids.contains(principal.id()) {
            return Err(DenialReason::PrincipalNotAllowed);
        }
        if !self.roles.is_empty() && !principal.roles().any(|r| self.roles.contains(r)) {
            return Err(DenialReason::MissingRequiredRole);
        }
        Ok(())
    }
}

fn split_csv(value: Option<&str>) -> impl Iterator<Item = String> + '_ {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
