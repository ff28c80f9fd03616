use serde::{Deserialize, Serialize};

use crate::types::PrincipalId;

/// Authenticated identity built from the provider's profile response.
///
/// Immutable once constructed: fields are private and only readable through accessors.
/// Serialized into the session store by [`crate::session::codec`] and returned by `/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    id: PrincipalId,
    display_name: String,
    discriminator: String,
    avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default)]
    groups: Vec<GroupMembership>,
}

/// Membership in one provider group (a Discord guild) with the role ids held there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl GroupMembership {
    #[must_use]
    pub fn new(id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            id: id.into(),
            roles,
        }
    }
}

impl Principal {
    /// Create a principal with the required identity fields. Optional fields via `with_*`.
    #[must_use]
    pub fn new(
        id: PrincipalId,
        display_name: impl Into<String>,
        discriminator: impl Into<String>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            discriminator: discriminator.into(),
            avatar: None,
            email: None,
            groups: Vec::new(),
        }
    }

    /// Avatar hash as reported by the provider.
    #[must_use]
    pub fn with_avatar(mut self, avatar: Option<String>) -> Self {
        self.avatar = avatar;
        self
    }

    /// Email address, when the `email` scope was granted.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// Group memberships, kept in the order the provider returned them.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<GroupMembership>) -> Self {
        self.groups = groups;
        self
    }

    /// Provider account id.
    #[must_use]
    pub fn id(&self) -> &PrincipalId {
        &self.id
    }

    /// Provider username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    #[must_use]
    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Group memberships with their role ids.
    #[must_use]
    pub fn groups(&self) -> &[GroupMembership] {
        &self.groups
    }

    /// Every role id held in any group, in group order.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.roles.iter().map(String::as_str))
    }
}
