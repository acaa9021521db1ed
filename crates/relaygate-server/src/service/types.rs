//! Types for the policy service.

use relaygate_domain::model::{Invitation, MembershipEdge, Relay};

use crate::config::ServerConfig;

/// Settings the service reads on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Longest relation path an expand request may name.
    pub max_expand_depth: u32,
    /// `user_limit` stored on newly created relays.
    pub default_user_limit: u32,
    /// Relays one user may hold owner rank on.
    pub max_owned_relays: u32,
    /// Commit attempts before a write gives up with a conflict.
    pub max_write_attempts: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ServiceConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_expand_depth: config.policy.max_expand_depth,
            default_user_limit: config.relays.default_user_limit,
            max_owned_relays: config.relays.max_owned_relays,
            max_write_attempts: config.storage.max_write_attempts,
        }
    }
}

impl ServiceConfig {
    pub fn with_max_expand_depth(mut self, depth: u32) -> Self {
        self.max_expand_depth = depth;
        self
    }

    pub fn with_default_user_limit(mut self, limit: u32) -> Self {
        self.default_user_limit = limit;
        self
    }

    pub fn with_max_owned_relays(mut self, limit: u32) -> Self {
        self.max_owned_relays = limit;
        self
    }

    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts;
        self
    }
}

/// Everything one relay creation commits.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedRelay {
    pub relay: Relay,
    /// The creator's owner edge.
    pub membership: MembershipEdge,
    /// Member-rank join key for the new relay.
    pub invitation: Invitation,
}

/// Profile fields a user may change on their own record. `None` leaves the
/// field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl UserUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }
}
