//! Core record and identifier types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, rejecting empty or whitespace-bearing values.
            pub fn new(value: impl Into<String>) -> Result<Self, &'static str> {
                let value = value.into();
                if value.is_empty() {
                    return Err(concat!($what, " identifier cannot be empty"));
                }
                if value.chars().any(char::is_whitespace) {
                    return Err(concat!($what, " identifier cannot contain whitespace"));
                }
                Ok(Self(value))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

record_id!(
    /// A user account identifier.
    UserId,
    "user"
);
record_id!(
    /// A relay identifier.
    RelayId,
    "relay"
);
record_id!(
    /// A role identifier (reference data).
    RoleId,
    "role"
);
record_id!(
    /// A membership edge identifier.
    EdgeId,
    "membership edge"
);
record_id!(UserSettingsId, "settings");
record_id!(CredentialId, "credential");
record_id!(SubscriptionId, "subscription");
record_id!(InvitationId, "invitation");

/// The authenticated actor making a request.
///
/// Identity arrives pre-authenticated; the only policy-relevant attribute is
/// the user it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(UserId);

impl Principal {
    pub fn new(user: UserId) -> Self {
        Self(user)
    }

    pub fn user_id(&self) -> &UserId {
        &self.0
    }

    /// Whether this principal is the given user.
    pub fn is(&self, user: &UserId) -> bool {
        &self.0 == user
    }
}

impl From<UserId> for Principal {
    fn from(user: UserId) -> Self {
        Self(user)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Role rank on a relay. Ordered `Member < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Member,
    Owner,
}

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Member => "member",
            Rank::Owner => "owner",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "member" => Ok(Rank::Member),
            "owner" => Ok(Rank::Owner),
            _ => Err("rank must be 'owner' or 'member'"),
        }
    }
}

/// Named collections the policy table covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    User,
    UserSettings,
    Credential,
    Subscription,
    Relay,
    MembershipEdge,
    Role,
    Invitation,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::User,
        Collection::UserSettings,
        Collection::Credential,
        Collection::Subscription,
        Collection::Relay,
        Collection::MembershipEdge,
        Collection::Role,
        Collection::Invitation,
    ];

    /// Storage-facing collection name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::User => "users",
            Collection::UserSettings => "user_settings",
            Collection::Credential => "credentials",
            Collection::Subscription => "subscriptions",
            Collection::Relay => "relays",
            Collection::MembershipEdge => "relay_roles",
            Collection::Role => "roles",
            Collection::Invitation => "relay_invitations",
        }
    }

    /// Sensitive child resources are visible to their owning user only.
    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            Collection::UserSettings | Collection::Credential | Collection::Subscription
        )
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or("unknown collection")
    }
}

/// Operations a request may perform on a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Operations that address one existing record.
    pub fn is_single_record(&self) -> bool {
        matches!(self, Operation::Get | Operation::Update | Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account record. Provisioned externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Per-user settings holding references to provider credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub id: UserSettingsId,
    pub user: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_apikey: Option<CredentialId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_apikey: Option<CredentialId>,
}

/// A provider API credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub owner: UserId,
    pub provider: String,
    pub secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("provider", &self.provider)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user: UserId,
    pub plan: String,
    pub active: bool,
}

/// A shared resource users join with a ranked role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    pub id: RelayId,
    pub name: String,
    pub creator: UserId,
    /// Maximum number of membership edges on this relay.
    pub user_limit: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The (relay, user, role) relation. At most one per (relay, user) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEdge {
    pub id: EdgeId,
    pub relay: RelayId,
    pub user: UserId,
    pub role: RoleId,
}

/// Role reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub rank: Rank,
}

/// A join key granting `role` on `relay` to whoever presents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub relay: RelayId,
    pub role: RoleId,
    pub key: String,
}

/// Any record the policy engine reasons about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", rename_all = "snake_case")]
pub enum Record {
    User(User),
    UserSettings(UserSettings),
    Credential(Credential),
    Subscription(Subscription),
    Relay(Relay),
    MembershipEdge(MembershipEdge),
    Role(Role),
    Invitation(Invitation),
}

impl Record {
    pub fn collection(&self) -> Collection {
        match self {
            Record::User(_) => Collection::User,
            Record::UserSettings(_) => Collection::UserSettings,
            Record::Credential(_) => Collection::Credential,
            Record::Subscription(_) => Collection::Subscription,
            Record::Relay(_) => Collection::Relay,
            Record::MembershipEdge(_) => Collection::MembershipEdge,
            Record::Role(_) => Collection::Role,
            Record::Invitation(_) => Collection::Invitation,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::User(r) => r.id.as_str(),
            Record::UserSettings(r) => r.id.as_str(),
            Record::Credential(r) => r.id.as_str(),
            Record::Subscription(r) => r.id.as_str(),
            Record::Relay(r) => r.id.as_str(),
            Record::MembershipEdge(r) => r.id.as_str(),
            Record::Role(r) => r.id.as_str(),
            Record::Invitation(r) => r.id.as_str(),
        }
    }

    /// The relay this record is scoped to, if any.
    pub fn relay_id(&self) -> Option<&RelayId> {
        match self {
            Record::Relay(r) => Some(&r.id),
            Record::MembershipEdge(e) => Some(&e.relay),
            Record::Invitation(i) => Some(&i.relay),
            _ => None,
        }
    }

    /// The user that owns this record: the account itself for users, the
    /// owning user for sensitive child resources.
    pub fn owner(&self) -> Option<&UserId> {
        match self {
            Record::User(u) => Some(&u.id),
            Record::UserSettings(s) => Some(&s.user),
            Record::Credential(c) => Some(&c.owner),
            Record::Subscription(s) => Some(&s.user),
            _ => None,
        }
    }

    /// Reads a field as a string. `None` if the collection has no such field
    /// or the field is unset. Covers every [`filterable_fields`] entry plus
    /// internal lookup keys that user filters may not name.
    pub fn field(&self, name: &str) -> Option<&str> {
        if name == "id" {
            return Some(self.id());
        }
        match (self, name) {
            (Record::User(u), "name") => Some(u.name.as_str()),
            (Record::UserSettings(s), "user") => Some(s.user.as_str()),
            (Record::Credential(c), "owner") => Some(c.owner.as_str()),
            (Record::Credential(c), "provider") => Some(c.provider.as_str()),
            (Record::Subscription(s), "user") => Some(s.user.as_str()),
            (Record::Subscription(s), "plan") => Some(s.plan.as_str()),
            (Record::Relay(r), "name") => Some(r.name.as_str()),
            (Record::Relay(r), "creator") => Some(r.creator.as_str()),
            (Record::MembershipEdge(e), "relay") => Some(e.relay.as_str()),
            (Record::MembershipEdge(e), "user") => Some(e.user.as_str()),
            (Record::MembershipEdge(e), "role") => Some(e.role.as_str()),
            (Record::Role(r), "name") => Some(r.name.as_str()),
            (Record::Invitation(i), "relay") => Some(i.relay.as_str()),
            (Record::Invitation(i), "role") => Some(i.role.as_str()),
            (Record::Invitation(i), "key") => Some(i.key.as_str()),
            _ => None,
        }
    }
}

/// Filterable field names per collection.
pub fn filterable_fields(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::User => &["id", "name"],
        Collection::UserSettings => &["id", "user"],
        Collection::Credential => &["id", "owner", "provider"],
        Collection::Subscription => &["id", "user", "plan"],
        Collection::Relay => &["id", "name", "creator"],
        Collection::MembershipEdge => &["id", "relay", "user", "role"],
        Collection::Role => &["id", "name"],
        Collection::Invitation => &["id", "relay", "role"],
    }
}
