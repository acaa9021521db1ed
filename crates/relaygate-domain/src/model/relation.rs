//! Expandable relations between collections.

use std::fmt;

use super::{Collection, Record};

/// Whether a relation resolves to a single record or a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// A named hop from one collection to another.
///
/// Back-relations (`*_via_user`, `*_via_relay`) follow an owning foreign key
/// from the child side; the rest follow a direct reference on the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// User -> its settings record.
    UserSettings,
    /// User -> its subscriptions.
    UserSubscriptions,
    /// User -> its membership edges.
    UserMemberships,
    /// Settings -> OpenAI credential.
    OpenAiKey,
    /// Settings -> Anthropic credential.
    AnthropicKey,
    /// Settings -> owning user.
    SettingsUser,
    /// Credential -> owning user.
    CredentialOwner,
    /// Subscription -> owning user.
    SubscriptionUser,
    /// Membership edge -> relay.
    EdgeRelay,
    /// Membership edge -> user.
    EdgeUser,
    /// Membership edge -> role.
    EdgeRole,
    /// Relay -> its membership edges.
    RelayMemberships,
    /// Relay -> creator.
    RelayCreator,
    /// Invitation -> relay.
    InvitationRelay,
    /// Invitation -> role.
    InvitationRole,
}

impl Relation {
    const ALL: [Relation; 15] = [
        Relation::UserSettings,
        Relation::UserSubscriptions,
        Relation::UserMemberships,
        Relation::OpenAiKey,
        Relation::AnthropicKey,
        Relation::SettingsUser,
        Relation::CredentialOwner,
        Relation::SubscriptionUser,
        Relation::EdgeRelay,
        Relation::EdgeUser,
        Relation::EdgeRole,
        Relation::RelayMemberships,
        Relation::RelayCreator,
        Relation::InvitationRelay,
        Relation::InvitationRole,
    ];

    /// Looks up a relation by its wire name on the given source collection.
    pub fn parse(source: Collection, name: &str) -> Option<Relation> {
        Self::ALL
            .into_iter()
            .find(|r| r.source() == source && r.name() == name)
    }

    /// Wire name used in expand requests.
    pub fn name(&self) -> &'static str {
        match self {
            Relation::UserSettings => "user_settings_via_user",
            Relation::UserSubscriptions => "subscriptions_via_user",
            Relation::UserMemberships => "relay_roles_via_user",
            Relation::OpenAiKey => "openai_apikey",
            Relation::AnthropicKey => "anthropic_apikey",
            Relation::SettingsUser
            | Relation::CredentialOwner
            | Relation::SubscriptionUser
            | Relation::EdgeUser => "user",
            Relation::EdgeRelay | Relation::InvitationRelay => "relay",
            Relation::EdgeRole | Relation::InvitationRole => "role",
            Relation::RelayMemberships => "relay_roles_via_relay",
            Relation::RelayCreator => "creator",
        }
    }

    pub fn source(&self) -> Collection {
        match self {
            Relation::UserSettings | Relation::UserSubscriptions | Relation::UserMemberships => {
                Collection::User
            }
            Relation::OpenAiKey | Relation::AnthropicKey | Relation::SettingsUser => {
                Collection::UserSettings
            }
            Relation::CredentialOwner => Collection::Credential,
            Relation::SubscriptionUser => Collection::Subscription,
            Relation::EdgeRelay | Relation::EdgeUser | Relation::EdgeRole => {
                Collection::MembershipEdge
            }
            Relation::RelayMemberships | Relation::RelayCreator => Collection::Relay,
            Relation::InvitationRelay | Relation::InvitationRole => Collection::Invitation,
        }
    }

    pub fn target(&self) -> Collection {
        match self {
            Relation::UserSettings => Collection::UserSettings,
            Relation::UserSubscriptions => Collection::Subscription,
            Relation::UserMemberships | Relation::RelayMemberships => Collection::MembershipEdge,
            Relation::OpenAiKey | Relation::AnthropicKey => Collection::Credential,
            Relation::SettingsUser
            | Relation::CredentialOwner
            | Relation::SubscriptionUser
            | Relation::EdgeUser
            | Relation::RelayCreator => Collection::User,
            Relation::EdgeRelay | Relation::InvitationRelay => Collection::Relay,
            Relation::EdgeRole | Relation::InvitationRole => Collection::Role,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            Relation::UserSubscriptions
            | Relation::UserMemberships
            | Relation::RelayMemberships => Cardinality::Many,
            _ => Cardinality::One,
        }
    }

    /// Relations that lead into a sensitive child resource.
    pub fn is_sensitive(&self) -> bool {
        self.target().is_sensitive()
    }
}

/// How to find the targets of a relation from one concrete parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The parent holds the target's id.
    Id(String),
    /// Targets carry the parent's id in `field`.
    Field { field: &'static str, value: String },
}

impl Relation {
    /// Resolves the lookup for `parent`. `None` when the parent is from a
    /// different collection or the reference is unset.
    pub fn lookup(&self, parent: &Record) -> Option<Lookup> {
        let id = |value: &str| Some(Lookup::Id(value.to_string()));
        let back = |field: &'static str| {
            Some(Lookup::Field {
                field,
                value: parent.id().to_string(),
            })
        };
        match (self, parent) {
            (Relation::UserSettings, Record::User(_))
            | (Relation::UserSubscriptions, Record::User(_))
            | (Relation::UserMemberships, Record::User(_)) => back("user"),
            (Relation::RelayMemberships, Record::Relay(_)) => back("relay"),
            (Relation::OpenAiKey, Record::UserSettings(s)) => {
                s.openai_apikey.as_ref().and_then(|k| id(k.as_str()))
            }
            (Relation::AnthropicKey, Record::UserSettings(s)) => {
                s.anthropic_apikey.as_ref().and_then(|k| id(k.as_str()))
            }
            (Relation::SettingsUser, Record::UserSettings(s)) => id(s.user.as_str()),
            (Relation::CredentialOwner, Record::Credential(c)) => id(c.owner.as_str()),
            (Relation::SubscriptionUser, Record::Subscription(s)) => id(s.user.as_str()),
            (Relation::EdgeRelay, Record::MembershipEdge(e)) => id(e.relay.as_str()),
            (Relation::EdgeUser, Record::MembershipEdge(e)) => id(e.user.as_str()),
            (Relation::EdgeRole, Record::MembershipEdge(e)) => id(e.role.as_str()),
            (Relation::RelayCreator, Record::Relay(r)) => id(r.creator.as_str()),
            (Relation::InvitationRelay, Record::Invitation(i)) => id(i.relay.as_str()),
            (Relation::InvitationRole, Record::Invitation(i)) => id(i.role.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source(), self.name())
    }
}
