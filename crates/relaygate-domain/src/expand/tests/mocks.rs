//! Mock snapshot for resolver testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DomainResult;
use crate::membership::MembershipGraph;
use crate::model::{
    Collection, Credential, CredentialId, EdgeId, Lookup, MembershipEdge, Rank, Record, Relation,
    Relay, RelayId, Role, RoleId, User, UserId, UserSettings, UserSettingsId,
};
use crate::policy::Predicate;
use crate::source::Snapshot;

/// In-memory snapshot that records every hop it serves.
pub struct MockSnapshot {
    records: RwLock<Vec<Record>>,
    hops: RwLock<Vec<(Relation, String)>>,
}

impl MockSnapshot {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(vec![
                Record::Role(Role {
                    id: RoleId::new("owner").unwrap(),
                    name: "Owner".to_string(),
                    rank: Rank::Owner,
                }),
                Record::Role(Role {
                    id: RoleId::new("member").unwrap(),
                    name: "Member".to_string(),
                    rank: Rank::Member,
                }),
            ]),
            hops: RwLock::new(Vec::new()),
        }
    }

    pub async fn insert(&self, record: Record) {
        self.records.write().await.push(record);
    }

    /// Adds a user with a settings record pointing at an OpenAI credential.
    pub async fn add_user_with_key(&self, user: &str) {
        let user_id = UserId::new(user).unwrap();
        self.insert(Record::User(User {
            id: user_id.clone(),
            name: user.to_string(),
            picture: None,
        }))
        .await;
        self.insert(Record::Credential(Credential {
            id: CredentialId::new(format!("key-{user}")).unwrap(),
            owner: user_id.clone(),
            provider: "openai".to_string(),
            secret: format!("sk-{user}"),
        }))
        .await;
        self.insert(Record::UserSettings(UserSettings {
            id: UserSettingsId::new(format!("settings-{user}")).unwrap(),
            user: user_id,
            openai_apikey: Some(CredentialId::new(format!("key-{user}")).unwrap()),
            anthropic_apikey: None,
        }))
        .await;
    }

    pub async fn add_relay(&self, relay: &str, creator: &str) {
        self.insert(Record::Relay(Relay {
            id: RelayId::new(relay).unwrap(),
            name: relay.to_string(),
            creator: UserId::new(creator).unwrap(),
            user_limit: 10,
            created_at: chrono::Utc::now(),
        }))
        .await;
    }

    pub async fn add_edge(&self, id: &str, relay: &str, user: &str, role: &str) {
        self.insert(Record::MembershipEdge(MembershipEdge {
            id: EdgeId::new(id).unwrap(),
            relay: RelayId::new(relay).unwrap(),
            user: UserId::new(user).unwrap(),
            role: RoleId::new(role).unwrap(),
        }))
        .await;
    }

    pub async fn get(&self, collection: Collection, id: &str) -> Record {
        self.fetch(collection, id).await.unwrap().unwrap()
    }

    /// Every (relation, parent id) hop served so far.
    pub async fn hops(&self) -> Vec<(Relation, String)> {
        self.hops.read().await.clone()
    }
}

#[async_trait]
impl Snapshot for MockSnapshot {
    fn version(&self) -> u64 {
        1
    }

    async fn roles(&self) -> DomainResult<Vec<Role>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter_map(|r| match r {
                Record::Role(role) => Some(role.clone()),
                _ => None,
            })
            .collect())
    }

    async fn membership_neighbourhood(&self, user: &UserId) -> DomainResult<Vec<MembershipEdge>> {
        let records = self.records.read().await;
        let edges: Vec<&MembershipEdge> = records
            .iter()
            .filter_map(|r| match r {
                Record::MembershipEdge(edge) => Some(edge),
                _ => None,
            })
            .collect();
        let relays: Vec<&RelayId> = edges
            .iter()
            .filter(|e| &e.user == user)
            .map(|e| &e.relay)
            .collect();
        Ok(edges
            .iter()
            .filter(|e| relays.contains(&&e.relay))
            .map(|e| (*e).clone())
            .collect())
    }

    async fn fetch(&self, collection: Collection, id: &str) -> DomainResult<Option<Record>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.collection() == collection && r.id() == id)
            .cloned())
    }

    async fn fetch_related(
        &self,
        parent: &Record,
        relation: Relation,
    ) -> DomainResult<Vec<Record>> {
        self.hops
            .write()
            .await
            .push((relation, parent.id().to_string()));
        let target = relation.target();
        let records = self.records.read().await;
        let related = match relation.lookup(parent) {
            Some(Lookup::Id(id)) => records
                .iter()
                .filter(|r| r.collection() == target && r.id() == id)
                .cloned()
                .collect(),
            Some(Lookup::Field { field, value }) => records
                .iter()
                .filter(|r| r.collection() == target && r.field(field) == Some(value.as_str()))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(related)
    }

    async fn query(
        &self,
        collection: Collection,
        predicate: &Predicate,
        graph: &MembershipGraph,
    ) -> DomainResult<Vec<Record>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.collection() == collection && predicate.matches(r, graph))
            .cloned()
            .collect())
    }
}
