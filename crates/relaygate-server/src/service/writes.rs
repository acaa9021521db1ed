//! Write workflows.
//!
//! Every workflow follows the same loop: open a snapshot, authorize and
//! check limits against it, build one [`WriteBatch`], then commit expecting
//! the snapshot's version. A lost race re-runs the whole attempt, so limit
//! checks are never evaluated against stale state.

use chrono::Utc;
use relaygate_domain::model::{
    Collection, CredentialId, EdgeId, Invitation, InvitationId, MembershipEdge, Operation,
    Principal, Rank, Record, Relay, RelayId, Role, RoleId, SubscriptionId, User, UserId,
    UserSettingsId,
};
use relaygate_domain::{MembershipGraph, Predicate, Snapshot};
use relaygate_storage::{RecordStore, WriteBatch};
use tracing::{debug, info, instrument};

use crate::error::{ServiceError, ServiceResult};

use super::handler::{role_with_rank, PolicyService};
use super::keys::{invitation_key, record_id};
use super::types::{CreatedRelay, UserUpdate};

impl<S> PolicyService<S>
where
    S: RecordStore,
{
    /// Creates a relay owned by `principal`, together with the creator's
    /// owner edge and a member invitation, in one commit.
    #[instrument(skip_all, fields(principal = %principal))]
    pub async fn create_relay(
        &self,
        principal: &Principal,
        name: &str,
    ) -> ServiceResult<CreatedRelay> {
        let name = non_empty("name", name)?;

        for attempt in 1..=self.config.max_write_attempts {
            let (snapshot, graph) = self.view(principal).await?;
            let roles = snapshot.roles().await?;
            self.check_owned_limit(&snapshot, &roles, principal.user_id())
                .await?;

            let relay = Relay {
                id: new_id(RelayId::new)?,
                name: name.clone(),
                creator: principal.user_id().clone(),
                user_limit: self.config.default_user_limit,
                created_at: Utc::now(),
            };
            self.authorize_create(&graph, principal, &Record::Relay(relay.clone()))?;

            let membership = MembershipEdge {
                id: new_id(EdgeId::new)?,
                relay: relay.id.clone(),
                user: principal.user_id().clone(),
                role: role_with_rank(&roles, Rank::Owner)?.id.clone(),
            };
            let invitation = Invitation {
                id: new_id(InvitationId::new)?,
                relay: relay.id.clone(),
                role: role_with_rank(&roles, Rank::Member)?.id.clone(),
                key: invitation_key(),
            };

            let batch = WriteBatch::new()
                .put(Record::Relay(relay.clone()))
                .put(Record::MembershipEdge(membership.clone()))
                .put(Record::Invitation(invitation.clone()));
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                info!(relay = %relay.id, "relay created");
                return Ok(CreatedRelay {
                    relay,
                    membership,
                    invitation,
                });
            }
        }
        Err(self.retries_exhausted())
    }

    /// Renames a relay. Owner rank required.
    #[instrument(skip_all, fields(principal = %principal, relay = %relay_id))]
    pub async fn update_relay(
        &self,
        principal: &Principal,
        relay_id: &RelayId,
        name: &str,
    ) -> ServiceResult<Relay> {
        let name = non_empty("name", name)?;

        for attempt in 1..=self.config.max_write_attempts {
            let (snapshot, graph) = self.view(principal).await?;
            let record = self
                .authorize_existing(
                    &snapshot,
                    &graph,
                    principal,
                    Operation::Update,
                    Collection::Relay,
                    relay_id.as_str(),
                )
                .await?;
            let Record::Relay(mut relay) = record else {
                return Err(wrong_collection(Collection::Relay));
            };
            relay.name = name.clone();

            let batch = WriteBatch::new().put(Record::Relay(relay.clone()));
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                return Ok(relay);
            }
        }
        Err(self.retries_exhausted())
    }

    /// Adds `user` to a relay with `role`. Owner rank on the relay required.
    ///
    /// A relay the principal is not on is reported as missing; a member
    /// without owner rank gets `insufficient-rank`.
    #[instrument(skip_all, fields(principal = %principal, relay = %relay_id, user = %user))]
    pub async fn create_membership(
        &self,
        principal: &Principal,
        relay_id: &RelayId,
        user: &UserId,
        role: &RoleId,
    ) -> ServiceResult<MembershipEdge> {
        for attempt in 1..=self.config.max_write_attempts {
            let (snapshot, graph) = self.view(principal).await?;
            let relay = self
                .visible_relay(&snapshot, &graph, principal, relay_id)
                .await?;

            let edge = MembershipEdge {
                id: new_id(EdgeId::new)?,
                relay: relay.id.clone(),
                user: user.clone(),
                role: role.clone(),
            };
            self.authorize_create(&graph, principal, &Record::MembershipEdge(edge.clone()))?;

            if graph.rank_of(user, &relay.id).is_some() {
                return Err(ServiceError::Conflict {
                    message: format!("user {user} is already on relay {}", relay.id),
                });
            }
            check_user_limit(&relay, graph.member_count(&relay.id))?;
            let roles = snapshot.roles().await?;
            if rank_of_role(&roles, role)? == Rank::Owner {
                self.check_owned_limit(&snapshot, &roles, user).await?;
            }

            let batch = WriteBatch::new().put(Record::MembershipEdge(edge.clone()));
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                info!(edge = %edge.id, "membership created");
                return Ok(edge);
            }
        }
        Err(self.retries_exhausted())
    }

    /// Changes the role on an existing edge. Owner rank on its relay
    /// required. The relay's last owner cannot be demoted.
    #[instrument(skip_all, fields(principal = %principal, edge = %edge_id))]
    pub async fn update_membership(
        &self,
        principal: &Principal,
        edge_id: &EdgeId,
        role: &RoleId,
    ) -> ServiceResult<MembershipEdge> {
        for attempt in 1..=self.config.max_write_attempts {
            let (snapshot, graph) = self.view(principal).await?;
            let record = self
                .authorize_existing(
                    &snapshot,
                    &graph,
                    principal,
                    Operation::Update,
                    Collection::MembershipEdge,
                    edge_id.as_str(),
                )
                .await?;
            let Record::MembershipEdge(mut edge) = record else {
                return Err(wrong_collection(Collection::MembershipEdge));
            };
            if &edge.role == role {
                return Ok(edge);
            }

            let roles = snapshot.roles().await?;
            if rank_of_role(&roles, role)? == Rank::Owner {
                self.check_owned_limit(&snapshot, &roles, &edge.user).await?;
            } else {
                check_not_last_owner(&graph, &edge)?;
            }
            edge.role = role.clone();

            let batch = WriteBatch::new().put(Record::MembershipEdge(edge.clone()));
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                return Ok(edge);
            }
        }
        Err(self.retries_exhausted())
    }

    /// Updates the principal's own profile.
    #[instrument(skip_all, fields(principal = %principal, user = %user_id))]
    pub async fn update_user(
        &self,
        principal: &Principal,
        user_id: &UserId,
        update: UserUpdate,
    ) -> ServiceResult<User> {
        if let Some(name) = &update.name {
            non_empty("name", name)?;
        }

        for attempt in 1..=self.config.max_write_attempts {
            let (snapshot, graph) = self.view(principal).await?;
            let record = self
                .authorize_existing(
                    &snapshot,
                    &graph,
                    principal,
                    Operation::Update,
                    Collection::User,
                    user_id.as_str(),
                )
                .await?;
            let Record::User(mut user) = record else {
                return Err(wrong_collection(Collection::User));
            };
            if let Some(name) = &update.name {
                user.name = name.clone();
            }
            if let Some(picture) = &update.picture {
                user.picture = Some(picture.clone());
            }

            let batch = WriteBatch::new().put(Record::User(user.clone()));
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                return Ok(user);
            }
        }
        Err(self.retries_exhausted())
    }

    /// Creates a plain record: settings, credentials and subscriptions of
    /// the principal. Relays, edges and invitations have their own
    /// workflows; users and roles are read-only and refused by policy.
    ///
    /// The store assigns the id; whatever id the caller sent is replaced.
    /// A user holds at most one settings record, and settings may only
    /// point at the user's own credentials.
    #[instrument(skip_all, fields(principal = %principal, collection = %record.collection()))]
    pub async fn create(&self, principal: &Principal, record: Record) -> ServiceResult<Record> {
        let collection = record.collection();
        if matches!(
            collection,
            Collection::Relay | Collection::MembershipEdge | Collection::Invitation
        ) {
            return Err(ServiceError::BadRequest {
                message: format!("{collection} records are created through their own workflow"),
            });
        }
        let record = with_fresh_id(record)?;

        for attempt in 1..=self.config.max_write_attempts {
            let (snapshot, graph) = self.view(principal).await?;
            self.authorize_create(&graph, principal, &record)?;
            check_own_credentials(&snapshot, principal, &record).await?;

            let batch = WriteBatch::new().put(record.clone());
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                return Ok(record);
            }
        }
        Err(self.retries_exhausted())
    }

    /// Replaces one of the principal's sensitive records: settings,
    /// credentials or subscriptions. Ownership cannot be handed to another
    /// user.
    #[instrument(skip_all, fields(principal = %principal, collection = %record.collection(), id = record.id()))]
    pub async fn replace(&self, principal: &Principal, record: Record) -> ServiceResult<Record> {
        let collection = record.collection();
        if !collection.is_sensitive() {
            return Err(ServiceError::BadRequest {
                message: format!("{collection} records are updated through their own workflow"),
            });
        }

        for attempt in 1..=self.config.max_write_attempts {
            let (snapshot, graph) = self.view(principal).await?;
            self.authorize_existing(
                &snapshot,
                &graph,
                principal,
                Operation::Update,
                collection,
                record.id(),
            )
            .await?;
            if record.owner() != Some(principal.user_id()) {
                return Err(ServiceError::BadRequest {
                    message: format!("{collection} records cannot change owner"),
                });
            }
            check_own_credentials(&snapshot, principal, &record).await?;

            let batch = WriteBatch::new().put(record.clone());
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                return Ok(record);
            }
        }
        Err(self.retries_exhausted())
    }

    /// Deletes a record and whatever the store cascades from it.
    ///
    /// Deleting one's own membership edge leaves the relay. The last owner
    /// cannot leave; deleting the relay removes every edge instead.
    #[instrument(skip_all, fields(principal = %principal, %collection, id = %id))]
    pub async fn delete(
        &self,
        principal: &Principal,
        collection: Collection,
        id: &str,
    ) -> ServiceResult<()> {
        for attempt in 1..=self.config.max_write_attempts {
            let (snapshot, graph) = self.view(principal).await?;
            let record = self
                .authorize_existing(
                    &snapshot,
                    &graph,
                    principal,
                    Operation::Delete,
                    collection,
                    id,
                )
                .await?;
            if let Record::MembershipEdge(edge) = &record {
                check_not_last_owner(&graph, edge)?;
            }

            let batch = WriteBatch::new().delete(collection, id);
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                info!("record deleted");
                return Ok(());
            }
        }
        Err(self.retries_exhausted())
    }

    /// Creates another join key for a relay. Owner rank required.
    #[instrument(skip_all, fields(principal = %principal, relay = %relay_id))]
    pub async fn create_invitation(
        &self,
        principal: &Principal,
        relay_id: &RelayId,
        role: &RoleId,
    ) -> ServiceResult<Invitation> {
        for attempt in 1..=self.config.max_write_attempts {
            let (snapshot, graph) = self.view(principal).await?;
            let relay = self
                .visible_relay(&snapshot, &graph, principal, relay_id)
                .await?;

            let invitation = Invitation {
                id: new_id(InvitationId::new)?,
                relay: relay.id,
                role: role.clone(),
                key: invitation_key(),
            };
            self.authorize_create(&graph, principal, &Record::Invitation(invitation.clone()))?;

            let batch = WriteBatch::new().put(Record::Invitation(invitation.clone()));
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                return Ok(invitation);
            }
        }
        Err(self.retries_exhausted())
    }

    /// Joins the relay an invitation key points at.
    ///
    /// Presenting the key is the authorization, so any principal may call
    /// this. Joining a relay one is already on returns the relay unchanged.
    #[instrument(skip_all, fields(principal = %principal))]
    pub async fn accept_invitation(&self, principal: &Principal, key: &str) -> ServiceResult<Relay> {
        for attempt in 1..=self.config.max_write_attempts {
            let (snapshot, graph) = self.view(principal).await?;
            let invitation = find_invitation(&snapshot, &graph, key).await?;
            let relay = match snapshot
                .fetch(Collection::Relay, invitation.relay.as_str())
                .await?
            {
                Some(Record::Relay(relay)) => relay,
                _ => return Err(ServiceError::not_found(Collection::Invitation, key)),
            };

            if graph.rank_of(principal.user_id(), &relay.id).is_some() {
                debug!(relay = %relay.id, "already a member");
                return Ok(relay);
            }

            let on_relay = snapshot
                .query(
                    Collection::MembershipEdge,
                    &Predicate::field_eq("relay", relay.id.as_str()),
                    &graph,
                )
                .await?;
            check_user_limit(&relay, on_relay.len())?;
            let roles = snapshot.roles().await?;
            if rank_of_role(&roles, &invitation.role)? == Rank::Owner {
                self.check_owned_limit(&snapshot, &roles, principal.user_id())
                    .await?;
            }

            let edge = MembershipEdge {
                id: new_id(EdgeId::new)?,
                relay: relay.id.clone(),
                user: principal.user_id().clone(),
                role: invitation.role,
            };
            let batch = WriteBatch::new().put(Record::MembershipEdge(edge));
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                info!(relay = %relay.id, "invitation accepted");
                return Ok(relay);
            }
        }
        Err(self.retries_exhausted())
    }

    /// Seeds the owner and member roles if the store has none of that rank.
    pub async fn install_default_roles(&self) -> ServiceResult<()> {
        for attempt in 1..=self.config.max_write_attempts {
            let snapshot = self.store.snapshot().await?;
            let roles = snapshot.roles().await?;

            let mut batch = WriteBatch::new();
            for (id, rank) in [("owner", Rank::Owner), ("member", Rank::Member)] {
                if roles.iter().any(|role| role.rank == rank) {
                    continue;
                }
                let id = RoleId::new(id).map_err(invalid_id)?;
                batch = batch.put(Record::Role(Role {
                    id,
                    name: rank.as_str().to_string(),
                    rank,
                }));
            }
            if batch.is_empty() {
                return Ok(());
            }
            if self
                .try_commit(snapshot.version(), batch, attempt)
                .await?
                .is_some()
            {
                return Ok(());
            }
        }
        Err(self.retries_exhausted())
    }
}

/// Finds an invitation by key, outside any policy scope.
async fn find_invitation<T>(
    snapshot: &T,
    graph: &MembershipGraph,
    key: &str,
) -> ServiceResult<Invitation>
where
    T: Snapshot + ?Sized,
{
    let found = snapshot
        .query(
            Collection::Invitation,
            &Predicate::field_eq("key", key),
            graph,
        )
        .await?;
    match found.into_iter().next() {
        Some(Record::Invitation(invitation)) => Ok(invitation),
        _ => Err(ServiceError::not_found(Collection::Invitation, key)),
    }
}

/// Fails unless every credential a settings record points at exists and
/// belongs to `principal`. A foreign credential is reported exactly like a
/// missing one.
async fn check_own_credentials<T>(
    snapshot: &T,
    principal: &Principal,
    record: &Record,
) -> ServiceResult<()>
where
    T: Snapshot + ?Sized,
{
    let Record::UserSettings(settings) = record else {
        return Ok(());
    };
    for key in [&settings.openai_apikey, &settings.anthropic_apikey]
        .into_iter()
        .flatten()
    {
        let owned = snapshot
            .fetch(Collection::Credential, key.as_str())
            .await?
            .is_some_and(|credential| credential.owner() == Some(principal.user_id()));
        if !owned {
            debug!(credential = %key, "settings point at an unreadable credential");
            return Err(ServiceError::not_found(Collection::Credential, key.as_str()));
        }
    }
    Ok(())
}

/// Replaces the id of a sensitive record with a server-generated one.
fn with_fresh_id(record: Record) -> ServiceResult<Record> {
    Ok(match record {
        Record::UserSettings(mut settings) => {
            settings.id = new_id(UserSettingsId::new)?;
            Record::UserSettings(settings)
        }
        Record::Credential(mut credential) => {
            credential.id = new_id(CredentialId::new)?;
            Record::Credential(credential)
        }
        Record::Subscription(mut subscription) => {
            subscription.id = new_id(SubscriptionId::new)?;
            Record::Subscription(subscription)
        }
        other => other,
    })
}

/// Refuses to remove owner rank from the only owner of a relay.
fn check_not_last_owner(graph: &MembershipGraph, edge: &MembershipEdge) -> ServiceResult<()> {
    let is_owner = graph.rank_of(&edge.user, &edge.relay) == Some(Rank::Owner);
    if is_owner && graph.holders_of(&edge.relay, Rank::Owner) <= 1 {
        return Err(ServiceError::Conflict {
            message: format!("relay {} would be left without an owner", edge.relay),
        });
    }
    Ok(())
}

fn check_user_limit(relay: &Relay, members: usize) -> ServiceResult<()> {
    if members >= relay.user_limit as usize {
        return Err(ServiceError::LimitExceeded {
            message: format!(
                "relay {} is full ({} of {} users)",
                relay.id, members, relay.user_limit
            ),
        });
    }
    Ok(())
}

fn rank_of_role(roles: &[Role], id: &RoleId) -> ServiceResult<Rank> {
    roles
        .iter()
        .find(|role| &role.id == id)
        .map(|role| role.rank)
        .ok_or_else(|| ServiceError::BadRequest {
            message: format!("unknown role '{id}'"),
        })
}

fn non_empty(field: &str, value: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::BadRequest {
            message: format!("{field} cannot be empty"),
        });
    }
    Ok(value.to_string())
}

fn new_id<T, F>(make: F) -> ServiceResult<T>
where
    F: FnOnce(String) -> Result<T, &'static str>,
{
    make(record_id()).map_err(invalid_id)
}

fn invalid_id(message: &'static str) -> ServiceError {
    ServiceError::Internal {
        message: message.to_string(),
    }
}

fn wrong_collection(expected: Collection) -> ServiceError {
    ServiceError::Internal {
        message: format!("store returned a record outside {expected}"),
    }
}
