//! Tests for the policy service internals.

use super::*;
use crate::error::ServiceError;
use async_trait::async_trait;
use relaygate_domain::model::{Principal, Rank, Record, Role, RoleId, User, UserId};
use relaygate_domain::{DomainResult, RecordSource, Snapshot};
use relaygate_storage::{
    MemoryRecordStore, MemorySnapshot, RecordStore, StorageError, StorageResult, WriteBatch,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ============================================================
// Test Mocks
// ============================================================

/// Store that reports a version conflict for the first `losses` commits that
/// expect a version, then behaves like the wrapped memory store.
struct RacingStore {
    inner: MemoryRecordStore,
    losses: u32,
    commits: AtomicU32,
}

impl RacingStore {
    fn new(losses: u32) -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            losses,
            commits: AtomicU32::new(0),
        }
    }

    fn attempts(&self) -> u32 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for RacingStore {
    type Snapshot = MemorySnapshot;

    async fn snapshot(&self) -> DomainResult<MemorySnapshot> {
        self.inner.snapshot().await
    }
}

#[async_trait]
impl RecordStore for RacingStore {
    async fn commit(
        &self,
        expected_version: Option<u64>,
        batch: WriteBatch,
    ) -> StorageResult<u64> {
        let Some(expected) = expected_version else {
            return self.inner.commit(None, batch).await;
        };
        let seen = self.commits.fetch_add(1, Ordering::SeqCst);
        if seen < self.losses {
            return Err(StorageError::VersionConflict {
                expected,
                actual: expected + 1,
            });
        }
        self.inner.commit(Some(expected), batch).await
    }

    async fn version(&self) -> u64 {
        self.inner.version().await
    }
}

fn alice() -> Principal {
    Principal::new(UserId::new("alice").unwrap())
}

async fn seed(store: &impl RecordStore) {
    let batch = WriteBatch::new()
        .put(Record::User(User {
            id: UserId::new("alice").unwrap(),
            name: "Alice".to_string(),
            picture: None,
        }))
        .put(Record::Role(Role {
            id: RoleId::new("owner").unwrap(),
            name: "owner".to_string(),
            rank: Rank::Owner,
        }))
        .put(Record::Role(Role {
            id: RoleId::new("member").unwrap(),
            name: "member".to_string(),
            rank: Rank::Member,
        }));
    store.commit(None, batch).await.unwrap();
}

async fn service(losses: u32) -> PolicyService<RacingStore> {
    let store = Arc::new(RacingStore::new(losses));
    seed(store.as_ref()).await;
    PolicyService::new(store, ServiceConfig::default())
}

// ============================================================
// Section 1: Configuration
// ============================================================

#[test]
fn test_service_config_follows_server_config() {
    let mut server = crate::config::ServerConfig::default();
    server.relays.max_owned_relays = 2;
    server.storage.max_write_attempts = 7;

    let config = ServiceConfig::from(&server);

    assert_eq!(config.max_owned_relays, 2);
    assert_eq!(config.max_write_attempts, 7);
    assert_eq!(config.max_expand_depth, 6);
    assert_eq!(config.default_user_limit, 10);
}

#[test]
fn test_service_config_builders() {
    let config = ServiceConfig::default()
        .with_max_expand_depth(3)
        .with_default_user_limit(4)
        .with_max_owned_relays(5)
        .with_max_write_attempts(1);

    assert_eq!(
        config,
        ServiceConfig {
            max_expand_depth: 3,
            default_user_limit: 4,
            max_owned_relays: 5,
            max_write_attempts: 1,
        }
    );
}

#[tokio::test]
async fn test_created_relay_takes_configured_user_limit() {
    let mut server = crate::config::ServerConfig::default();
    server.relays.default_user_limit = 2;
    let store = MemoryRecordStore::new_shared();
    seed(store.as_ref()).await;
    let service = PolicyService::from_config(store, &server);

    let created = service.create_relay(&alice(), "pair").await.unwrap();

    assert_eq!(created.relay.user_limit, 2);
}

// ============================================================
// Section 2: Commit Retries
// ============================================================

#[tokio::test]
async fn test_lost_race_is_retried_from_fresh_snapshot() {
    let service = service(2).await;

    let created = service.create_relay(&alice(), "lobby").await.unwrap();

    assert_eq!(service.store().attempts(), 3);
    assert_eq!(created.relay.name, "lobby");
    assert_eq!(created.membership.user.as_str(), "alice");
}

#[tokio::test]
async fn test_retries_exhausted_reports_conflict() {
    let service = service(u32::MAX).await;

    let err = service.create_relay(&alice(), "lobby").await.unwrap_err();

    assert!(matches!(err, ServiceError::Conflict { .. }));
    assert_eq!(err.code(), "conflict");
    assert_eq!(service.store().attempts(), 3);
}

#[tokio::test]
async fn test_install_default_roles_is_idempotent() {
    let store = MemoryRecordStore::new_shared();
    let service = PolicyService::new(store.clone(), ServiceConfig::default());

    service.install_default_roles().await.unwrap();
    let version = store.version().await;
    service.install_default_roles().await.unwrap();

    assert_eq!(store.version().await, version);
    let roles = store.snapshot().await.unwrap().roles().await.unwrap();
    let ranks: Vec<Rank> = roles.into_iter().map(|r| r.rank).collect();
    assert_eq!(ranks.len(), 2);
    assert!(ranks.contains(&Rank::Owner) && ranks.contains(&Rank::Member));
}

#[tokio::test]
async fn test_blank_relay_name_is_rejected() {
    let service = service(0).await;

    let err = service.create_relay(&alice(), "   ").await.unwrap_err();

    assert!(matches!(err, ServiceError::BadRequest { .. }));
    assert_eq!(service.store().attempts(), 0);
}
