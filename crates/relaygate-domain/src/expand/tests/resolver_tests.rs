//! Expand resolver test suite.

use super::mocks::MockSnapshot;
use crate::error::DomainError;
use crate::expand::{ExpandConfig, ExpandResolver, ExpandTree, ExpandedRecord, Expansion};
use crate::model::{Collection, Principal, Record, Relation, UserId};
use crate::source::membership_graph;

fn principal(user: &str) -> Principal {
    Principal::new(UserId::new(user).unwrap())
}

/// alice owns r1 and bob is a member there. carol owns r2, where bob is
/// also a member. alice and carol share nothing.
async fn fixture() -> MockSnapshot {
    let snapshot = MockSnapshot::new();
    for user in ["alice", "bob", "carol"] {
        snapshot.add_user_with_key(user).await;
    }
    snapshot.add_relay("r1", "alice").await;
    snapshot.add_relay("r2", "carol").await;
    snapshot.add_edge("e1", "r1", "alice", "owner").await;
    snapshot.add_edge("e2", "r1", "bob", "member").await;
    snapshot.add_edge("e3", "r2", "carol", "owner").await;
    snapshot.add_edge("e4", "r2", "bob", "member").await;
    snapshot
}

async fn expand(
    snapshot: &MockSnapshot,
    viewer: &str,
    root: Record,
    paths: &str,
) -> ExpandedRecord {
    let p = principal(viewer);
    let graph = membership_graph(snapshot, &p).await.unwrap();
    let tree = ExpandTree::parse(paths, 6).unwrap();
    ExpandResolver::default()
        .resolve(snapshot, &p, &graph, root, &tree)
        .await
        .unwrap()
}

fn ids(records: Vec<&ExpandedRecord>) -> Vec<&str> {
    let mut ids: Vec<&str> = records.into_iter().map(|r| r.record.id()).collect();
    ids.sort();
    ids
}

// ========== Section 1: Plain Hops ==========

#[tokio::test]
async fn test_relay_lists_its_membership_edges() {
    let snapshot = fixture().await;
    let r1 = snapshot.get(Collection::Relay, "r1").await;

    let expanded = expand(&snapshot, "alice", r1, "relay_roles_via_relay").await;

    assert!(matches!(
        expanded.get("relay_roles_via_relay"),
        Some(Expansion::Many(edges)) if edges.len() == 2
    ));
}

#[tokio::test]
async fn test_single_hop_yields_one_record() {
    let snapshot = fixture().await;
    let edge = snapshot.get(Collection::MembershipEdge, "e2").await;

    let expanded = expand(&snapshot, "bob", edge, "relay,role,user").await;

    assert!(matches!(expanded.get("relay"), Some(Expansion::One(_))));
    assert_eq!(ids(expanded.reach("role")), vec!["member"]);
    assert_eq!(ids(expanded.reach("user")), vec!["bob"]);
}

#[tokio::test]
async fn test_empty_tree_returns_bare_record() {
    let snapshot = fixture().await;
    let r1 = snapshot.get(Collection::Relay, "r1").await;

    let expanded = expand(&snapshot, "alice", r1.clone(), "").await;

    assert_eq!(expanded, ExpandedRecord::bare(r1));
    assert!(snapshot.hops().await.is_empty());
}

#[tokio::test]
async fn test_unset_reference_omits_key() {
    let snapshot = fixture().await;
    let alice = snapshot.get(Collection::User, "alice").await;

    let expanded = expand(
        &snapshot,
        "alice",
        alice,
        "user_settings_via_user.anthropic_apikey",
    )
    .await;

    let settings = expanded.reach("user_settings_via_user");
    assert_eq!(settings.len(), 1);
    assert!(settings[0].get("anthropic_apikey").is_none());
}

// ========== Section 2: Masking ==========

#[tokio::test]
async fn test_edges_on_foreign_relays_are_masked() {
    let snapshot = fixture().await;
    let bob = snapshot.get(Collection::User, "bob").await;

    // alice sees bob through r1 but is not on r2.
    let expanded = expand(&snapshot, "alice", bob, "relay_roles_via_user.relay").await;

    assert_eq!(ids(expanded.reach("relay_roles_via_user")), vec!["e2"]);
    assert_eq!(ids(expanded.reach("relay_roles_via_user.relay")), vec!["r1"]);
}

#[tokio::test]
async fn test_masked_node_takes_its_subtree_with_it() {
    let snapshot = fixture().await;
    let bob = snapshot.get(Collection::User, "bob").await;

    // e4 resolves to r2 and carol, but e4 itself is masked for alice.
    let expanded = expand(
        &snapshot,
        "alice",
        bob,
        "relay_roles_via_user.relay.creator,relay_roles_via_user.user",
    )
    .await;

    assert_eq!(
        ids(expanded.reach("relay_roles_via_user.relay.creator")),
        vec!["alice"]
    );
    assert_eq!(ids(expanded.reach("relay_roles_via_user.user")), vec!["bob"]);
    let hops = snapshot.hops().await;
    assert!(hops.contains(&(Relation::EdgeRelay, "e4".to_string())));
}

#[tokio::test]
async fn test_member_sees_every_co_member_on_shared_relays() {
    let snapshot = fixture().await;
    let bob = snapshot.get(Collection::User, "bob").await;

    let expanded = expand(
        &snapshot,
        "bob",
        bob,
        "relay_roles_via_user.relay.relay_roles_via_relay.user",
    )
    .await;

    assert_eq!(
        ids(expanded.reach("relay_roles_via_user.relay.relay_roles_via_relay.user")),
        vec!["alice", "bob", "bob", "carol"]
    );
}

// ========== Section 3: Sensitive Resources ==========

#[tokio::test]
async fn test_self_expands_own_credentials() {
    let snapshot = fixture().await;
    let alice = snapshot.get(Collection::User, "alice").await;

    let expanded = expand(
        &snapshot,
        "alice",
        alice,
        "user_settings_via_user.openai_apikey",
    )
    .await;

    let keys = expanded.reach("user_settings_via_user.openai_apikey");
    assert_eq!(ids(keys), vec!["key-alice"]);
}

#[tokio::test]
async fn test_co_member_settings_are_never_fetched() {
    let snapshot = fixture().await;
    let bob = snapshot.get(Collection::User, "bob").await;

    let expanded = expand(
        &snapshot,
        "alice",
        bob,
        "user_settings_via_user.openai_apikey,subscriptions_via_user",
    )
    .await;

    assert!(expanded.expand.is_empty());
    let hops = snapshot.hops().await;
    assert!(hops.iter().all(|(relation, _)| !relation.is_sensitive()));
}

#[tokio::test]
async fn test_credentials_masked_through_co_membership_chain() {
    let snapshot = fixture().await;
    let alice = snapshot.get(Collection::User, "alice").await;
    let chain = "relay_roles_via_user.relay.relay_roles_via_relay.user";

    let expanded = expand(
        &snapshot,
        "alice",
        alice,
        &format!("{chain}.user_settings_via_user.openai_apikey"),
    )
    .await;

    assert_eq!(ids(expanded.reach(chain)), vec!["alice", "bob"]);
    assert_eq!(
        ids(expanded.reach(&format!("{chain}.user_settings_via_user"))),
        vec!["settings-alice"]
    );
    assert_eq!(
        ids(expanded.reach(&format!("{chain}.user_settings_via_user.openai_apikey"))),
        vec!["key-alice"]
    );
}

#[tokio::test]
async fn test_credentials_masked_at_every_path_length() {
    let snapshot = fixture().await;
    let cases = [
        ("user", "bob", "user_settings_via_user.openai_apikey"),
        ("edge", "e2", "user.user_settings_via_user.openai_apikey"),
        (
            "relay",
            "r1",
            "relay_roles_via_relay.user.user_settings_via_user.openai_apikey",
        ),
        (
            "edge",
            "e1",
            "relay.relay_roles_via_relay.user.user_settings_via_user.openai_apikey",
        ),
    ];

    for (kind, id, paths) in cases {
        let root = match kind {
            "user" => snapshot.get(Collection::User, id).await,
            "edge" => snapshot.get(Collection::MembershipEdge, id).await,
            _ => snapshot.get(Collection::Relay, id).await,
        };
        let expanded = expand(&snapshot, "alice", root, paths).await;
        let leaked: Vec<&str> = ids(expanded.reach(paths))
            .into_iter()
            .filter(|key| *key != "key-alice")
            .collect();
        assert!(leaked.is_empty(), "{paths} leaked {leaked:?}");
    }
}

// ========== Section 4: Limits and Unknown Names ==========

#[tokio::test]
async fn test_unknown_relation_is_ignored() {
    let snapshot = fixture().await;
    let r1 = snapshot.get(Collection::Relay, "r1").await;

    let expanded = expand(&snapshot, "alice", r1, "nonsense,creator").await;

    assert!(expanded.get("nonsense").is_none());
    assert_eq!(ids(expanded.reach("creator")), vec!["alice"]);
}

#[tokio::test]
async fn test_resolver_rejects_trees_deeper_than_config() {
    let snapshot = fixture().await;
    let p = principal("alice");
    let graph = membership_graph(&snapshot, &p).await.unwrap();
    let alice = snapshot.get(Collection::User, "alice").await;
    let tree = ExpandTree::parse("relay_roles_via_user.relay.creator", 6).unwrap();

    let err = ExpandResolver::new(ExpandConfig::default().with_max_depth(2))
        .resolve(&snapshot, &p, &graph, alice, &tree)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DomainError::ExpandDepthExceeded { max_depth: 2 }
    ));
}

#[tokio::test]
async fn test_resolve_all_expands_each_root() {
    let snapshot = fixture().await;
    let p = principal("alice");
    let graph = membership_graph(&snapshot, &p).await.unwrap();
    let roots = vec![
        snapshot.get(Collection::MembershipEdge, "e1").await,
        snapshot.get(Collection::MembershipEdge, "e2").await,
    ];
    let tree = ExpandTree::parse("user", 6).unwrap();

    let expanded = ExpandResolver::default()
        .resolve_all(&snapshot, &p, &graph, roots, &tree)
        .await
        .unwrap();

    let users: Vec<&str> = expanded
        .iter()
        .flat_map(|r| r.reach("user"))
        .map(|u| u.record.id())
        .collect();
    assert_eq!(users, vec!["alice", "bob"]);
}
