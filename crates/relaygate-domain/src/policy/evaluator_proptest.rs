//! Property-based tests for the evaluator.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::membership::MembershipGraph;
    use crate::model::{
        Collection, EdgeId, MembershipEdge, Operation, Principal, Rank, Record, RelayId, Role,
        RoleId, User, UserId,
    };
    use crate::policy::{conceal, Decision, PolicyEvaluator, PolicyRequest, Verdict};

    const USERS: [&str; 4] = ["alice", "bob", "carol", "dave"];
    const RELAYS: [&str; 3] = ["r1", "r2", "r3"];

    fn roles() -> Vec<Role> {
        vec![
            Role {
                id: RoleId::new("owner").unwrap(),
                name: "Owner".to_string(),
                rank: Rank::Owner,
            },
            Role {
                id: RoleId::new("member").unwrap(),
                name: "Member".to_string(),
                rank: Rank::Member,
            },
        ]
    }

    /// Random edge sets over a small universe; at most one edge per pair.
    fn edges_strategy() -> impl Strategy<Value = Vec<MembershipEdge>> {
        proptest::collection::btree_map((0..USERS.len(), 0..RELAYS.len()), any::<bool>(), 0..8)
            .prop_map(|pairs| {
                pairs
                    .into_iter()
                    .enumerate()
                    .map(|(i, ((u, r), owner))| MembershipEdge {
                        id: EdgeId::new(format!("e{i}")).unwrap(),
                        relay: RelayId::new(RELAYS[r]).unwrap(),
                        user: UserId::new(USERS[u]).unwrap(),
                        role: RoleId::new(if owner { "owner" } else { "member" }).unwrap(),
                    })
                    .collect()
            })
    }

    fn op_strategy() -> impl Strategy<Value = Operation> {
        prop_oneof![
            Just(Operation::Get),
            Just(Operation::Update),
            Just(Operation::Delete),
        ]
    }

    proptest! {
        #[test]
        fn test_evaluate_is_idempotent(
            edges in edges_strategy(),
            principal in 0..USERS.len(),
            target in 0..USERS.len(),
            op in op_strategy(),
        ) {
            let graph = MembershipGraph::build(&edges, &roles()).unwrap();
            let principal = Principal::new(UserId::new(USERS[principal]).unwrap());
            let record = Record::User(User {
                id: UserId::new(USERS[target]).unwrap(),
                name: USERS[target].to_string(),
                picture: None,
            });
            let evaluator = PolicyEvaluator::new();
            let request = PolicyRequest::on(&principal, op, &record);

            let first = evaluator.evaluate(&request, &graph).unwrap();
            let second = evaluator.evaluate(&request, &graph).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn test_non_member_never_sees_relay(
            edges in edges_strategy(),
            principal in 0..USERS.len(),
            relay in 0..RELAYS.len(),
            op in op_strategy(),
        ) {
            let graph = MembershipGraph::build(&edges, &roles()).unwrap();
            let user = UserId::new(USERS[principal]).unwrap();
            let relay_id = RelayId::new(RELAYS[relay]).unwrap();
            prop_assume!(graph.rank_of(&user, &relay_id).is_none());

            let principal = Principal::new(user);
            let record = Record::Relay(crate::model::Relay {
                id: relay_id,
                name: "relay".to_string(),
                creator: UserId::new("alice").unwrap(),
                user_limit: 10,
                created_at: chrono::Utc::now(),
            });
            let decision = PolicyEvaluator::new()
                .evaluate(&PolicyRequest::on(&principal, op, &record), &graph)
                .unwrap();
            prop_assert!(matches!(decision, Decision::Deny(_)));
            prop_assert_eq!(conceal(op, decision), Verdict::NotFound);
        }

        #[test]
        fn test_list_scope_agrees_with_get(
            edges in edges_strategy(),
            principal in 0..USERS.len(),
        ) {
            let graph = MembershipGraph::build(&edges, &roles()).unwrap();
            let principal = Principal::new(UserId::new(USERS[principal]).unwrap());
            let evaluator = PolicyEvaluator::new();
            let Decision::AllowWithScope(scope) = evaluator
                .evaluate(&PolicyRequest::list(&principal, Collection::MembershipEdge), &graph)
                .unwrap()
            else {
                panic!("list must be scoped");
            };

            for edge in &edges {
                let record = Record::MembershipEdge(edge.clone());
                prop_assert_eq!(
                    scope.admits(&record, &graph),
                    evaluator.can_get(&principal, &record, &graph)
                );
            }
        }
    }
}
