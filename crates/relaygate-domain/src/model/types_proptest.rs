//! Property-based tests for model types.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::model::{Rank, RelayId, UserId};

    fn rank_strategy() -> impl Strategy<Value = Rank> {
        prop_oneof![Just(Rank::Member), Just(Rank::Owner)]
    }

    proptest! {
        #[test]
        fn test_rank_order_is_total(a in rank_strategy(), b in rank_strategy()) {
            // Exactly one of <, ==, > holds
            let relations = [a < b, a == b, a > b];
            prop_assert_eq!(relations.iter().filter(|x| **x).count(), 1);
        }

        #[test]
        fn test_rank_display_parses_back(rank in rank_strategy()) {
            prop_assert_eq!(rank.to_string().parse::<Rank>().unwrap(), rank);
        }

        #[test]
        fn test_valid_ids_are_accepted(id in "[a-z0-9]{1,24}") {
            let user = UserId::new(&id);
            prop_assert!(user.is_ok());
            let user = user.unwrap();
            prop_assert_eq!(user.as_str(), id.as_str());
        }

        #[test]
        fn test_ids_with_whitespace_are_rejected(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            let name = format!("{a} {b}");
            prop_assert!(RelayId::new(name).is_err());
        }
    }
}
