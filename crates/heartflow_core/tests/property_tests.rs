//! Property-based tests for heartflow_core.

use heartflow_core::relationship::{RELATIONSHIP_MAX, RELATIONSHIP_MIN};
use heartflow_core::{GroupInfo, Relationship, RelationshipLevel, StreamId, UserInfo};
use proptest::prelude::*;

fn arb_relationship() -> impl Strategy<Value = Relationship> {
    (RELATIONSHIP_MIN..=RELATIONSHIP_MAX).prop_map(|value| {
        let mut rel = Relationship::from_user(&UserInfo::new("qq", "1", "阿一")).unwrap();
        rel.value = value;
        rel
    })
}

proptest! {
    #[test]
    fn add_value_stays_in_range(mut rel in arb_relationship(), deltas in prop::collection::vec(-5000.0f64..5000.0, 0..20)) {
        for d in deltas {
            rel.add_value(d);
            prop_assert!((RELATIONSHIP_MIN..=RELATIONSHIP_MAX).contains(&rel.value));
            prop_assert!(!rel.saved);
        }
    }

    #[test]
    fn level_is_monotone(a in -2000.0f64..2000.0, b in -2000.0f64..2000.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(RelationshipLevel::from_value(lo) <= RelationshipLevel::from_value(hi));
    }

    #[test]
    fn group_streams_ignore_sender(u1 in "[0-9]{1,10}", u2 in "[0-9]{1,10}", gid in "[0-9]{1,10}") {
        let group = GroupInfo { group_id: gid, group_name: None };
        prop_assert_eq!(
            StreamId::derive("qq", &u1, Some(&group)),
            StreamId::derive("qq", &u2, Some(&group))
        );
    }

    #[test]
    fn private_streams_differ_per_user(u1 in "[0-9]{1,10}", u2 in "[0-9]{1,10}") {
        prop_assume!(u1 != u2);
        prop_assert_ne!(StreamId::derive("qq", &u1, None), StreamId::derive("qq", &u2, None));
    }

    #[test]
    fn private_and_group_never_collide(id in "[0-9]{1,10}") {
        let group = GroupInfo { group_id: id.clone(), group_name: None };
        prop_assert_ne!(StreamId::derive("qq", &id, None), StreamId::derive("qq", &id, Some(&group)));
    }
}
