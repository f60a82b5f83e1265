//! Property-based tests for the relationship update.

use heartflow_core::{EmotionLabel, Stance};
use heartflow_memory::relationship_delta;
use proptest::prelude::*;

fn emotion() -> impl Strategy<Value = EmotionLabel> {
    (0..EmotionLabel::ALL.len()).prop_map(|i| EmotionLabel::ALL[i])
}

fn stance() -> impl Strategy<Value = Stance> {
    prop_oneof![
        Just(Stance::Supportive),
        Just(Stance::Neutral),
        Just(Stance::Opposed),
    ]
}

proptest! {
    #[test]
    fn delta_is_bounded_by_base(
        old in -1000.0f64..=1000.0,
        label in emotion(),
        stance in stance(),
        peers in 0usize..50,
    ) {
        let delta = relationship_delta(old, label, stance, peers);
        let bound = label.base_delta().abs() * std::f64::consts::E;
        prop_assert!(delta.is_finite());
        prop_assert!(delta.abs() <= bound + 1e-9);
    }

    #[test]
    fn delta_never_flips_sign(
        old in -1000.0f64..=1000.0,
        label in emotion(),
        stance in stance(),
        peers in 0usize..50,
    ) {
        let delta = relationship_delta(old, label, stance, peers);
        if label.base_delta() >= 0.0 {
            prop_assert!(delta >= 0.0);
        } else {
            prop_assert!(delta <= 0.0);
        }
    }

    #[test]
    fn more_peers_never_speed_up_growth(
        old in 0.0f64..=1000.0,
        a in 0usize..50,
        b in 0usize..50,
    ) {
        let (few, many) = if a <= b { (a, b) } else { (b, a) };
        let d_few = relationship_delta(old, EmotionLabel::Joy, Stance::Neutral, few);
        let d_many = relationship_delta(old, EmotionLabel::Joy, Stance::Neutral, many);
        prop_assert!(d_many <= d_few + 1e-12);
    }
}
