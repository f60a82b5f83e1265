//! Property-based tests for the willingness engine.
//!
//! Verifies that the reply probability stays in [0, 1], is monotone in the
//! interest score, and that mentions never lower it.

use heartflow_core::config::WillingConfig;
use heartflow_core::StreamId;
use heartflow_limbic::{shape_probability, ReplyContext, WillingManager};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

/// Probability for a single message on a stream primed to `start`.
fn probability(start: f64, mentioned: bool, emoji: bool, interest: f32, rating: Option<u8>) -> f64 {
    runtime().block_on(async {
        let manager = WillingManager::new(WillingConfig::default());
        let stream = StreamId::from("qq:group:prop");
        manager.set_willing(&stream, start).await;
        manager
            .compute_reply_probability(&ReplyContext {
                stream_id: &stream,
                is_mentioned: mentioned,
                is_emoji: emoji,
                interest_rate: interest,
                sender_id: "1",
                reflection_rating: rating,
            })
            .await
            .probability
    })
}

proptest! {
    #[test]
    fn probability_is_a_probability(
        start in -3.0f64..=3.0,
        mentioned in any::<bool>(),
        emoji in any::<bool>(),
        interest in 0.0f32..=10.0,
        rating in proptest::option::of(0u8..=10),
    ) {
        let p = probability(start, mentioned, emoji, interest, rating);
        prop_assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn monotone_in_interest(
        start in -3.0f64..=3.0,
        mentioned in any::<bool>(),
        emoji in any::<bool>(),
        a in 0.0f32..=10.0,
        b in 0.0f32..=10.0,
        rating in proptest::option::of(0u8..=10),
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let p_lo = probability(start, mentioned, emoji, lo, rating);
        let p_hi = probability(start, mentioned, emoji, hi, rating);
        prop_assert!(p_lo <= p_hi, "p({}) = {} > p({}) = {}", lo, p_lo, hi, p_hi);
    }

    #[test]
    fn mention_never_lowers_probability(
        start in -3.0f64..=3.0,
        emoji in any::<bool>(),
        interest in 0.0f32..=10.0,
        rating in proptest::option::of(0u8..=10),
    ) {
        let quiet = probability(start, false, emoji, interest, rating);
        let called = probability(start, true, emoji, interest, rating);
        prop_assert!(called >= quiet);
    }

    #[test]
    fn shaping_is_monotone(a in -5.0f64..=5.0, b in -5.0f64..=5.0) {
        let config = WillingConfig::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(shape_probability(lo, &config) <= shape_probability(hi, &config));
    }
}
