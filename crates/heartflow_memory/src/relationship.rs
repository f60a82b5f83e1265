//! Nonlinear relationship value update.
//!
//! Goals of the shaping:
//! 1. Changes slow down as the value approaches either end.
//! 2. The worse a relationship, the harder it is to repair; the better it
//!    is, the easier it is to damage.
//! 3. Attention is finite: the more high-value relationships exist, the
//!    slower any mid-to-high one grows.

use heartflow_core::relationship::{RELATIONSHIP_MAX, RELATIONSHIP_MIN};
use heartflow_core::{EmotionLabel, Stance};
use std::f64::consts::PI;

/// Relationships at or above this value count as high-value peers.
pub const HIGH_VALUE_THRESHOLD: f64 = 700.0;

/// Population dampening only applies above this value.
const DAMPENING_FLOOR: f64 = 500.0;

/// Diminishing-returns factor: 1 at zero, 0 at either end.
fn saturation(value: f64) -> f64 {
    (PI * value / 2000.0).cos()
}

/// Fragility factor: >1 for good relationships, <1 for bad ones.
fn fragility(value: f64) -> f64 {
    (value / 1000.0).exp()
}

/// Change in relationship value for one detected emotion.
///
/// `high_value_peers` counts relationships at or above
/// [`HIGH_VALUE_THRESHOLD`], excluding the subject itself.
pub fn relationship_delta(
    old_value: f64,
    emotion: EmotionLabel,
    stance: Stance,
    high_value_peers: usize,
) -> f64 {
    let old = old_value.clamp(RELATIONSHIP_MIN, RELATIONSHIP_MAX);
    let base = emotion.base_delta();
    let positive = base >= 0.0;

    if !stance.admits(positive) {
        return 0.0;
    }

    match (old >= 0.0, positive) {
        (true, true) => {
            let mut delta = base * saturation(old);
            if old > DAMPENING_FLOOR {
                let n = high_value_peers as f64;
                delta *= if old >= HIGH_VALUE_THRESHOLD {
                    3.0 / (n + 2.0)
                } else {
                    3.0 / (n + 3.0)
                };
            }
            delta
        }
        (true, false) => base * fragility(old),
        (false, true) => base * fragility(old),
        (false, false) => base * saturation(old),
    }
}
