//! Heartbeat configuration for willingness decay
//!
//! The heartbeat pulls every stream's willingness back toward baseline
//! even when nothing is said.

use heartflow_core::config::WillingConfig;
use std::time::Duration;

/// Configuration for the decay heartbeat
#[derive(Debug, Clone)]
pub struct DecayConfig {
    /// How often to decay
    pub interval: Duration,
    /// Fraction of the distance to baseline kept per tick
    pub factor: f64,
}

impl DecayConfig {
    pub fn from_willing(config: &WillingConfig) -> Self {
        Self {
            interval: config.decay_interval(),
            factor: config.decay_factor.clamp(0.0, 1.0),
        }
    }
}
