// Copyright (c) 2024 Gridstake Developers

//! Prometheus metrics for the staking loop.
//!
//! - `gridstake_attempts_total` - staking attempts started (counter)
//! - `gridstake_kernels_found_total` - attempts that found a kernel (counter)
//! - `gridstake_blocks_created_total` - blocks handed to the acceptance pipeline (counter)
//! - `gridstake_blocks_accepted_total` - blocks the pipeline accepted (counter)
//! - `gridstake_blocks_rejected_total` - blocks the pipeline rejected (counter)
//! - `gridstake_stake_weight` - weight of the coins tried in the last search (gauge)
//! - `gridstake_stake_value` - value of the coins tried in the last search (gauge)

use prometheus::{Encoder, Gauge, IntCounter, Opts, Registry, TextEncoder};

use crate::monetary::COIN;
use crate::staking::SearchStats;

pub struct StakingMetrics {
    registry: Registry,
    pub attempts: IntCounter,
    pub kernels_found: IntCounter,
    pub blocks_created: IntCounter,
    pub blocks_accepted: IntCounter,
    pub blocks_rejected: IntCounter,
    pub stake_weight: Gauge,
    pub stake_value: Gauge,
}

impl StakingMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let attempts = IntCounter::with_opts(Opts::new("gridstake_attempts_total", "Staking attempts started"))
            .expect("metric can be created");
        let kernels_found = IntCounter::with_opts(Opts::new(
            "gridstake_kernels_found_total",
            "Staking attempts that found a kernel",
        ))
        .expect("metric can be created");
        let blocks_created = IntCounter::with_opts(Opts::new(
            "gridstake_blocks_created_total",
            "Blocks submitted to the acceptance pipeline",
        ))
        .expect("metric can be created");
        let blocks_accepted = IntCounter::with_opts(Opts::new("gridstake_blocks_accepted_total", "Blocks accepted"))
            .expect("metric can be created");
        let blocks_rejected = IntCounter::with_opts(Opts::new("gridstake_blocks_rejected_total", "Blocks rejected"))
            .expect("metric can be created");
        let stake_weight = Gauge::with_opts(Opts::new(
            "gridstake_stake_weight",
            "Weight of the coins tried in the last kernel search",
        ))
        .expect("metric can be created");
        let stake_value = Gauge::with_opts(Opts::new(
            "gridstake_stake_value",
            "Value in coins of the coins tried in the last kernel search",
        ))
        .expect("metric can be created");

        registry
            .register(Box::new(attempts.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(kernels_found.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(blocks_created.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(blocks_accepted.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(blocks_rejected.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(stake_weight.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(stake_value.clone()))
            .expect("collector can be registered");

        Self {
            registry,
            attempts,
            kernels_found,
            blocks_created,
            blocks_accepted,
            blocks_rejected,
            stake_weight,
            stake_value,
        }
    }

    pub fn record_search(&self, stats: &SearchStats) {
        self.stake_weight.set(stats.weight_sum as f64);
        self.stake_value.set(stats.value_sum as f64 / COIN as f64);
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}

impl Default for StakingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_counters() {
        let metrics = StakingMetrics::new();
        metrics.attempts.inc();
        metrics.blocks_accepted.inc();
        metrics.record_search(&SearchStats {
            weight_sum: 160,
            value_sum: 2 * COIN,
            ..Default::default()
        });

        let text = metrics.encode().unwrap();
        assert!(text.contains("gridstake_attempts_total 1"));
        assert!(text.contains("gridstake_blocks_accepted_total 1"));
        assert!(text.contains("gridstake_stake_weight 160"));
        assert!(text.contains("gridstake_stake_value 2"));
    }
}
