// Copyright (c) 2024 Gridstake Developers

//! Shared staking status read by reporting consumers.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::monetary::Amount;
use crate::staking::SearchStats;

/// What the staking loop is doing and why it may not be staking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinerStatus {
    /// Block version of the last attempt.
    pub version: u32,
    pub weight_sum: u64,
    pub weight_min: u64,
    pub weight_max: u64,
    pub value_sum: Amount,
    pub coin_age_sum: u64,
    pub kernel_diff_sum: f64,
    pub kernel_diff_max: f64,
    pub last_search_time: i64,
    /// `"; "`-terminated reasons the last attempt could not stake.
    pub reason_not_staking: String,
    pub created_count: u64,
    pub accepted_count: u64,
    pub kernels_found: u64,
}

impl MinerStatus {
    /// Reset the per-attempt fields. Counters survive.
    pub fn clear(&mut self) {
        self.version = 0;
        self.weight_sum = 0;
        self.weight_min = 0;
        self.weight_max = 0;
        self.value_sum = 0;
        self.coin_age_sum = 0;
        self.kernel_diff_sum = 0.0;
        self.kernel_diff_max = 0.0;
        self.reason_not_staking.clear();
    }

    pub fn append_reason(&mut self, reason: &str) {
        self.reason_not_staking.push_str(reason);
        self.reason_not_staking.push_str("; ");
    }

    pub fn set_error(&mut self, reason: &str) {
        self.clear();
        self.append_reason(reason);
    }

    pub fn is_staking(&self) -> bool {
        self.reason_not_staking.is_empty()
    }

    /// Record the aggregates of a kernel search.
    pub fn record_search(&mut self, stats: &SearchStats, found: bool) {
        self.weight_sum = stats.weight_sum;
        self.weight_min = stats.weight_min;
        self.weight_max = stats.weight_max;
        self.value_sum = stats.value_sum;
        self.coin_age_sum = stats.coin_age_sum;
        self.last_search_time = stats.search_time;
        self.kernel_diff_sum = stats.kernel_diff_sum;
        if found {
            self.kernels_found += 1;
            self.kernel_diff_max = 0.0;
        } else {
            self.kernel_diff_max = stats.kernel_diff_max;
        }
    }
}

/// Cloneable handle to the status shared between the loop and readers.
#[derive(Debug, Clone, Default)]
pub struct MinerStatusHandle(Arc<Mutex<MinerStatus>>);

impl MinerStatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MinerStatus {
        self.0.lock().clone()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut MinerStatus) -> R) -> R {
        f(&mut self.0.lock())
    }
}
