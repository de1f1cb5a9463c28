//! Cost-unit accounting for paid metadata/OHLCV calls (§4.8, §8.5).
//!
//! Mirrors the batch vendor's own CU billing model so the cycle report can
//! show what the true-batch-first policy actually saved versus a per-token
//! baseline, the same accounting `h-5n1p3r`'s `PerformanceMonitor` keeps for
//! RPC call counts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTokenCounts {
    pub stage1: u64,
    pub stage2: u64,
    pub stage3: u64,
    pub stage4: u64,
}

/// Single-writer ledger, reset once per cycle by the coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostLedger {
    pub tokens_processed: u64,
    pub basic_scoring_uses: u64,
    pub enhanced_scoring_uses: u64,
    pub ohlcv_calls_made: u64,
    pub ohlcv_calls_saved: u64,
    pub metadata_cu_spent: f64,
    pub per_stage: StageTokenCounts,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tokens_seen(&mut self, stage: &str, n: u64) {
        self.tokens_processed += n;
        match stage {
            "stage1" => self.per_stage.stage1 += n,
            "stage2" => self.per_stage.stage2 += n,
            "stage3" => self.per_stage.stage3 += n,
            "stage4" => self.per_stage.stage4 += n,
            _ => {}
        }
    }

    pub fn record_basic_scoring(&mut self) {
        self.basic_scoring_uses += 1;
    }

    pub fn record_enhanced_scoring(&mut self) {
        self.enhanced_scoring_uses += 1;
    }

    pub fn record_metadata_cu(&mut self, cu: f64) {
        self.metadata_cu_spent += cu;
    }

    /// `n` OHLCV candles retrieved in a single true-batch call: one call made,
    /// `n - 1` calls saved relative to fetching each token individually.
    pub fn record_ohlcv_batch(&mut self, n: u64) {
        if n == 0 {
            return;
        }
        self.ohlcv_calls_made += 1;
        self.ohlcv_calls_saved += n - 1;
    }

    pub fn record_ohlcv_individual(&mut self) {
        self.ohlcv_calls_made += 1;
    }

    /// `saved / (saved + made)` (§4.8, §8.5). `0.0` with no calls yet rather
    /// than `NaN`.
    pub fn cost_savings_percentage(&self) -> f64 {
        let denom = self.ohlcv_calls_saved + self.ohlcv_calls_made;
        if denom == 0 {
            0.0
        } else {
            self.ohlcv_calls_saved as f64 / denom as f64
        }
    }
}
