//! Detector configuration (§6).
//!
//! The YAML loader itself is an external collaborator (spec Non-goals); this
//! module only owns the typed shape and its defaults, the way `h-5n1p3r`'s
//! `OracleConfig`/`FeatureWeights`/`ScoreThresholds` do. A caller deserializes
//! into `DetectorConfig` with whatever format its loader produces.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Default conviction threshold used when no early-gem override applies.
    pub alert_score_threshold: f64,
    pub scoring: ScoringConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alert_score_threshold: 60.0,
            scoring: ScoringConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub early_gem_hunting: EarlyGemHuntingConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            early_gem_hunting: EarlyGemHuntingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyGemHuntingConfig {
    /// §9 OQ2: this is the *alerting* threshold, distinct from the
    /// `conviction_level` naming bands (60/70/80) in `scoring::breakdown`.
    pub high_conviction_threshold: f64,
}

impl Default for EarlyGemHuntingConfig {
    fn default() -> Self {
        Self {
            high_conviction_threshold: 35.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondingAnalysisMode {
    Heuristic,
    Accurate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolBondingConfig {
    pub analysis_mode: BondingAnalysisMode,
}

impl Default for SolBondingConfig {
    fn default() -> Self {
        Self {
            analysis_mode: BondingAnalysisMode::Heuristic,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_ohlcv_concurrency: usize,
    /// Minimum sleep before each OHLCV request, preserved as-is for
    /// rate-limit safety (§5).
    pub ohlcv_pre_sleep_ms: u64,
    pub stage3_validation_sleep_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_ohlcv_concurrency: 10,
            ohlcv_pre_sleep_ms: 300,
            stage3_validation_sleep_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_seconds: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageCaps {
    pub stage1_max_candidates: usize,
    pub stage2_min_candidates: usize,
    pub stage2_max_candidates: usize,
    pub stage3_base_max_stage4: usize,
}

impl Default for StageCaps {
    fn default() -> Self {
        Self {
            stage1_max_candidates: 35,
            stage2_min_candidates: 15,
            stage2_max_candidates: 30,
            stage3_base_max_stage4: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryTimeouts {
    pub onchain_curve_detector_seconds: u64,
    pub http_feed_seconds: u64,
}

impl Default for DiscoveryTimeouts {
    fn default() -> Self {
        Self {
            onchain_curve_detector_seconds: 60,
            http_feed_seconds: 30,
        }
    }
}

impl DiscoveryTimeouts {
    pub fn onchain(&self) -> Duration {
        Duration::from_secs(self.onchain_curve_detector_seconds)
    }

    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_feed_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub analysis: AnalysisConfig,
    pub sol_bonding: SolBondingConfig,
    pub batch: BatchConfig,
    pub breaker: BreakerConfig,
    pub stages: StageCaps,
    pub discovery_timeouts: DiscoveryTimeouts,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            sol_bonding: SolBondingConfig::default(),
            batch: BatchConfig::default(),
            breaker: BreakerConfig::default(),
            stages: StageCaps::default(),
            discovery_timeouts: DiscoveryTimeouts::default(),
        }
    }
}
