//! Core candidate record and the small value types it is built from.
//!
//! `Candidate` is the single typed record that flows through every stage
//! (§3 of the design doc, "Dynamic typing -> typed candidate record"). Fields
//! are `Option` wherever a stage may not have populated them yet; pipeline
//! metadata fields track where in the funnel the candidate currently sits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where a candidate was first observed. Source-aware scoring (Stage 1) and
/// dedup precedence both key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    TrendingFeed,
    GraduatedFeed,
    BondingFeed,
    CurveDetector,
    LiveLaunch,
    CachedCurve,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::TrendingFeed => "trending-feed",
            Source::GraduatedFeed => "graduated-feed",
            Source::BondingFeed => "bonding-feed",
            Source::CurveDetector => "curve-detector",
            Source::LiveLaunch => "live-launch",
            Source::CachedCurve => "cached-curve",
        }
    }
}

/// A timeframe bucket shared by volume, trade count, and price-change series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M5,
    M15,
    M30,
    H1,
    H6,
    H24,
}

impl Timeframe {
    pub const SHORT: [Timeframe; 2] = [Timeframe::M5, Timeframe::M15];
    pub const ALL: [Timeframe; 6] = [
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H6,
        Timeframe::H24,
    ];
}

/// A sparse per-timeframe series. Only the timeframes a source or
/// enrichment call actually populated are `Some`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeframeSeries<T> {
    pub m5: Option<T>,
    pub m15: Option<T>,
    pub m30: Option<T>,
    pub h1: Option<T>,
    pub h6: Option<T>,
    pub h24: Option<T>,
}

impl<T: Copy> TimeframeSeries<T> {
    pub fn get(&self, tf: Timeframe) -> Option<T> {
        match tf {
            Timeframe::M5 => self.m5,
            Timeframe::M15 => self.m15,
            Timeframe::M30 => self.m30,
            Timeframe::H1 => self.h1,
            Timeframe::H6 => self.h6,
            Timeframe::H24 => self.h24,
        }
    }

    pub fn set(&mut self, tf: Timeframe, value: T) {
        match tf {
            Timeframe::M5 => self.m5 = Some(value),
            Timeframe::M15 => self.m15 = Some(value),
            Timeframe::M30 => self.m30 = Some(value),
            Timeframe::H1 => self.h1 = Some(value),
            Timeframe::H6 => self.h6 = Some(value),
            Timeframe::H24 => self.h24 = Some(value),
        }
    }

    /// Count of timeframes with a populated signal; used by the
    /// meaningful-momentum check in `scoring::confidence`.
    pub fn populated_count(&self) -> usize {
        [
            self.m5.is_some(),
            self.m15.is_some(),
            self.m30.is_some(),
            self.h1.is_some(),
            self.h6.is_some(),
            self.h24.is_some(),
        ]
        .into_iter()
        .filter(|x| *x)
        .count()
    }
}

/// How far a candidate has progressed through the funnel. Monotone
/// non-decreasing for the lifetime of a cycle (§3 invariant ii, §8.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TriageStage {
    Discovered,
    Stage1Triaged,
    Stage2Filtered,
    Stage3Validated,
    Stage4Analyzed,
}

/// Which stage's scoring failed and left the candidate carrying a
/// fallback score (§3 invariant iii, §7 `ScoringFailure`/`StageFailure`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ErrorMarker {
    Stage1Error(String),
    Stage2Error(String),
    Stage3Error(String),
    Stage4Error(String),
}

/// Age-aware confidence label attached to a score (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    EarlyDetection,
    High,
    Medium,
    Low,
    VeryLow,
    Error,
}

impl ConfidenceLevel {
    /// Multiplier applied to the final score (§4.7 table). `EarlyDetection`
    /// is a bonus, not a penalty: a strong-momentum signal this early in a
    /// token's life lowers the bar rather than raising it.
    pub fn threshold_adjustment(&self) -> f64 {
        match self {
            ConfidenceLevel::EarlyDetection => 0.95,
            ConfidenceLevel::High => 1.02,
            ConfidenceLevel::Medium => 1.0,
            ConfidenceLevel::Low => 0.95,
            ConfidenceLevel::VeryLow => 0.90,
            ConfidenceLevel::Error => 0.85,
        }
    }
}

/// Age bracket driving the confidence policy (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeCategory {
    UltraEarly,
    Early,
    Established,
    Mature,
}

impl AgeCategory {
    pub fn from_minutes(age_minutes: f64) -> Self {
        if age_minutes <= 30.0 {
            AgeCategory::UltraEarly
        } else if age_minutes <= 120.0 {
            AgeCategory::Early
        } else if age_minutes <= 720.0 {
            AgeCategory::Established
        } else {
            AgeCategory::Mature
        }
    }
}

/// Result of the age-aware confidence model (§3 `VelocityConfidence`, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityConfidence {
    pub level: ConfidenceLevel,
    pub confidence_score: f64,
    pub coverage_percentage: f64,
    pub threshold_adjustment: f64,
    pub age_category: AgeCategory,
    pub age_minutes: f64,
}

/// A mutable record keyed by `address`, accumulating fields as it flows
/// through the funnel (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub address: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub source: Source,
    pub first_seen_at: DateTime<Utc>,

    pub price_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub volume: TimeframeSeries<f64>,
    pub trades: TimeframeSeries<u64>,
    pub price_change_pct: TimeframeSeries<f64>,
    pub unique_traders_24h: Option<u64>,
    pub holder_count: Option<u64>,
    pub security_score: Option<f64>,

    pub bonding_curve_progress_pct: Option<f64>,
    pub graduation_threshold_usd_or_sol: Option<f64>,
    pub hours_since_graduation: Option<f64>,

    pub discovery_priority_score: Option<f64>,
    pub enhanced_score: Option<f64>,
    pub validation_score: Option<f64>,
    pub final_score: Option<f64>,
    pub triage_stage: TriageStage,
    pub deep_analysis_phase: bool,
    pub enriched: bool,
    pub velocity_confidence: Option<VelocityConfidence>,
    pub error_marker: Option<ErrorMarker>,

    pub avg_trade_size: Option<f64>,
    pub liquidity_to_mcap_ratio: Option<f64>,
    pub daily_turnover_ratio: Option<f64>,
}

impl Candidate {
    pub fn new(address: impl Into<String>, source: Source, first_seen_at: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            symbol: None,
            name: None,
            source,
            first_seen_at,
            price_usd: None,
            market_cap_usd: None,
            liquidity_usd: None,
            volume: TimeframeSeries::default(),
            trades: TimeframeSeries::default(),
            price_change_pct: TimeframeSeries::default(),
            unique_traders_24h: None,
            holder_count: None,
            security_score: None,
            bonding_curve_progress_pct: None,
            graduation_threshold_usd_or_sol: None,
            hours_since_graduation: None,
            discovery_priority_score: None,
            enhanced_score: None,
            validation_score: None,
            final_score: None,
            triage_stage: TriageStage::Discovered,
            deep_analysis_phase: false,
            enriched: false,
            velocity_confidence: None,
            error_marker: None,
            avg_trade_size: None,
            liquidity_to_mcap_ratio: None,
            daily_turnover_ratio: None,
        }
    }

    /// Advance `triage_stage`, ignoring attempts to move it backward
    /// (§3 invariant ii).
    pub fn advance_stage(&mut self, stage: TriageStage) {
        if stage > self.triage_stage {
            self.triage_stage = stage;
        }
    }

    /// 44-character base58 address check (§3, "any: valid 44-char address").
    pub fn has_valid_address(&self) -> bool {
        self.address.len() == 44
            && solana_sdk::pubkey::Pubkey::from_str(&self.address).is_ok()
    }

    /// Age of the candidate since first observed, in minutes.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.first_seen_at).num_milliseconds() as f64 / 60_000.0
    }

    /// True when the candidate graduated less than an hour ago (§3, §glossary).
    pub fn is_fresh_graduate(&self) -> bool {
        self.hours_since_graduation.is_some_and(|h| h < 1.0)
    }

    /// True when the candidate graduated between one and six hours ago.
    pub fn is_recent_graduate(&self) -> bool {
        self.hours_since_graduation
            .is_some_and(|h| (1.0..=6.0).contains(&h))
    }

    /// Recompute the enrichment-derived ratios (§4.2). Call after merging
    /// any batch metadata result.
    pub fn recompute_derived_metrics(&mut self) {
        let volume_24h = self.volume.h24.unwrap_or(0.0);
        let trades_24h = self.trades.h24.unwrap_or(0);
        self.avg_trade_size = Some(volume_24h / (trades_24h.max(1) as f64));

        if let (Some(liq), Some(mcap)) = (self.liquidity_usd, self.market_cap_usd) {
            if mcap > 0.0 {
                self.liquidity_to_mcap_ratio = Some(liq / mcap);
            }
        }
        if let Some(mcap) = self.market_cap_usd {
            if mcap > 0.0 {
                self.daily_turnover_ratio = Some(volume_24h / mcap);
            }
        }
    }
}

/// Tracks a bonding-curve candidate's progress across cycles so the
/// coordinator can tag `is_fresh_graduate`/`is_recent_graduate` without a
/// fresh RPC round-trip every cycle. Grounded on the Python source's
/// `monitor_graduation_progression` (see SPEC_FULL.md, Supplemented Features).
#[derive(Debug, Clone)]
pub struct GraduationWatch {
    pub address: String,
    pub last_progress_pct: f64,
    pub graduated_at: Option<DateTime<Utc>>,
}

impl GraduationWatch {
    pub fn observe(&mut self, progress_pct: f64, now: DateTime<Utc>) {
        if self.graduated_at.is_none() && progress_pct >= 100.0 {
            self.graduated_at = Some(now);
        }
        self.last_progress_pct = progress_pct;
    }

    pub fn hours_since_graduation(&self, now: DateTime<Utc>) -> Option<f64> {
        self.graduated_at
            .map(|t| (now - t).num_milliseconds() as f64 / 3_600_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triage_stage_is_ordered() {
        assert!(TriageStage::Discovered < TriageStage::Stage1Triaged);
        assert!(TriageStage::Stage3Validated < TriageStage::Stage4Analyzed);
    }

    #[test]
    fn advance_stage_never_regresses() {
        let mut c = Candidate::new(
            "11111111111111111111111111111111111111111".to_string(),
            Source::TrendingFeed,
            Utc::now(),
        );
        c.advance_stage(TriageStage::Stage3Validated);
        c.advance_stage(TriageStage::Stage1Triaged);
        assert_eq!(c.triage_stage, TriageStage::Stage3Validated);
    }

    #[test]
    fn fresh_graduate_requires_sub_hour_age() {
        let mut c = Candidate::new("x", Source::GraduatedFeed, Utc::now());
        c.hours_since_graduation = Some(0.3);
        assert!(c.is_fresh_graduate());
        assert!(!c.is_recent_graduate());

        c.hours_since_graduation = Some(3.0);
        assert!(!c.is_fresh_graduate());
        assert!(c.is_recent_graduate());
    }

    #[test]
    fn derived_metrics_avoid_division_by_zero() {
        let mut c = Candidate::new("x", Source::TrendingFeed, Utc::now());
        c.volume.h24 = Some(1000.0);
        c.trades.h24 = Some(0);
        c.recompute_derived_metrics();
        assert_eq!(c.avg_trade_size, Some(1000.0));
    }

    #[test]
    fn valid_address_requires_44_char_base58() {
        let c = Candidate::new("too-short", Source::TrendingFeed, Utc::now());
        assert!(!c.has_valid_address());
    }
}
