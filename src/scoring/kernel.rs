//! Scoring kernel (C7, §4.7): composes velocity, confidence, and interaction
//! analysis into the shared `(final_score, ScoringBreakdown)` result shape
//! used by basic (Stage 2/3) and enhanced (Stage 4) scoring alike.

use crate::model::{Candidate, ConfidenceLevel, Timeframe};
use crate::scoring::breakdown::{
    RiskAssessment, RiskLevel, ScoreComparison, ScoringBreakdown, CROSS_PLATFORM_BONUS_MAX,
    EARLY_PLATFORM_ANALYSIS_MAX, MOMENTUM_ANALYSIS_MAX, SAFETY_VALIDATION_MAX,
};
use crate::scoring::{confidence, interaction, velocity};

/// Platform/market-strength signal independent of velocity: source type plus
/// market-cap and liquidity bands, capped at `EARLY_PLATFORM_ANALYSIS_MAX`.
fn early_platform_analysis(candidate: &Candidate) -> f64 {
    let mut score = match candidate.source {
        crate::model::Source::GraduatedFeed => 20.0,
        crate::model::Source::BondingFeed => 18.0,
        crate::model::Source::TrendingFeed => 15.0,
        crate::model::Source::CurveDetector | crate::model::Source::LiveLaunch => 12.0,
        crate::model::Source::CachedCurve => 8.0,
    };

    if let Some(mcap) = candidate.market_cap_usd {
        if (50_000.0..=2_000_000.0).contains(&mcap) {
            score += 20.0;
        } else if (10_000.0..50_000.0).contains(&mcap) {
            score += 12.0;
        }
    }

    if let Some(liq) = candidate.liquidity_usd {
        if liq >= 50_000.0 {
            score += 10.0;
        } else if liq >= 10_000.0 {
            score += 6.0;
        }
    }

    score.min(EARLY_PLATFORM_ANALYSIS_MAX)
}

fn momentum_analysis(candidate: &Candidate) -> f64 {
    (velocity::velocity_score(candidate) * MOMENTUM_ANALYSIS_MAX).min(MOMENTUM_ANALYSIS_MAX)
}

fn safety_validation(candidate: &Candidate) -> f64 {
    let security_component = candidate.security_score.unwrap_or(50.0) / 100.0 * 18.0;
    let holder_component = match candidate.holder_count {
        Some(h) if h >= 500 => 7.0,
        Some(h) if h >= 100 => 4.0,
        Some(h) if h >= 20 => 2.0,
        _ => 0.0,
    };
    (security_component + holder_component).min(SAFETY_VALIDATION_MAX)
}

fn cross_platform_bonus(candidate: &Candidate) -> f64 {
    let populated_timeframes = candidate.price_change_pct.populated_count() as f64;
    let bonus = (populated_timeframes / Timeframe::ALL.len() as f64) * CROSS_PLATFORM_BONUS_MAX;
    bonus.min(CROSS_PLATFORM_BONUS_MAX)
}

fn risk_level(linear_score: f64, confidence_level: ConfidenceLevel) -> RiskLevel {
    match confidence_level {
        ConfidenceLevel::VeryLow | ConfidenceLevel::Error => RiskLevel::Severe,
        ConfidenceLevel::Low if linear_score < 40.0 => RiskLevel::High,
        ConfidenceLevel::Low => RiskLevel::Moderate,
        _ if linear_score < 30.0 => RiskLevel::High,
        _ if linear_score < 60.0 => RiskLevel::Moderate,
        _ => RiskLevel::Low,
    }
}

/// Runs the full kernel for one candidate at `age_minutes`. Used for both
/// basic (no-OHLCV) and enhanced (post-OHLCV) scoring — the two modes differ
/// only in how populated `candidate`'s timeframe series already are, not in
/// the composition logic itself.
pub fn score(candidate: &Candidate, age_minutes: f64) -> (f64, ScoringBreakdown) {
    let early_platform = early_platform_analysis(candidate);
    let momentum = momentum_analysis(candidate);
    let safety = safety_validation(candidate);
    let cross_platform = cross_platform_bonus(candidate);

    let linear_score = (early_platform + momentum + safety + cross_platform)
        .min(EARLY_PLATFORM_ANALYSIS_MAX + MOMENTUM_ANALYSIS_MAX + SAFETY_VALIDATION_MAX + CROSS_PLATFORM_BONUS_MAX)
        * 100.0
        / (EARLY_PLATFORM_ANALYSIS_MAX + MOMENTUM_ANALYSIS_MAX + SAFETY_VALIDATION_MAX + CROSS_PLATFORM_BONUS_MAX);

    let interactions = interaction::analyze(candidate);
    let net_multiplier = interactions.net_multiplier();
    let velocity_confidence = confidence::assess(candidate, age_minutes);

    let corrected = linear_score * net_multiplier;
    let final_score = (corrected * velocity_confidence.threshold_adjustment).clamp(0.0, 100.0);

    let breakdown = ScoringBreakdown {
        early_platform_analysis: early_platform,
        momentum_analysis: momentum,
        safety_validation: safety,
        cross_platform_bonus: cross_platform,
        interaction_analysis: interactions,
        risk_assessment: RiskAssessment {
            risk_level: risk_level(linear_score, velocity_confidence.level),
            confidence_level: velocity_confidence.level,
        },
        score_comparison: ScoreComparison {
            linear_score_flawed: linear_score,
            interaction_score_corrected: final_score,
            mathematical_improvement: final_score - linear_score,
        },
    };

    (final_score, breakdown)
}
