//! Age-aware confidence model (§4.7 "Age-aware confidence"). Token age
//! drives the policy, not raw data coverage — a ten-minute-old token with
//! only a 5m candle is treated very differently from a two-week-old token
//! with the same coverage.

use crate::model::{AgeCategory, Candidate, ConfidenceLevel, Timeframe, VelocityConfidence};

/// "Meaningful momentum": short-timeframe activity (5m or 15m present) AND
/// ≥2 distinct timeframes carrying a signal. A lone 5m datapoint does not
/// qualify (§4.7).
fn has_meaningful_momentum(candidate: &Candidate) -> bool {
    let short_present = candidate.price_change_pct.get(Timeframe::M5).is_some()
        || candidate.price_change_pct.get(Timeframe::M15).is_some();
    short_present && candidate.price_change_pct.populated_count() >= 2
}

/// Fraction (0.0-1.0) of timeframes carrying a signal in *any* of the three
/// series (price change, volume, trades), not price change alone — a token
/// with only `volume_5m` populated still has some coverage at M5, not none
/// (§4.7, §8 scenario e). `VelocityConfidence` stores this scaled to
/// `[0,100]` per the data model invariant; banding below works in fraction
/// terms since the coverage cutoffs (50%, 67%, ...) convert identically
/// either way.
fn coverage_fraction(candidate: &Candidate) -> f64 {
    let populated = Timeframe::ALL
        .into_iter()
        .filter(|&tf| {
            candidate.price_change_pct.get(tf).is_some()
                || candidate.volume.get(tf).is_some()
                || candidate.trades.get(tf).is_some()
        })
        .count();
    populated as f64 / Timeframe::ALL.len() as f64
}

/// Whether the momentum signals present are themselves strong, used to
/// distinguish `EARLY_DETECTION` from `LOW` in the ULTRA_EARLY bracket.
fn has_strong_momentum(candidate: &Candidate) -> bool {
    let strong_short = candidate
        .price_change_pct
        .get(Timeframe::M5)
        .is_some_and(|v| v > 10.0)
        || candidate
            .price_change_pct
            .get(Timeframe::M15)
            .is_some_and(|v| v > 10.0);
    strong_short && has_meaningful_momentum(candidate)
}

/// True if the only populated timeframes are long-horizon (1h/6h/24h) ones —
/// the ULTRA_EARLY "long-term-only data" case, which is suspicious rather
/// than reassuring for a token this young.
fn is_long_term_only(candidate: &Candidate) -> bool {
    let short_present = candidate.price_change_pct.get(Timeframe::M5).is_some()
        || candidate.price_change_pct.get(Timeframe::M15).is_some()
        || candidate.price_change_pct.get(Timeframe::M30).is_some();
    let long_present = candidate.price_change_pct.get(Timeframe::H6).is_some()
        || candidate.price_change_pct.get(Timeframe::H24).is_some();
    !short_present && long_present
}

/// The full age-aware confidence table (§4.7).
pub fn assess(candidate: &Candidate, age_minutes: f64) -> VelocityConfidence {
    let age_category = AgeCategory::from_minutes(age_minutes);
    let coverage = coverage_fraction(candidate);

    let level = match age_category {
        AgeCategory::UltraEarly => {
            if has_strong_momentum(candidate) {
                ConfidenceLevel::EarlyDetection
            } else if is_long_term_only(candidate) {
                ConfidenceLevel::Low
            } else if coverage > 0.0 {
                ConfidenceLevel::Medium
            } else {
                ConfidenceLevel::Low
            }
        }
        AgeCategory::Early => {
            if coverage >= 0.50 {
                ConfidenceLevel::High
            } else if coverage >= 0.33 {
                ConfidenceLevel::Medium
            } else {
                ConfidenceLevel::Low
            }
        }
        AgeCategory::Established => {
            if coverage >= 0.67 {
                ConfidenceLevel::High
            } else if coverage >= 0.50 {
                ConfidenceLevel::Medium
            } else {
                ConfidenceLevel::Low
            }
        }
        AgeCategory::Mature => {
            if coverage >= 0.83 {
                ConfidenceLevel::High
            } else if coverage >= 0.67 {
                ConfidenceLevel::Medium
            } else if coverage >= 0.50 {
                ConfidenceLevel::Low
            } else {
                ConfidenceLevel::VeryLow
            }
        }
    };

    let confidence_score = match level {
        ConfidenceLevel::EarlyDetection => 0.95,
        ConfidenceLevel::High => 0.85,
        ConfidenceLevel::Medium => 0.65,
        ConfidenceLevel::Low => 0.40,
        ConfidenceLevel::VeryLow => 0.20,
        ConfidenceLevel::Error => 0.0,
    };

    VelocityConfidence {
        level,
        confidence_score,
        coverage_percentage: coverage * 100.0,
        threshold_adjustment: level.threshold_adjustment(),
        age_category,
        age_minutes,
    }
}
