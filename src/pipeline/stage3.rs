//! Stage-3 Market Validator (C5, §4.5). Validates fundamentals without any
//! OHLCV calls, then applies circuit-breaker-aware backpressure before
//! handing finalists to Stage 4.

use crate::model::{Candidate, Timeframe, TriageStage};
use crate::resilience::CircuitBreaker;
use std::time::Duration;
use tracing::instrument;

pub const VALIDATION_THRESHOLD: f64 = 35.0;
/// Early-gem composite gate applied during backpressure, when present.
pub const EARLY_GEM_SCORE_GATE: f64 = 70.0;

fn mcap_band(candidate: &Candidate) -> f64 {
    match candidate.market_cap_usd {
        Some(m) if (50_000.0..=5_000_000.0).contains(&m) => 30.0,
        Some(m) if (10_000.0..50_000.0).contains(&m) => 25.0,
        Some(m) if m > 5_000_000.0 => 15.0,
        _ => 0.0,
    }
}

fn liquidity_band(candidate: &Candidate) -> f64 {
    match candidate.liquidity_usd {
        Some(l) if l > 100_000.0 => 25.0,
        Some(l) if l > 50_000.0 => 20.0,
        Some(l) if l > 10_000.0 => 10.0,
        _ => 0.0,
    }
}

fn volume_band(candidate: &Candidate) -> f64 {
    match candidate.volume.get(Timeframe::H24) {
        Some(v) if v > 500_000.0 => 25.0,
        Some(v) if v > 100_000.0 => 20.0,
        Some(v) if v > 10_000.0 => 10.0,
        _ => 0.0,
    }
}

fn activity_band(candidate: &Candidate) -> f64 {
    match candidate.trades.get(Timeframe::H24) {
        Some(t) if t > 1000 => 20.0,
        Some(t) if t > 500 => 15.0,
        Some(t) if t > 100 => 10.0,
        _ => 0.0,
    }
}

/// 0-100 fundamentals score (§4.5).
pub fn validation_score(candidate: &Candidate) -> f64 {
    mcap_band(candidate) + liquidity_band(candidate) + volume_band(candidate) + activity_band(candidate)
}

/// `max(5, 10 - failure_count*2)` from the circuit breaker (§4.5, §5).
fn max_stage4(breaker: &CircuitBreaker, base: usize) -> usize {
    breaker.max_stage4(base)
}

/// Runs Stage 3: score, threshold, then backpressure-trim to what Stage 4
/// can actually afford to analyze (§4.5). `validation_sleep` is the ~100ms
/// pacing between per-candidate validations (§5); a caller driving many
/// candidates should await it between calls, which this function does
/// itself to keep the pacing invariant local to the stage.
#[instrument(skip(candidates, breaker), fields(n = candidates.len()))]
pub async fn validate(
    candidates: Vec<Candidate>,
    breaker: &CircuitBreaker,
    base_max_stage4: usize,
    validation_sleep: Duration,
) -> Vec<Candidate> {
    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let score = validation_score(&candidate);
        scored.push((score, candidate));
        if !validation_sleep.is_zero() {
            tokio::time::sleep(validation_sleep).await;
        }
    }

    scored.retain(|(score, _)| *score >= VALIDATION_THRESHOLD);
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let cap = max_stage4(breaker, base_max_stage4);
    scored.truncate(cap);

    let any_early_gem_score = scored
        .iter()
        .any(|(_, c)| c.enhanced_score.is_some());
    if any_early_gem_score {
        scored.retain(|(_, c)| match c.enhanced_score {
            Some(s) => s >= EARLY_GEM_SCORE_GATE,
            None => true,
        });
    }

    scored
        .into_iter()
        .map(|(score, mut candidate)| {
            candidate.validation_score = Some(score);
            candidate.advance_stage(TriageStage::Stage3Validated);
            candidate
        })
        .collect()
}
