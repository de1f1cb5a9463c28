//! Stage-2 Enhanced Filter (C4, §4.4). Invokes the enricher in basic mode,
//! then layers enrichment-derived bonuses onto `discovery_priority_score`.

use crate::enrich::{BatchEnricher, EnrichMode};
use crate::model::{Candidate, Source, Timeframe, TriageStage};
use tracing::instrument;

fn volume_bonus(candidate: &Candidate) -> f64 {
    match candidate.volume.get(Timeframe::H24) {
        Some(v) if v > 500_000.0 => 15.0,
        Some(v) if v > 100_000.0 => 10.0,
        Some(v) if v > 10_000.0 => 5.0,
        _ => 0.0,
    }
}

fn trades_bonus(candidate: &Candidate) -> f64 {
    match candidate.trades.get(Timeframe::H24) {
        Some(t) if t > 1000 => 10.0,
        Some(t) if t > 200 => 5.0,
        _ => 0.0,
    }
}

fn holder_bonus(candidate: &Candidate) -> f64 {
    match candidate.holder_count {
        Some(h) if h > 500 => 10.0,
        Some(h) if h > 100 => 5.0,
        _ => 0.0,
    }
}

fn security_bonus(candidate: &Candidate) -> f64 {
    match candidate.security_score {
        Some(s) if s > 80.0 => 8.0,
        Some(s) if s > 50.0 => 4.0,
        _ => 0.0,
    }
}

/// `min(30, max(15, floor(0.4 * input_len)))` (§4.4).
pub fn dynamic_k(input_len: usize) -> usize {
    let k = (0.4 * input_len as f64).floor() as i64;
    k.clamp(15, 30) as usize
}

fn is_high_quality(candidate: &Candidate) -> bool {
    candidate.security_score.is_some_and(|s| s > 50.0) && candidate.holder_count.is_some_and(|h| h > 100)
}

fn threshold(candidate: &Candidate) -> f64 {
    match candidate.source {
        Source::BondingFeed if is_high_quality(candidate) => 45.0,
        Source::GraduatedFeed if is_high_quality(candidate) => 40.0,
        Source::TrendingFeed => 35.0,
        _ => 35.0,
    }
}

/// Runs Stage 2 over Stage 1's survivors (§4.4).
#[instrument(skip(enricher, candidates), fields(n = candidates.len()))]
pub async fn filter(enricher: &BatchEnricher, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    enricher.enrich_metadata(&mut candidates, EnrichMode::Basic).await;

    let mut scored: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|c| {
            let base = c.discovery_priority_score.unwrap_or(0.0);
            let bonus = volume_bonus(&c) + trades_bonus(&c) + holder_bonus(&c) + security_bonus(&c);
            (base + bonus, c)
        })
        .collect();

    let k = dynamic_k(scored.len());

    scored.retain(|(score, candidate)| *score >= threshold(candidate));
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(score, mut candidate)| {
            candidate.enhanced_score = Some(score);
            candidate.advance_stage(TriageStage::Stage2Filtered);
            candidate
        })
        .collect()
}
