//! Stage-1 Triage (C3, §4.3). Cheap, network-free pruning using only fields
//! already present from discovery.

use crate::model::{Candidate, Source, TriageStage};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

fn source_threshold(source: Source) -> f64 {
    match source {
        Source::GraduatedFeed => 25.0,
        Source::BondingFeed => 30.0,
        Source::TrendingFeed => 30.0,
        Source::CurveDetector | Source::LiveLaunch | Source::CachedCurve => 20.0,
    }
}

/// Default score kept by a candidate whose scoring raised an exception
/// (§4.3 "fail-safe: prefer false positives over false negatives").
pub const SCORING_EXCEPTION_DEFAULT_SCORE: f64 = 20.0;

pub const STAGE1_MAX_CANDIDATES: usize = 35;

fn graduated_points(candidate: &Candidate, age_minutes: f64) -> f64 {
    let mut points = 0.0;

    if age_minutes <= 60.0 {
        points += 40.0;
    } else if age_minutes <= 360.0 {
        points += 25.0;
    } else if age_minutes <= 720.0 {
        points += 15.0;
    }

    if let Some(mcap) = candidate.market_cap_usd {
        if (50_000.0..=2_000_000.0).contains(&mcap) {
            points += 20.0;
        } else if (10_000.0..50_000.0).contains(&mcap) {
            points += 15.0;
        } else if mcap > 2_000_000.0 {
            points += 5.0;
        }
    }

    if let Some(liq) = candidate.liquidity_usd {
        if liq >= 50_000.0 {
            points += 15.0;
        } else if liq >= 10_000.0 {
            points += 10.0;
        } else if liq >= 1_000.0 {
            points += 5.0;
        }
    }

    points
}

fn bonding_points(candidate: &Candidate) -> f64 {
    let mut points = 0.0;

    if let Some(progress) = candidate.bonding_curve_progress_pct {
        if progress >= 95.0 {
            points += 50.0;
        } else if progress >= 90.0 {
            points += 35.0;
        } else if progress >= 85.0 {
            points += 25.0;
        } else if progress >= 75.0 {
            points += 15.0;
        } else if progress >= 50.0 {
            points += 10.0;
        }
    }

    if let Some(mcap) = candidate.market_cap_usd {
        if (5_000.0..=500_000.0).contains(&mcap) {
            points += 15.0;
        } else if mcap > 0.0 && mcap < 5_000.0 {
            points += 10.0;
        }
    }

    points
}

fn universal_points(candidate: &Candidate, age_minutes: f64) -> f64 {
    let mut points = 0.0;

    if candidate.has_valid_address() {
        points += 5.0;
        if candidate
            .symbol
            .as_ref()
            .is_some_and(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            points += 3.0;
        }
    }

    if age_minutes <= 60.0 {
        points += 8.0;
    } else if age_minutes <= 360.0 {
        points += 5.0;
    } else if age_minutes <= 1440.0 {
        points += 2.0;
    }

    points
}

/// Scores a single candidate (§4.3 source-specific rubric). Never fails: a
/// candidate with no qualifying signals simply scores near zero plus
/// whatever the universal rubric contributes.
fn score_one(candidate: &Candidate, now: DateTime<Utc>) -> f64 {
    let age_minutes = candidate.age_minutes(now);

    let source_score = match candidate.source {
        Source::GraduatedFeed => graduated_points(candidate, age_minutes),
        Source::BondingFeed => bonding_points(candidate),
        Source::TrendingFeed => 30.0,
        Source::CurveDetector => 20.0,
        Source::LiveLaunch | Source::CachedCurve => 0.0,
    };

    source_score + universal_points(candidate, age_minutes)
}

/// Runs Stage 1 over a freshly-deduplicated discovery batch: scores every
/// candidate, drops those under their source's threshold, keeps the top
/// `STAGE1_MAX_CANDIDATES` by score (§4.3).
#[instrument(skip(candidates), fields(n = candidates.len()))]
pub fn triage(candidates: Vec<Candidate>, now: DateTime<Utc>) -> Vec<Candidate> {
    let mut scored: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|c| {
            let score = score_one(&c, now);
            (score, c)
        })
        .collect();

    scored.retain(|(score, candidate)| {
        let passes = *score >= source_threshold(candidate.source);
        if !passes {
            debug!(address = %candidate.address, score, "stage1: dropped below threshold");
        }
        passes
    });

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(STAGE1_MAX_CANDIDATES);

    scored
        .into_iter()
        .map(|(score, mut candidate)| {
            candidate.discovery_priority_score = Some(score);
            candidate.advance_stage(TriageStage::Stage1Triaged);
            candidate
        })
        .collect()
}
