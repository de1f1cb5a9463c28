//! Interaction analysis: the non-linear corrections layered on top of the
//! linear section sum (§4.7 "Interaction analysis"). Each rule is evaluated
//! independently against the candidate's current fields; nothing here
//! depends on evaluation order.

use crate::scoring::breakdown::{Interaction, InteractionAnalysis};
use crate::model::{Candidate, Timeframe};

fn volume_to_liquidity_ratio(candidate: &Candidate) -> Option<f64> {
    let volume = candidate.volume.get(Timeframe::H24)?;
    let liquidity = candidate.liquidity_usd?;
    if liquidity <= 0.0 {
        return None;
    }
    Some(volume / liquidity)
}

/// Builds the three interaction lists for one candidate (§4.7). Named
/// examples from the design doc are implemented as concrete rules below;
/// additional rules can be appended without touching callers.
pub fn analyze(candidate: &Candidate) -> InteractionAnalysis {
    let mut result = InteractionAnalysis::default();

    if let Some(vlr) = volume_to_liquidity_ratio(candidate) {
        if vlr > 5.0 && candidate.liquidity_usd.is_some_and(|l| l < 20_000.0) {
            result.danger.push(Interaction {
                explanation: "high VLR + low liquidity = manipulation".into(),
                impact_pct: -85.0,
                factors: vec!["high_vlr".into(), "low_liquidity".into()],
            });
        }
    }

    if candidate.holder_count.is_some_and(|h| h < 50)
        && candidate.security_score.is_some_and(|s| s < 40.0)
    {
        result.danger.push(Interaction {
            explanation: "whale dominance + poor security".into(),
            impact_pct: -12.0,
            factors: vec!["whale_dominance".into(), "poor_security".into()],
        });
    }

    let strong_volume = candidate.volume.get(Timeframe::H1).is_some_and(|v| v > 50_000.0);
    let many_traders = candidate.unique_traders_24h.is_some_and(|u| u > 100);
    if strong_volume && many_traders {
        result.amplification.push(Interaction {
            explanation: "smart money + volume surge".into(),
            impact_pct: 15.0,
            factors: vec!["smart_money".into(), "volume_surge".into()],
        });
    }

    let multi_platform = matches!(
        candidate.source,
        crate::model::Source::TrendingFeed | crate::model::Source::GraduatedFeed
    );
    if multi_platform && candidate.security_score.is_some_and(|s| s >= 70.0) {
        result.amplification.push(Interaction {
            explanation: "multi-platform + security".into(),
            impact_pct: 13.0,
            factors: vec!["multi_platform".into(), "security".into()],
        });
    }

    let high_volume = candidate.volume.get(Timeframe::H24).is_some_and(|v| v > 200_000.0);
    let limited_platforms = matches!(candidate.source, crate::model::Source::BondingFeed);
    if high_volume && limited_platforms {
        result.contradictions.push(Interaction {
            explanation: "high volume vs limited platforms".into(),
            impact_pct: -5.0,
            factors: vec!["high_volume".into(), "limited_platforms".into()],
        });
    }

    result
}
