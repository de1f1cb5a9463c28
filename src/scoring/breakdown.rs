//! The scoring kernel's output shape (§4.7 "Scoring breakdown shape") and the
//! alert-facing conviction banding (§6 "Conviction level mapping").

use serde::{Deserialize, Serialize};

/// A single typed interaction record ("the why behind a score", §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub explanation: String,
    /// Signed percentage applied against the linear score; danger and
    /// contradiction entries are negative, amplification entries positive.
    pub impact_pct: f64,
    /// The individual signals this interaction fired on, e.g.
    /// `["high_vlr", "low_liquidity"]`.
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionAnalysis {
    pub danger: Vec<Interaction>,
    pub amplification: Vec<Interaction>,
    pub contradictions: Vec<Interaction>,
}

impl InteractionAnalysis {
    /// Net multiplier from every recorded interaction, applied to the linear
    /// score to produce `interaction_score_corrected` (§4.7).
    pub fn net_multiplier(&self) -> f64 {
        let mut total_pct = 0.0;
        for i in self.danger.iter().chain(self.contradictions.iter()) {
            total_pct += i.impact_pct;
        }
        for i in &self.amplification {
            total_pct += i.impact_pct;
        }
        (1.0 + total_pct / 100.0).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Severe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub confidence_level: crate::model::ConfidenceLevel,
}

/// Side-by-side of the naive linear sum versus the interaction-corrected
/// score, kept so the alert formatter can show its work (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreComparison {
    pub linear_score_flawed: f64,
    pub interaction_score_corrected: f64,
    pub mathematical_improvement: f64,
}

/// Full scoring breakdown (§4.7). `early_platform_analysis` caps at 50,
/// `momentum_analysis` at 38, `safety_validation` at 25,
/// `cross_platform_bonus` at 12 — those are the section maxima; callers clamp
/// their section contributions before assembling this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringBreakdown {
    pub early_platform_analysis: f64,
    pub momentum_analysis: f64,
    pub safety_validation: f64,
    pub cross_platform_bonus: f64,
    pub interaction_analysis: InteractionAnalysis,
    pub risk_assessment: RiskAssessment,
    pub score_comparison: ScoreComparison,
}

pub const EARLY_PLATFORM_ANALYSIS_MAX: f64 = 50.0;
pub const MOMENTUM_ANALYSIS_MAX: f64 = 38.0;
pub const SAFETY_VALIDATION_MAX: f64 = 25.0;
pub const CROSS_PLATFORM_BONUS_MAX: f64 = 12.0;

/// Alert-facing conviction band (§6). Distinct from the numeric
/// `high_conviction_threshold` config knob (§9 OQ2): this is presentation
/// only, never gates whether an alert fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvictionLevel {
    VeryHigh,
    High,
    Moderate,
    Low,
}

impl ConvictionLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            ConvictionLevel::VeryHigh
        } else if score >= 70.0 {
            ConvictionLevel::High
        } else if score >= 60.0 {
            ConvictionLevel::Moderate
        } else {
            ConvictionLevel::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conviction_bands_match_spec_cutoffs() {
        assert_eq!(ConvictionLevel::from_score(80.0), ConvictionLevel::VeryHigh);
        assert_eq!(ConvictionLevel::from_score(79.9), ConvictionLevel::High);
        assert_eq!(ConvictionLevel::from_score(70.0), ConvictionLevel::High);
        assert_eq!(ConvictionLevel::from_score(60.0), ConvictionLevel::Moderate);
        assert_eq!(ConvictionLevel::from_score(59.9), ConvictionLevel::Low);
    }

    #[test]
    fn net_multiplier_combines_danger_and_amplification() {
        let mut ia = InteractionAnalysis::default();
        ia.danger.push(Interaction {
            explanation: "high VLR + low liquidity = manipulation".into(),
            impact_pct: -85.0,
            factors: vec!["high_vlr".into(), "low_liquidity".into()],
        });
        ia.amplification.push(Interaction {
            explanation: "smart money + volume surge".into(),
            impact_pct: 15.0,
            factors: vec!["smart_money".into(), "volume_surge".into()],
        });
        assert!((ia.net_multiplier() - 0.30).abs() < 1e-9);
    }

    #[test]
    fn net_multiplier_never_goes_negative() {
        let mut ia = InteractionAnalysis::default();
        ia.danger.push(Interaction {
            explanation: "catastrophic".into(),
            impact_pct: -200.0,
            factors: vec![],
        });
        assert_eq!(ia.net_multiplier(), 0.0);
    }
}
