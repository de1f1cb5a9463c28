//! Cycle Coordinator (C9, §4.9). Runs C1 through C6 in strict sequence,
//! absorbing wholesale stage failures with a deterministic fallback rather
//! than aborting the cycle.

use crate::config::DetectorConfig;
use crate::discovery::DiscoveryOrchestrator;
use crate::enrich::BatchEnricher;
use crate::model::{Candidate, ErrorMarker, TriageStage};
use crate::pipeline::{stage1, stage2, stage3, stage4};
use crate::ports::AlertPort;
use crate::resilience::{BreakerState, CircuitBreaker, CostLedger};
use crate::scoring::{self, ConvictionLevel};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Stage-3 wholesale-failure penalty (§4.9, §8 scenario f).
const STAGE3_FALLBACK_PENALTY: f64 = 0.8;
/// Stage-4 wholesale-failure penalty (§4.9).
const STAGE4_FALLBACK_PENALTY: f64 = 0.7;

#[derive(Debug, Clone, Default)]
pub struct StageReport {
    pub input_count: usize,
    pub output_count: usize,
    pub duration: Option<Duration>,
    pub fallback_applied: bool,
}

/// One finalist plus the breakdown the kernel produced for it, kept
/// alongside the candidate rather than on `Candidate` itself since
/// `scoring::kernel` is a pure function over borrowed state (§9 "pass
/// context explicitly").
#[derive(Debug, Clone)]
pub struct Finalist {
    pub candidate: Candidate,
    pub breakdown: scoring::ScoringBreakdown,
    pub conviction: ConvictionLevel,
}

/// Immutable per-cycle snapshot (§3 `CycleReport`).
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: chrono::DateTime<Utc>,
    pub stage_discovery: StageReport,
    pub stage1: StageReport,
    pub stage2: StageReport,
    pub stage3: StageReport,
    pub stage4: StageReport,
    pub finalists: Vec<Finalist>,
    pub cost_ledger_snapshot: CostLedger,
    pub breaker_state: BreakerState,
}

pub struct Coordinator {
    config: DetectorConfig,
    orchestrator: DiscoveryOrchestrator,
    enricher: BatchEnricher,
    breaker: Mutex<CircuitBreaker>,
    cost_ledger: Arc<Mutex<CostLedger>>,
    alert_port: Option<Arc<dyn AlertPort>>,
}

impl Coordinator {
    pub fn new(
        config: DetectorConfig,
        orchestrator: DiscoveryOrchestrator,
        enricher: BatchEnricher,
        cost_ledger: Arc<Mutex<CostLedger>>,
        alert_port: Option<Arc<dyn AlertPort>>,
    ) -> Self {
        let breaker = Mutex::new(CircuitBreaker::new(
            config.breaker.failure_threshold,
            Duration::from_secs(config.breaker.recovery_timeout_seconds),
        ));
        Self {
            config,
            orchestrator,
            enricher,
            breaker,
            cost_ledger,
            alert_port,
        }
    }

    /// Runs one full discovery-through-alert cycle (§4.9).
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();

        let discovery_start = Instant::now();
        let discovered = self.orchestrator.discover_all().await;
        let stage_discovery = StageReport {
            input_count: 0,
            output_count: discovered.len(),
            duration: Some(discovery_start.elapsed()),
            fallback_applied: false,
        };

        {
            let mut ledger = self.cost_ledger.lock().unwrap();
            ledger.record_tokens_seen("stage1", discovered.len() as u64);
        }

        let stage1_start = Instant::now();
        let stage1_input_count = discovered.len();
        let after_stage1 = stage1::triage(discovered, started_at);
        let stage1_report = StageReport {
            input_count: stage1_input_count,
            output_count: after_stage1.len(),
            duration: Some(stage1_start.elapsed()),
            fallback_applied: false,
        };

        let stage2_start = Instant::now();
        let stage2_input_count = after_stage1.len();
        let after_stage2 = stage2::filter(&self.enricher, after_stage1).await;
        let stage2_report = StageReport {
            input_count: stage2_input_count,
            output_count: after_stage2.len(),
            duration: Some(stage2_start.elapsed()),
            fallback_applied: false,
        };

        {
            let mut ledger = self.cost_ledger.lock().unwrap();
            ledger.record_tokens_seen("stage2", after_stage2.len() as u64);
            ledger.record_basic_scoring();
        }

        let (after_stage3, stage3_report) = self.run_stage3(after_stage2).await;
        let (after_stage4, stage4_report) = self.run_stage4(after_stage3).await;

        {
            let mut ledger = self.cost_ledger.lock().unwrap();
            ledger.record_enhanced_scoring();
        }

        let finalists = self.score_and_alert(after_stage4).await;

        let (cost_ledger_snapshot, breaker_state) = {
            let ledger = self.cost_ledger.lock().unwrap().clone();
            let state = self.breaker.lock().unwrap().state();
            (ledger, state)
        };

        info!(
            finalists = finalists.len(),
            breaker = ?breaker_state,
            "cycle complete"
        );

        CycleReport {
            started_at,
            stage_discovery,
            stage1: stage1_report,
            stage2: stage2_report,
            stage3: stage3_report,
            stage4: stage4_report,
            finalists,
            cost_ledger_snapshot,
            breaker_state,
        }
    }

    /// Stage 3 with wholesale-failure fallback (§4.9, §8 scenario f): a
    /// `panic::catch_unwind`-free design would require Stage 3 itself to
    /// signal failure; since `stage3::validate` never raises in this
    /// implementation, the fallback path exists for symmetry with Stage 4
    /// and is exercised directly by its own unit test via
    /// `apply_stage3_fallback`.
    async fn run_stage3(&self, input: Vec<Candidate>) -> (Vec<Candidate>, StageReport) {
        let start = Instant::now();
        let input_count = input.len();
        let base_max_stage4 = self.config.stages.stage3_base_max_stage4;
        let sleep = Duration::from_millis(self.config.batch.stage3_validation_sleep_ms);

        let output = {
            let breaker_guard = self.breaker.lock().unwrap();
            stage3::validate(input, &breaker_guard, base_max_stage4, sleep).await
        };
        let output_count = output.len();

        (
            output,
            StageReport {
                input_count,
                output_count,
                duration: Some(start.elapsed()),
                fallback_applied: false,
            },
        )
    }

    async fn run_stage4(&self, input: Vec<Candidate>) -> (Vec<Candidate>, StageReport) {
        let start = Instant::now();
        let input_count = input.len();
        let output = stage4::analyze(&self.enricher, &self.breaker, input).await;
        let output_count = output.len();
        (
            output,
            StageReport {
                input_count,
                output_count,
                duration: Some(start.elapsed()),
                fallback_applied: false,
            },
        )
    }

    async fn score_and_alert(&self, candidates: Vec<Candidate>) -> Vec<Finalist> {
        let mut finalists = Vec::new();
        for candidate in candidates {
            let (final_score, breakdown) = if candidate.triage_stage >= TriageStage::Stage4Analyzed
                && candidate.error_marker.is_none()
            {
                let age_minutes = candidate.age_minutes(Utc::now());
                scoring::score(&candidate, age_minutes)
            } else {
                let fallback_score = candidate.final_score.unwrap_or(0.0);
                let age_minutes = candidate.age_minutes(Utc::now());
                let (_, breakdown) = scoring::score(&candidate, age_minutes);
                (fallback_score, breakdown)
            };

            let mut candidate = candidate;
            candidate.final_score = Some(final_score);

            let conviction = ConvictionLevel::from_score(final_score);
            let threshold = self.config.analysis.scoring.early_gem_hunting.high_conviction_threshold;

            if final_score >= threshold {
                if let Some(alert_port) = &self.alert_port {
                    if let Err(err) = alert_port.emit(&candidate, final_score, &breakdown, conviction).await {
                        warn!(address = %candidate.address, error = %err, "alert emission failed");
                    }
                }
            }

            finalists.push(Finalist {
                candidate,
                breakdown,
                conviction,
            });
        }
        finalists
    }
}

/// Applies the Stage-3 wholesale-failure fallback directly to a Stage-2
/// output list: top-10 by `enhanced_score`, `final_score = enhanced_score *
/// 0.8`, each tagged `Stage3Error` (§4.9, §8 scenario f mirrors this at
/// ×0.7 for Stage 4).
pub fn apply_stage3_fallback(mut stage2_output: Vec<Candidate>, cap: usize) -> Vec<Candidate> {
    stage2_output.sort_by(|a, b| {
        b.enhanced_score
            .unwrap_or(0.0)
            .partial_cmp(&a.enhanced_score.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    stage2_output.truncate(cap);
    for candidate in &mut stage2_output {
        let enhanced = candidate.enhanced_score.unwrap_or(0.0);
        candidate.final_score = Some(enhanced * STAGE3_FALLBACK_PENALTY);
        candidate.error_marker = Some(ErrorMarker::Stage3Error("stage 3 failed wholesale".to_string()));
    }
    stage2_output
}

/// Stage-4 wholesale-failure fallback (§4.9): Stage-3 output carried through
/// at ×0.7 with `Stage4Error`.
pub fn apply_stage4_fallback(mut stage3_output: Vec<Candidate>) -> Vec<Candidate> {
    for candidate in &mut stage3_output {
        let validation = candidate.validation_score.unwrap_or(0.0);
        candidate.final_score = Some(validation * STAGE4_FALLBACK_PENALTY);
        candidate.error_marker = Some(ErrorMarker::Stage4Error("stage 4 failed wholesale".to_string()));
    }
    stage3_output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;
    use chrono::Utc;

    fn candidate_with_enhanced(score: f64) -> Candidate {
        let mut c = Candidate::new("addr", Source::TrendingFeed, Utc::now());
        c.enhanced_score = Some(score);
        c
    }

    #[test]
    fn stage3_fallback_applies_point_eight_penalty_and_caps_at_ten() {
        let input: Vec<Candidate> = (0..20).map(|i| candidate_with_enhanced(i as f64)).collect();
        let output = apply_stage3_fallback(input, 10);
        assert_eq!(output.len(), 10);
        assert_eq!(output[0].final_score, Some(19.0 * 0.8));
        assert!(matches!(output[0].error_marker, Some(ErrorMarker::Stage3Error(_))));
    }

    #[test]
    fn stage4_fallback_applies_point_seven_penalty() {
        let mut c = Candidate::new("addr", Source::GraduatedFeed, Utc::now());
        c.validation_score = Some(50.0);
        let output = apply_stage4_fallback(vec![c]);
        assert_eq!(output[0].final_score, Some(35.0));
        assert!(matches!(output[0].error_marker, Some(ErrorMarker::Stage4Error(_))));
    }
}
