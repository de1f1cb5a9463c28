//! End-to-end scenarios exercised through the public
//! `Coordinator`/`DiscoveryOrchestrator` API rather than individual stage
//! functions, the same way `tests/integration_test.rs` exercises
//! `DecisionLedger` as a whole rather than its internal helpers.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use early_gem_detector::coordinator::apply_stage3_fallback;
use early_gem_detector::discovery::adapters::{
    BondingTokensAdapter, GraduatedTokensAdapter, StaticAdapter, TrendingFeedAdapter,
};
use early_gem_detector::discovery::{DiscoveryOrchestrator, SourceRegistration};
use early_gem_detector::enrich::BatchEnricher;
use early_gem_detector::error::SourceError;
use early_gem_detector::model::{Candidate, ErrorMarker, Source, Timeframe, TimeframeSeries};
use early_gem_detector::ports::{
    BondingFeedPort, BondingFeedRecord, Candle, GraduatedFeedPort, GraduatedFeedRecord,
    MetadataPort, MetadataRecord, OhlcvPort, TrendingFeedPort, TrendingFeedRecord,
};
use early_gem_detector::resilience::CostLedger;
use early_gem_detector::scoring;
use early_gem_detector::{Coordinator, DetectorConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct RichMetadataPort {
    record: MetadataRecord,
}

#[async_trait]
impl MetadataPort for RichMetadataPort {
    fn name(&self) -> &str {
        "rich-metadata"
    }
    fn cost_cu(&self, n: usize) -> f64 {
        5.0 + (n as f64).powf(0.8)
    }
    async fn fetch_metadata_batch(
        &self,
        addresses: &[String],
    ) -> Result<HashMap<String, Result<MetadataRecord, SourceError>>, SourceError> {
        Ok(addresses
            .iter()
            .map(|a| (a.clone(), Ok(self.record.clone())))
            .collect())
    }
    async fn fetch_metadata_single(&self, _address: &str) -> Result<MetadataRecord, SourceError> {
        Ok(self.record.clone())
    }
}

struct FlatOhlcvPort;

#[async_trait]
impl OhlcvPort for FlatOhlcvPort {
    async fn fetch_ohlcv(
        &self,
        _address: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        Ok((0..limit)
            .map(|i| Candle {
                open: 1.0,
                high: 1.1,
                low: 0.9,
                close: 1.0 + i as f64 * 0.02,
                volume: 8_000.0,
                timestamp: i as i64,
            })
            .collect())
    }
    async fn fetch_ohlcv_batch(
        &self,
        _addresses: &[String],
        _timeframes: &[Timeframe],
        _limit: usize,
    ) -> Result<HashMap<String, HashMap<Timeframe, Vec<Candle>>>, SourceError> {
        Ok(HashMap::new())
    }
}

/// Fails every other OHLCV call, landing Stage 4 coverage well under the
/// 80% success line (scenario c).
struct FlakyOhlcvPort;

#[async_trait]
impl OhlcvPort for FlakyOhlcvPort {
    async fn fetch_ohlcv(
        &self,
        address: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let ok = address.bytes().map(|b| b as u64).sum::<u64>() % 5 < 2; // ~40%
        if ok {
            FlatOhlcvPort.fetch_ohlcv(address, timeframe, limit).await
        } else {
            Err(SourceError::RateLimited("flaky-ohlcv".into()))
        }
    }
    async fn fetch_ohlcv_batch(
        &self,
        _addresses: &[String],
        _timeframes: &[Timeframe],
        _limit: usize,
    ) -> Result<HashMap<String, HashMap<Timeframe, Vec<Candle>>>, SourceError> {
        Ok(HashMap::new())
    }
}

fn coordinator_with(
    candidates: Vec<Candidate>,
    metadata: Arc<dyn MetadataPort>,
    ohlcv: Arc<dyn OhlcvPort>,
) -> Coordinator {
    let orchestrator = DiscoveryOrchestrator::new(vec![SourceRegistration::new(
        Arc::new(StaticAdapter::new("trending-feed", candidates)),
        Duration::from_secs(10),
    )]);
    let cost_ledger = Arc::new(Mutex::new(CostLedger::new()));
    let enricher = BatchEnricher::new(metadata, Some(ohlcv), cost_ledger.clone(), Duration::ZERO);
    Coordinator::new(DetectorConfig::default(), orchestrator, enricher, cost_ledger, None)
}

fn rich_record() -> MetadataRecord {
    MetadataRecord {
        holder_count: Some(900),
        security_score: Some(82.0),
        unique_traders_24h: Some(500),
        market_cap_usd: Some(220_000.0),
        liquidity_usd: Some(85_000.0),
        volume: TimeframeSeries {
            h24: Some(380_000.0),
            h1: Some(60_000.0),
            ..Default::default()
        },
        trades: TimeframeSeries {
            h24: Some(1800),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// (a) Fresh graduate fast path (§8).
#[tokio::test]
async fn fresh_graduate_clears_alert_threshold_with_high_conviction() {
    let now = Utc::now();
    let mut candidate = Candidate::new(
        "11111111111111111111111111111111111111111",
        Source::GraduatedFeed,
        now - ChronoDuration::minutes(18),
    );
    candidate.market_cap_usd = Some(220_000.0);
    candidate.liquidity_usd = Some(85_000.0);
    candidate.hours_since_graduation = Some(0.3);

    let coordinator = coordinator_with(
        vec![candidate],
        Arc::new(RichMetadataPort { record: rich_record() }),
        Arc::new(FlatOhlcvPort),
    );
    let report = coordinator.run_cycle().await;

    assert_eq!(report.finalists.len(), 1);
    let finalist = &report.finalists[0];
    assert!(finalist.candidate.final_score.unwrap() >= 60.0);
    assert!(matches!(
        finalist.conviction,
        scoring::ConvictionLevel::High | scoring::ConvictionLevel::VeryHigh
    ));
}

/// (b) Pre-graduation imminent bonding candidate (§8).
#[tokio::test]
async fn imminent_bonding_candidate_clears_threshold_despite_thin_liquidity() {
    let now = Utc::now();
    let mut candidate = Candidate::new(
        "22222222222222222222222222222222222222222",
        Source::BondingFeed,
        now - ChronoDuration::minutes(5),
    );
    candidate.market_cap_usd = Some(60_000.0);
    candidate.bonding_curve_progress_pct = Some(97.0);

    let mut record = rich_record();
    record.liquidity_usd = Some(15_000.0); // thin liquidity -> elevated risk
    record.market_cap_usd = Some(60_000.0);
    record.volume.h24 = Some(50_000.0); // keep VLR below the manipulation-danger cutoff
    record.volume.h1 = None;

    let coordinator = coordinator_with(
        vec![candidate],
        Arc::new(RichMetadataPort { record }),
        Arc::new(FlatOhlcvPort),
    );
    let report = coordinator.run_cycle().await;

    assert_eq!(report.finalists.len(), 1);
    let finalist = &report.finalists[0];
    assert!(
        finalist.candidate.final_score.unwrap()
            >= DetectorConfig::default()
                .analysis
                .scoring
                .early_gem_hunting
                .high_conviction_threshold
    );
}

/// (c) Rate-limited OHLCV batch (§8): partial coverage still yields
/// finalists, each annotated, and the breaker registers the failure.
#[tokio::test]
async fn flaky_ohlcv_batch_still_emits_annotated_finalists() {
    let now = Utc::now();
    let candidates: Vec<Candidate> = (0..10)
        .map(|i| {
            let mut c = Candidate::new(format!("addr-{i:0>3}"), Source::GraduatedFeed, now);
            c.market_cap_usd = Some(300_000.0);
            c.liquidity_usd = Some(120_000.0);
            c.hours_since_graduation = Some(2.0);
            c
        })
        .collect();

    let coordinator = coordinator_with(
        candidates,
        Arc::new(RichMetadataPort { record: rich_record() }),
        Arc::new(FlakyOhlcvPort),
    );
    let report = coordinator.run_cycle().await;

    assert!(!report.finalists.is_empty());
    assert!(report.breaker_state != early_gem_detector::resilience::BreakerState::Closed
        || report.finalists.iter().any(|f| f.candidate.error_marker.is_some()));
}

/// (d) Duplicate candidate across sources collapses to one, keeping the
/// first-seen source tag (§8).
#[tokio::test]
async fn duplicate_across_sources_collapses_to_first_seen() {
    struct OneTrendingRecord(TrendingFeedRecord);
    #[async_trait]
    impl TrendingFeedPort for OneTrendingRecord {
        async fn fetch_trending(&self) -> Result<Vec<TrendingFeedRecord>, SourceError> {
            Ok(vec![self.0.clone()])
        }
    }
    struct OneGraduatedRecord(GraduatedFeedRecord);
    #[async_trait]
    impl GraduatedFeedPort for OneGraduatedRecord {
        async fn fetch_graduated(&self) -> Result<Vec<GraduatedFeedRecord>, SourceError> {
            Ok(vec![self.0.clone()])
        }
    }

    let address = "33333333333333333333333333333333333333333".to_string();
    let trending = TrendingFeedAdapter::new(Arc::new(OneTrendingRecord(TrendingFeedRecord {
        address: address.clone(),
        ..Default::default()
    })));
    let graduated = GraduatedTokensAdapter::new(Arc::new(OneGraduatedRecord(GraduatedFeedRecord {
        address: address.clone(),
        hours_since_graduation: 2.0,
        ..Default::default()
    })));

    let orchestrator = DiscoveryOrchestrator::new(vec![
        SourceRegistration::new(Arc::new(trending), Duration::from_secs(5)),
        SourceRegistration::new(Arc::new(graduated), Duration::from_secs(5)),
    ]);
    let result = orchestrator.discover_all().await;

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].source, Source::TrendingFeed);
}

/// (e) Ultra-early candidate with a single populated timeframe (§8): one
/// lone datapoint does not qualify as meaningful momentum, so the age-aware
/// model lands on MEDIUM ("limited but normal") rather than EARLY_DETECTION,
/// with threshold_adjustment == 1.0 — neither a bonus nor a penalty.
#[tokio::test]
async fn ultra_early_single_datapoint_is_medium_confidence_not_early_detection() {
    let mut candidate = Candidate::new("addr", Source::TrendingFeed, Utc::now());
    candidate.volume.m5 = Some(1_000.0); // limited, unremarkable signal

    let confidence = scoring::confidence::assess(&candidate, 8.0);
    assert_eq!(confidence.level, early_gem_detector::model::ConfidenceLevel::Medium);
    assert!((confidence.threshold_adjustment - 1.0).abs() < 1e-9);
}

/// (f) Stage-3 wholesale failure fallback (§8): Stage 2's top 10 survive at
/// a 0.8x penalty, each tagged with a stage3 error.
#[tokio::test]
async fn stage3_wholesale_failure_falls_back_to_penalized_stage2_output() {
    let input: Vec<Candidate> = (0..20)
        .map(|i| {
            let mut c = Candidate::new(format!("addr-{i}"), Source::GraduatedFeed, Utc::now());
            c.enhanced_score = Some(i as f64);
            c
        })
        .collect();

    let output = apply_stage3_fallback(input, 10);

    assert_eq!(output.len(), 10);
    for candidate in &output {
        assert!(matches!(candidate.error_marker, Some(ErrorMarker::Stage3Error(_))));
        let enhanced = candidate.enhanced_score.unwrap();
        assert!((candidate.final_score.unwrap() - enhanced * 0.8).abs() < 1e-9);
    }
}

/// Empty-source boundary (§8): a cycle with nothing discovered completes
/// cleanly with no finalists and no panics.
#[tokio::test]
async fn empty_discovery_completes_cycle_with_no_finalists() {
    let coordinator = coordinator_with(
        vec![],
        Arc::new(RichMetadataPort { record: rich_record() }),
        Arc::new(FlatOhlcvPort),
    );
    let report = coordinator.run_cycle().await;
    assert!(report.finalists.is_empty());
    assert_eq!(report.stage_discovery.output_count, 0);
}

/// Single-candidate path (§8 "all stages run without the batch path"):
/// a lone candidate still clears the whole funnel end to end.
#[tokio::test]
async fn single_candidate_runs_through_every_stage() {
    let mut candidate = Candidate::new(
        "44444444444444444444444444444444444444444",
        Source::GraduatedFeed,
        Utc::now() - ChronoDuration::minutes(10),
    );
    candidate.market_cap_usd = Some(250_000.0);
    candidate.liquidity_usd = Some(90_000.0);
    candidate.hours_since_graduation = Some(0.1);

    let coordinator = coordinator_with(
        vec![candidate],
        Arc::new(RichMetadataPort { record: rich_record() }),
        Arc::new(FlatOhlcvPort),
    );
    let report = coordinator.run_cycle().await;

    assert_eq!(report.finalists.len(), 1);
    assert_eq!(
        report.finalists[0].candidate.triage_stage,
        early_gem_detector::model::TriageStage::Stage4Analyzed
    );
}

/// Bonding-tokens adapter's progress gate wired end to end (§4.1, §9 OQ1).
#[tokio::test]
async fn bonding_feed_adapter_gates_low_progress_candidates_out() {
    struct FixedBonding(Vec<BondingFeedRecord>);
    #[async_trait]
    impl BondingFeedPort for FixedBonding {
        async fn fetch_bonding(&self) -> Result<Vec<BondingFeedRecord>, SourceError> {
            Ok(self.0.clone())
        }
    }
    let adapter = BondingTokensAdapter::new(Arc::new(FixedBonding(vec![
        BondingFeedRecord {
            address: "a".into(),
            progress_pct: 72.0,
            ..Default::default()
        },
        BondingFeedRecord {
            address: "b".into(),
            progress_pct: 40.0,
            ..Default::default()
        },
    ])));
    let orchestrator = DiscoveryOrchestrator::new(vec![SourceRegistration::new(
        Arc::new(adapter),
        Duration::from_secs(5),
    )]);
    let result = orchestrator.discover_all().await;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].address, "a");
}
