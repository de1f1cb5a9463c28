//! Stage-4 OHLCV Final Analysis (C6, §4.6). Highest-fidelity scoring on the
//! 5-10 finalists Stage 3 hands over.

use crate::enrich::BatchEnricher;
use crate::model::{Candidate, ErrorMarker, Timeframe, TriageStage};
use crate::ports::Candle;
use crate::resilience::CircuitBreaker;
use crate::scoring;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{instrument, warn};

/// Timeframes Stage 4 fetches OHLCV for (§4.6): 15m and 30m.
pub const STAGE4_TIMEFRAMES: [Timeframe; 2] = [Timeframe::M15, Timeframe::M30];
pub const OHLCV_CANDLE_LIMIT: usize = 20;
/// Minimum fraction of requested (candidate, timeframe) pairs that must have
/// returned data for the breaker to treat the batch as a success (§4.6).
const COVERAGE_SUCCESS_THRESHOLD: f64 = 0.80;

fn mean_of_last_three_volumes(candles: &[Candle]) -> Option<f64> {
    if candles.is_empty() {
        return None;
    }
    let tail = &candles[candles.len().saturating_sub(3)..];
    Some(tail.iter().map(|c| c.volume).sum::<f64>() / tail.len() as f64)
}

fn last_to_previous_change_pct(candles: &[Candle]) -> Option<f64> {
    if candles.len() < 2 {
        return None;
    }
    let prev = candles[candles.len() - 2].close;
    let last = candles[candles.len() - 1].close;
    if prev == 0.0 {
        return None;
    }
    Some((last - prev) / prev * 100.0)
}

/// Coarse trade-count estimator, documented as an approximation per the
/// design doc (§4.6): `volume / (last_close * 100)`.
fn estimated_trades(candles: &[Candle]) -> Option<u64> {
    let last = candles.last()?;
    if last.close <= 0.0 {
        return None;
    }
    let volume = mean_of_last_three_volumes(candles)?;
    Some((volume / (last.close * 100.0)).round().max(0.0) as u64)
}

/// Merges one timeframe's candles' derived fields into the candidate
/// (§4.6 "Per-timeframe derivations").
fn apply_candles(candidate: &mut Candidate, timeframe: Timeframe, candles: &[Candle]) {
    if let Some(v) = mean_of_last_three_volumes(candles) {
        candidate.volume.set(timeframe, v);
    }
    if let Some(p) = last_to_previous_change_pct(candles) {
        candidate.price_change_pct.set(timeframe, p);
    }
    if let Some(t) = estimated_trades(candles) {
        candidate.trades.set(timeframe, t);
    }
}

/// Runs Stage 4 over Stage 3's finalists (§4.6). Skips processing entirely
/// when the breaker is OPEN (§4.8 effect iii), returning finalists
/// unchanged with their Stage-3 score carried forward as `final_score`.
#[instrument(skip(enricher, breaker, candidates), fields(n = candidates.len()))]
pub async fn analyze(
    enricher: &BatchEnricher,
    breaker: &Mutex<CircuitBreaker>,
    mut candidates: Vec<Candidate>,
) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }

    let concurrency = {
        let mut guard = breaker.lock().unwrap();
        if !guard.try_acquire() {
            warn!("circuit breaker open, skipping stage 4 OHLCV batch entirely");
            for candidate in &mut candidates {
                candidate.final_score = candidate.validation_score;
                candidate.error_marker = Some(ErrorMarker::Stage4Error(
                    "circuit breaker open".to_string(),
                ));
            }
            return candidates;
        }
        guard.ohlcv_concurrency()
    };

    let addresses: Vec<String> = candidates.iter().map(|c| c.address.clone()).collect();
    let ohlcv_result = enricher
        .enrich_ohlcv(&addresses, &STAGE4_TIMEFRAMES, OHLCV_CANDLE_LIMIT, concurrency)
        .await;

    let requested_pairs = addresses.len() * STAGE4_TIMEFRAMES.len();
    let returned_pairs: usize = ohlcv_result.values().map(|m| m.len()).sum();
    let coverage = if requested_pairs == 0 {
        0.0
    } else {
        returned_pairs as f64 / requested_pairs as f64
    };

    {
        let mut guard = breaker.lock().unwrap();
        if coverage >= COVERAGE_SUCCESS_THRESHOLD {
            guard.record_success();
        } else {
            guard.record_failure();
        }
    }

    score_finalists(&mut candidates, &ohlcv_result);
    candidates
}

fn score_finalists(
    candidates: &mut [Candidate],
    ohlcv: &HashMap<String, HashMap<Timeframe, Vec<Candle>>>,
) {
    let now = Utc::now();
    for candidate in candidates.iter_mut() {
        candidate.deep_analysis_phase = true;
        let per_tf = ohlcv.get(&candidate.address);

        if per_tf.map(|m| m.is_empty()).unwrap_or(true) {
            candidate.final_score = candidate.validation_score;
            candidate.error_marker = Some(ErrorMarker::Stage4Error(
                "no OHLCV data returned for candidate".to_string(),
            ));
            candidate.advance_stage(TriageStage::Stage4Analyzed);
            continue;
        }

        if let Some(per_tf) = per_tf {
            for (&timeframe, candles) in per_tf {
                apply_candles(candidate, timeframe, candles);
            }
        }

        let age_minutes = candidate.age_minutes(now);
        let (final_score, breakdown) = scoring::score(candidate, age_minutes);
        candidate.final_score = Some(final_score);
        candidate.velocity_confidence = Some(crate::scoring::confidence::assess(candidate, age_minutes));
        candidate.advance_stage(TriageStage::Stage4Analyzed);
        let _ = breakdown; // returned to caller via the coordinator's per-candidate map, not stored on Candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;
    use crate::ports::{Candle, MetadataRecord};
    use crate::resilience::CostLedger;
    use async_trait::async_trait;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc;
    use std::time::Duration;

    struct FakeMetadata;
    #[async_trait]
    impl crate::ports::MetadataPort for FakeMetadata {
        fn name(&self) -> &str {
            "fake"
        }
        fn cost_cu(&self, n: usize) -> f64 {
            5.0 + (n as f64).powf(0.8)
        }
        async fn fetch_metadata_batch(
            &self,
            _addresses: &[String],
        ) -> Result<StdHashMap<String, Result<MetadataRecord, crate::error::SourceError>>, crate::error::SourceError>
        {
            Ok(StdHashMap::new())
        }
        async fn fetch_metadata_single(
            &self,
            _address: &str,
        ) -> Result<MetadataRecord, crate::error::SourceError> {
            Err(crate::error::SourceError::Unavailable("fake".into(), "n/a".into()))
        }
    }

    struct FakeOhlcv {
        fail: bool,
    }
    #[async_trait]
    impl crate::ports::OhlcvPort for FakeOhlcv {
        async fn fetch_ohlcv(
            &self,
            _address: &str,
            _timeframe: Timeframe,
            _limit: usize,
        ) -> Result<Vec<Candle>, crate::error::SourceError> {
            if self.fail {
                return Err(crate::error::SourceError::RateLimited("fake-ohlcv".into()));
            }
            Ok(vec![
                Candle { open: 1.0, high: 1.2, low: 0.9, close: 1.1, volume: 1000.0, timestamp: 1 },
                Candle { open: 1.1, high: 1.3, low: 1.0, close: 1.25, volume: 1200.0, timestamp: 2 },
            ])
        }
        async fn fetch_ohlcv_batch(
            &self,
            _addresses: &[String],
            _timeframes: &[Timeframe],
            _limit: usize,
        ) -> Result<StdHashMap<String, StdHashMap<Timeframe, Vec<Candle>>>, crate::error::SourceError> {
            Ok(StdHashMap::new())
        }
    }

    fn enricher(fail: bool) -> BatchEnricher {
        BatchEnricher::new(
            Arc::new(FakeMetadata),
            Some(Arc::new(FakeOhlcv { fail })),
            Arc::new(std::sync::Mutex::new(CostLedger::new())),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn successful_batch_resets_breaker_and_scores_candidates() {
        let mut c = Candidate::new("addr", Source::GraduatedFeed, Utc::now());
        c.validation_score = Some(50.0);
        let breaker = Mutex::new(CircuitBreaker::new(3, Duration::from_secs(60)));
        let result = analyze(&enricher(false), &breaker, vec![c]).await;
        assert!(result[0].final_score.is_some());
        assert!(result[0].deep_analysis_phase);
        assert_eq!(breaker.lock().unwrap().failure_count(), 0);
    }

    #[tokio::test]
    async fn open_breaker_skips_batch_and_carries_validation_score() {
        let mut c = Candidate::new("addr", Source::GraduatedFeed, Utc::now());
        c.validation_score = Some(42.0);
        let mut cb = CircuitBreaker::new(1, Duration::from_secs(60));
        cb.record_failure();
        let breaker = Mutex::new(cb);
        let result = analyze(&enricher(false), &breaker, vec![c]).await;
        assert_eq!(result[0].final_score, Some(42.0));
        assert!(matches!(result[0].error_marker, Some(ErrorMarker::Stage4Error(_))));
    }

    #[tokio::test]
    async fn failing_ohlcv_port_falls_back_to_validation_score_per_candidate() {
        let mut c = Candidate::new("addr", Source::GraduatedFeed, Utc::now());
        c.validation_score = Some(37.0);
        let breaker = Mutex::new(CircuitBreaker::new(3, Duration::from_secs(60)));
        let result = analyze(&enricher(true), &breaker, vec![c]).await;
        assert_eq!(result[0].final_score, Some(37.0));
        assert!(matches!(result[0].error_marker, Some(ErrorMarker::Stage4Error(_))));
    }
}
