//! Batch Enricher (C2, §4.2). True-batch-first metadata merge, plus
//! OHLCV batching under a circuit-breaker-sized semaphore.

use crate::model::{Candidate, Timeframe};
use crate::ports::{Candle, MetadataPort, OhlcvPort};
use crate::resilience::CostLedger;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use moka::future::Cache;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichMode {
    Basic,
    Comprehensive,
}

/// Individual-call fallback retries a failed address this many times before
/// giving up on it (§4.2 "per-token fallback").
const METADATA_RETRY_ATTEMPTS: usize = 2;

/// The individual-call fallback is a last resort, so it is throttled below
/// the true-batch call's own rate to avoid hammering the vendor once the
/// batch path has already failed (§4.2).
const METADATA_FALLBACK_REQUESTS_PER_SEC: u32 = 10;

/// OHLCV candles rarely change within a single discovery cycle; caching them
/// turns a repeated Stage-4 look at the same address/timeframe pair across
/// cycles into the "legacy-batch" middle rung of the downgrade chain (§4.2)
/// rather than a fresh vendor call.
const OHLCV_CACHE_MAX_ENTRIES: u64 = 4_000;
const OHLCV_CACHE_TTL: Duration = Duration::from_secs(90);

pub struct BatchEnricher {
    metadata: Arc<dyn MetadataPort>,
    ohlcv: Option<Arc<dyn OhlcvPort>>,
    cost_ledger: Arc<Mutex<CostLedger>>,
    ohlcv_pre_sleep: Duration,
    metadata_fallback_limiter: DefaultDirectRateLimiter,
    ohlcv_cache: Cache<(String, Timeframe), Vec<Candle>>,
}

impl BatchEnricher {
    pub fn new(
        metadata: Arc<dyn MetadataPort>,
        ohlcv: Option<Arc<dyn OhlcvPort>>,
        cost_ledger: Arc<Mutex<CostLedger>>,
        ohlcv_pre_sleep: Duration,
    ) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(METADATA_FALLBACK_REQUESTS_PER_SEC)
                .expect("rate constant is nonzero"),
        );
        Self {
            metadata,
            ohlcv,
            cost_ledger,
            ohlcv_pre_sleep,
            metadata_fallback_limiter: RateLimiter::direct(quota),
            ohlcv_cache: Cache::builder()
                .max_capacity(OHLCV_CACHE_MAX_ENTRIES)
                .time_to_live(OHLCV_CACHE_TTL)
                .build(),
        }
    }

    /// Enriches every candidate in place with metadata fields (§4.2). OHLCV
    /// is never touched here, even in `Comprehensive` mode — that is Stage
    /// 4's exclusive job (§4.2 "OHLCV is forbidden outside of Stage 4").
    #[instrument(skip(self, candidates), fields(n = candidates.len()))]
    pub async fn enrich_metadata(&self, candidates: &mut [Candidate], _mode: EnrichMode) {
        let addresses: Vec<String> = candidates
            .iter()
            .filter(|c| !c.enriched)
            .map(|c| c.address.clone())
            .collect();
        if addresses.is_empty() {
            return;
        }

        let cu = self.metadata.cost_cu(addresses.len());
        {
            let mut ledger = self.cost_ledger.lock().unwrap();
            ledger.record_metadata_cu(cu);
        }

        let merged = match self.metadata.fetch_metadata_batch(&addresses).await {
            Ok(batch) => batch,
            Err(err) => {
                warn!(error = %err, "true-batch metadata call failed wholesale, downgrading to individual calls");
                self.fetch_individually(&addresses).await
            }
        };

        for candidate in candidates.iter_mut() {
            if candidate.enriched {
                continue;
            }
            match merged.get(&candidate.address) {
                Some(Ok(record)) => {
                    apply_metadata(candidate, record);
                    candidate.enriched = true;
                    candidate.recompute_derived_metrics();
                }
                Some(Err(err)) => {
                    debug!(address = %candidate.address, error = %err, "metadata fetch failed for this address, leaving candidate unchanged");
                }
                None => {
                    debug!(address = %candidate.address, "address missing from batch response");
                }
            }
        }
    }

    /// Fallback path: per-token individual calls, logged at the call site
    /// as the downgrade step (§4.2 "Each downgrade is logged").
    async fn fetch_individually(
        &self,
        addresses: &[String],
    ) -> HashMap<String, Result<crate::ports::MetadataRecord, crate::error::SourceError>> {
        let mut out = HashMap::with_capacity(addresses.len());
        for address in addresses {
            while self.metadata_fallback_limiter.check().is_err() {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            let retry_strategy = ExponentialBackoff::from_millis(50)
                .max_delay(Duration::from_millis(500))
                .take(METADATA_RETRY_ATTEMPTS);
            let result = Retry::spawn(retry_strategy, || self.metadata.fetch_metadata_single(address)).await;
            out.insert(address.clone(), result);
        }
        out
    }

    /// Stage 4's OHLCV batch (§4.6): M tokens × T timeframes, adaptive
    /// concurrency. `concurrency` is supplied by the caller from
    /// `CircuitBreaker::ohlcv_concurrency`.
    #[instrument(skip(self, addresses), fields(n = addresses.len(), concurrency))]
    pub async fn enrich_ohlcv(
        &self,
        addresses: &[String],
        timeframes: &[Timeframe],
        limit: usize,
        concurrency: usize,
    ) -> HashMap<String, HashMap<Timeframe, Vec<Candle>>> {
        let Some(ohlcv) = &self.ohlcv else {
            warn!("no OHLCV port configured, returning empty result");
            return HashMap::new();
        };

        let mut out: HashMap<String, HashMap<Timeframe, Vec<Candle>>> = HashMap::new();
        let mut pending: Vec<(String, Timeframe)> = Vec::with_capacity(addresses.len() * timeframes.len());
        let mut cache_hits = 0u64;

        for address in addresses {
            for &timeframe in timeframes {
                match self.ohlcv_cache.get(&(address.clone(), timeframe)).await {
                    Some(candles) => {
                        cache_hits += 1;
                        out.entry(address.clone()).or_default().insert(timeframe, candles);
                    }
                    None => pending.push((address.clone(), timeframe)),
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = Vec::with_capacity(pending.len());

        for (address, timeframe) in pending {
            let semaphore = Arc::clone(&semaphore);
            let ohlcv = Arc::clone(ohlcv);
            let pre_sleep = self.ohlcv_pre_sleep;
            tasks.push(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                tokio::time::sleep(pre_sleep).await;
                let candles = ohlcv.fetch_ohlcv(&address, timeframe, limit).await;
                (address, timeframe, candles)
            });
        }

        let results = futures::future::join_all(tasks).await;

        let mut calls_made = 0u64;
        for (address, timeframe, result) in results {
            calls_made += 1;
            match result {
                Ok(candles) => {
                    self.ohlcv_cache
                        .insert((address.clone(), timeframe), candles.clone())
                        .await;
                    out.entry(address).or_default().insert(timeframe, candles);
                }
                Err(err) => {
                    debug!(%address, ?timeframe, error = %err, "OHLCV fetch failed for this pair");
                }
            }
        }

        {
            let mut ledger = self.cost_ledger.lock().unwrap();
            for _ in 0..calls_made {
                ledger.record_ohlcv_individual();
            }
            if cache_hits > 0 {
                ledger.record_ohlcv_batch(cache_hits + 1);
            }
        }

        debug!(cache_hits, calls_made, "OHLCV fetch completed");
        out
    }
}

fn apply_metadata(candidate: &mut Candidate, record: &crate::ports::MetadataRecord) {
    if candidate.symbol.is_none() {
        candidate.symbol = record.symbol.clone();
    }
    if candidate.name.is_none() {
        candidate.name = record.name.clone();
    }
    candidate.price_usd = record.price_usd.or(candidate.price_usd);
    candidate.market_cap_usd = record.market_cap_usd.or(candidate.market_cap_usd);
    candidate.liquidity_usd = record.liquidity_usd.or(candidate.liquidity_usd);
    candidate.unique_traders_24h = record.unique_traders_24h.or(candidate.unique_traders_24h);
    candidate.holder_count = record.holder_count.or(candidate.holder_count);
    candidate.security_score = record.security_score.or(candidate.security_score);

    for tf in Timeframe::ALL {
        if let Some(v) = record.volume.get(tf) {
            candidate.volume.set(tf, v);
        }
        if let Some(v) = record.trades.get(tf) {
            candidate.trades.set(tf, v);
        }
        if let Some(v) = record.price_change_pct.get(tf) {
            candidate.price_change_pct.set(tf, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::model::{Source, TimeframeSeries};
    use crate::ports::MetadataRecord;
    use async_trait::async_trait;
    use chrono::Utc;

    struct FakeMetadataPort {
        records: HashMap<String, MetadataRecord>,
        fail_batch: bool,
    }

    #[async_trait]
    impl MetadataPort for FakeMetadataPort {
        fn name(&self) -> &str {
            "fake-metadata"
        }

        fn cost_cu(&self, n: usize) -> f64 {
            5.0 + (n as f64).powf(0.8)
        }

        async fn fetch_metadata_batch(
            &self,
            addresses: &[String],
        ) -> Result<HashMap<String, Result<MetadataRecord, SourceError>>, SourceError> {
            if self.fail_batch {
                return Err(SourceError::Unavailable("fake-metadata".into(), "down".into()));
            }
            let mut out = HashMap::new();
            for address in addresses {
                if let Some(record) = self.records.get(address) {
                    out.insert(address.clone(), Ok(record.clone()));
                }
            }
            Ok(out)
        }

        async fn fetch_metadata_single(
            &self,
            address: &str,
        ) -> Result<MetadataRecord, SourceError> {
            self.records
                .get(address)
                .cloned()
                .ok_or_else(|| SourceError::Unavailable("fake-metadata".into(), "not found".into()))
        }
    }

    fn sample_record() -> MetadataRecord {
        MetadataRecord {
            symbol: Some("GEM".into()),
            name: Some("Gem Token".into()),
            price_usd: Some(0.01),
            market_cap_usd: Some(100_000.0),
            liquidity_usd: Some(50_000.0),
            volume: TimeframeSeries {
                h24: Some(300_000.0),
                ..Default::default()
            },
            trades: TimeframeSeries {
                h24: Some(1200),
                ..Default::default()
            },
            price_change_pct: TimeframeSeries::default(),
            unique_traders_24h: Some(400),
            holder_count: Some(900),
            security_score: Some(80.0),
        }
    }

    #[tokio::test]
    async fn true_batch_merges_metadata_and_marks_enriched() {
        let mut records = HashMap::new();
        records.insert("addr".to_string(), sample_record());
        let metadata = Arc::new(FakeMetadataPort {
            records,
            fail_batch: false,
        });
        let enricher = BatchEnricher::new(
            metadata,
            None,
            Arc::new(Mutex::new(CostLedger::new())),
            Duration::from_millis(0),
        );
        let mut candidates = vec![Candidate::new("addr", Source::TrendingFeed, Utc::now())];
        enricher.enrich_metadata(&mut candidates, EnrichMode::Basic).await;
        assert!(candidates[0].enriched);
        assert_eq!(candidates[0].symbol.as_deref(), Some("GEM"));
        assert_eq!(candidates[0].avg_trade_size, Some(250.0));
    }

    #[tokio::test]
    async fn failed_batch_downgrades_to_individual_calls() {
        let mut records = HashMap::new();
        records.insert("addr".to_string(), sample_record());
        let metadata = Arc::new(FakeMetadataPort {
            records,
            fail_batch: true,
        });
        let enricher = BatchEnricher::new(
            metadata,
            None,
            Arc::new(Mutex::new(CostLedger::new())),
            Duration::from_millis(0),
        );
        let mut candidates = vec![Candidate::new("addr", Source::TrendingFeed, Utc::now())];
        enricher.enrich_metadata(&mut candidates, EnrichMode::Basic).await;
        assert!(candidates[0].enriched);
    }

    #[tokio::test]
    async fn already_enriched_candidates_are_skipped() {
        let metadata = Arc::new(FakeMetadataPort {
            records: HashMap::new(),
            fail_batch: false,
        });
        let enricher = BatchEnricher::new(
            metadata,
            None,
            Arc::new(Mutex::new(CostLedger::new())),
            Duration::from_millis(0),
        );
        let mut c = Candidate::new("addr", Source::TrendingFeed, Utc::now());
        c.enriched = true;
        c.symbol = Some("PRE".into());
        let mut candidates = vec![c];
        enricher.enrich_metadata(&mut candidates, EnrichMode::Basic).await;
        assert_eq!(candidates[0].symbol.as_deref(), Some("PRE"));
    }

    struct CountingOhlcvPort {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl OhlcvPort for CountingOhlcvPort {
        async fn fetch_ohlcv(
            &self,
            _address: &str,
            _timeframe: Timeframe,
            limit: usize,
        ) -> Result<Vec<Candle>, SourceError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok((0..limit)
                .map(|i| Candle {
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1.0,
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
            unimplemented!("not exercised by these tests")
        }
    }

    #[tokio::test]
    async fn repeated_ohlcv_request_is_served_from_cache() {
        let ohlcv = Arc::new(CountingOhlcvPort {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let metadata = Arc::new(FakeMetadataPort {
            records: HashMap::new(),
            fail_batch: false,
        });
        let enricher = BatchEnricher::new(
            metadata,
            Some(ohlcv.clone()),
            Arc::new(Mutex::new(CostLedger::new())),
            Duration::from_millis(0),
        );
        let addresses = vec!["addr".to_string()];
        let timeframes = [Timeframe::M15];

        enricher.enrich_ohlcv(&addresses, &timeframes, 5, 4).await;
        enricher.enrich_ohlcv(&addresses, &timeframes, 5, 4).await;

        assert_eq!(ohlcv.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
