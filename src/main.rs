//! Demo entry point: wires a single cycle of the progressive analysis
//! engine against in-memory source adapters and a fixed metadata/OHLCV
//! double, then prints the resulting `CycleReport`.
//!
//! A real deployment injects HTTP/RPC-backed implementations of the ports
//! in `early_gem_detector::ports`. The YAML config loader, the Telegram
//! alert formatter, and the per-source HTTP clients stay external
//! collaborators; this binary is the thinnest possible stand-in for all
//! three, not a production launcher.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use early_gem_detector::ports::{Candle, MetadataPort, MetadataRecord, OhlcvPort};
use early_gem_detector::{
    discovery::{adapters::StaticAdapter, DiscoveryOrchestrator, SourceRegistration},
    enrich::BatchEnricher,
    error::SourceError,
    model::{Candidate, Source, Timeframe},
    resilience::CostLedger,
    Coordinator, DetectorConfig,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, Level};

/// A metadata double that returns canned fields for any address it is asked
/// about, standing in for a real batch vendor (Birdeye/Moralis/DexScreener).
struct DemoMetadataPort;

#[async_trait]
impl MetadataPort for DemoMetadataPort {
    fn name(&self) -> &str {
        "demo-metadata"
    }

    fn cost_cu(&self, n: usize) -> f64 {
        5.0 + (n as f64).powf(0.8)
    }

    async fn fetch_metadata_batch(
        &self,
        addresses: &[String],
    ) -> Result<HashMap<String, Result<MetadataRecord, SourceError>>, SourceError> {
        let mut out = HashMap::with_capacity(addresses.len());
        for address in addresses {
            out.insert(
                address.clone(),
                Ok(MetadataRecord {
                    holder_count: Some(650),
                    security_score: Some(78.0),
                    unique_traders_24h: Some(420),
                    market_cap_usd: Some(220_000.0),
                    liquidity_usd: Some(85_000.0),
                    volume: early_gem_detector::model::TimeframeSeries {
                        h24: Some(380_000.0),
                        ..Default::default()
                    },
                    trades: early_gem_detector::model::TimeframeSeries {
                        h24: Some(1800),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
            );
        }
        Ok(out)
    }

    async fn fetch_metadata_single(&self, _address: &str) -> Result<MetadataRecord, SourceError> {
        Ok(MetadataRecord::default())
    }
}

/// An OHLCV double returning a flat, mildly-upward candle series for every
/// address/timeframe pair it is asked about.
struct DemoOhlcvPort;

#[async_trait]
impl OhlcvPort for DemoOhlcvPort {
    async fn fetch_ohlcv(
        &self,
        _address: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        Ok((0..limit)
            .map(|i| {
                let close = 1.0 + i as f64 * 0.01;
                Candle {
                    open: close - 0.01,
                    high: close + 0.01,
                    low: close - 0.02,
                    close,
                    volume: 5_000.0 + i as f64 * 50.0,
                    timestamp: i as i64,
                }
            })
            .collect())
    }

    async fn fetch_ohlcv_batch(
        &self,
        addresses: &[String],
        timeframes: &[Timeframe],
        limit: usize,
    ) -> Result<HashMap<String, HashMap<Timeframe, Vec<Candle>>>, SourceError> {
        let mut out = HashMap::new();
        for address in addresses {
            let mut per_tf = HashMap::new();
            for &tf in timeframes {
                per_tf.insert(tf, self.fetch_ohlcv(address, tf, limit).await?);
            }
            out.insert(address.clone(), per_tf);
        }
        Ok(out)
    }
}

fn demo_candidates() -> Vec<Candidate> {
    let now = Utc::now();
    let mut fresh_graduate = Candidate::new(
        "11111111111111111111111111111111111111111",
        Source::GraduatedFeed,
        now - ChronoDuration::minutes(18),
    );
    fresh_graduate.market_cap_usd = Some(220_000.0);
    fresh_graduate.liquidity_usd = Some(85_000.0);
    fresh_graduate.hours_since_graduation = Some(0.3);

    let mut imminent_bonding = Candidate::new(
        "22222222222222222222222222222222222222222",
        Source::BondingFeed,
        now - ChronoDuration::minutes(5),
    );
    imminent_bonding.market_cap_usd = Some(60_000.0);
    imminent_bonding.bonding_curve_progress_pct = Some(97.0);

    vec![fresh_graduate, imminent_bonding]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("starting early-gem detector demo cycle");

    let orchestrator = DiscoveryOrchestrator::new(vec![SourceRegistration::new(
        Arc::new(StaticAdapter::new("trending-feed", demo_candidates())),
        Duration::from_secs(30),
    )]);

    let cost_ledger = Arc::new(Mutex::new(CostLedger::new()));
    let enricher = BatchEnricher::new(
        Arc::new(DemoMetadataPort),
        Some(Arc::new(DemoOhlcvPort)),
        Arc::clone(&cost_ledger),
        Duration::from_millis(0),
    );

    let coordinator = Coordinator::new(
        DetectorConfig::default(),
        orchestrator,
        enricher,
        cost_ledger,
        None,
    );

    let report = coordinator.run_cycle().await;

    info!(
        finalists = report.finalists.len(),
        cost_savings_pct = report.cost_ledger_snapshot.cost_savings_percentage(),
        breaker_state = ?report.breaker_state,
        "cycle complete"
    );
    for finalist in &report.finalists {
        info!(
            address = %finalist.candidate.address,
            final_score = finalist.candidate.final_score,
            conviction = ?finalist.conviction,
            "finalist"
        );
    }

    Ok(())
}
