//! Source adapters (§4.1). Concrete HTTP/RPC adapters are an external
//! integration concern (spec Non-goals); this module ships the in-memory
//! adapters used for tests and the demo binary, grounded on `h-5n1p3r`'s
//! `oracle/data_sources.rs` pattern of one struct per feed implementing a
//! shared trait.

use crate::error::SourceError;
use crate::model::{Candidate, Source};
use crate::ports::{
    BondingFeedPort, CurvePoolScanPort, GraduatedFeedPort, LiveLaunchEventPort, SourceAdapter,
    TrendingFeedPort,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::info;

/// Fixed in-memory feed, used by tests and `main`'s demo cycle. Resolves §9
/// OQ1: there is exactly one adapter per `Source` variant, never two
/// competing adapters for the same feed.
pub struct StaticAdapter {
    name: &'static str,
    candidates: Mutex<Vec<Candidate>>,
}

impl StaticAdapter {
    pub fn new(name: &'static str, candidates: Vec<Candidate>) -> Self {
        Self {
            name,
            candidates: Mutex::new(candidates),
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn name(&self) -> &str {
        self.name
    }

    async fn discover(&self) -> Result<Vec<Candidate>, SourceError> {
        Ok(self.candidates.lock().unwrap().clone())
    }
}

/// An adapter that always fails, for exercising C1's per-source error
/// absorption and the §8 "all sources time out" boundary case.
pub struct FailingAdapter {
    name: &'static str,
    error: SourceError,
}

impl FailingAdapter {
    pub fn new(name: &'static str, error: SourceError) -> Self {
        Self { name, error }
    }
}

#[async_trait]
impl SourceAdapter for FailingAdapter {
    fn name(&self) -> &str {
        self.name
    }

    async fn discover(&self) -> Result<Vec<Candidate>, SourceError> {
        Err(self.error.clone())
    }
}

/// Filters the graduated-tokens feed to graduations within the last 12
/// hours (§4.1). Exposed standalone so a real HTTP-backed adapter can reuse
/// it on raw records before constructing `Candidate`s.
pub fn within_last_12h(hours_since_graduation: f64) -> bool {
    (0.0..=12.0).contains(&hours_since_graduation)
}

/// Bonding-tokens feed filter: progress ≥ 70% (§4.1).
pub fn bonding_progress_gate(progress_pct: f64) -> bool {
    progress_pct >= 70.0
}

/// Trending-feed adapter (§4.1, HTTP): presence alone qualifies a candidate
/// for Stage 1's `trending` rubric; no feed-side filter.
pub struct TrendingFeedAdapter {
    port: Arc<dyn TrendingFeedPort>,
}

impl TrendingFeedAdapter {
    pub fn new(port: Arc<dyn TrendingFeedPort>) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SourceAdapter for TrendingFeedAdapter {
    fn name(&self) -> &str {
        "trending-feed"
    }

    async fn discover(&self) -> Result<Vec<Candidate>, SourceError> {
        let records = self.port.fetch_trending().await?;
        let now = Utc::now();
        Ok(records
            .into_iter()
            .map(|r| {
                let mut c = Candidate::new(r.address, Source::TrendingFeed, now);
                c.symbol = r.symbol;
                c.name = r.name;
                c.price_usd = r.price_usd;
                c.market_cap_usd = r.market_cap_usd;
                c.liquidity_usd = r.liquidity_usd;
                c.volume.h24 = r.volume_24h;
                c
            })
            .collect())
    }
}

/// Graduated-tokens feed adapter (§4.1): filters to graduations within the
/// last 12 hours before the candidate ever reaches Stage 1.
pub struct GraduatedTokensAdapter {
    port: Arc<dyn GraduatedFeedPort>,
}

impl GraduatedTokensAdapter {
    pub fn new(port: Arc<dyn GraduatedFeedPort>) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SourceAdapter for GraduatedTokensAdapter {
    fn name(&self) -> &str {
        "graduated-feed"
    }

    async fn discover(&self) -> Result<Vec<Candidate>, SourceError> {
        let records = self.port.fetch_graduated().await?;
        let now = Utc::now();
        Ok(records
            .into_iter()
            .filter(|r| within_last_12h(r.hours_since_graduation))
            .map(|r| {
                let mut c = Candidate::new(r.address, Source::GraduatedFeed, now);
                c.symbol = r.symbol;
                c.name = r.name;
                c.market_cap_usd = r.market_cap_usd;
                c.liquidity_usd = r.liquidity_usd;
                c.graduation_threshold_usd_or_sol = r.graduation_threshold_usd_or_sol;
                c.hours_since_graduation = Some(r.hours_since_graduation);
                c
            })
            .collect())
    }
}

/// Bonding-tokens feed adapter (§4.1). Resolves §9 OQ1: the source carried
/// two near-identical fetchers for this feed; this is the single richer one
/// (progress-pct filter plus a structured summary log), the duplicate is not
/// reimplemented.
pub struct BondingTokensAdapter {
    port: Arc<dyn BondingFeedPort>,
}

impl BondingTokensAdapter {
    pub fn new(port: Arc<dyn BondingFeedPort>) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SourceAdapter for BondingTokensAdapter {
    fn name(&self) -> &str {
        "bonding-feed"
    }

    async fn discover(&self) -> Result<Vec<Candidate>, SourceError> {
        let records = self.port.fetch_bonding().await?;
        let total = records.len();
        let now = Utc::now();
        let candidates: Vec<Candidate> = records
            .into_iter()
            .filter(|r| bonding_progress_gate(r.progress_pct))
            .map(|r| {
                let mut c = Candidate::new(r.address, Source::BondingFeed, now);
                c.symbol = r.symbol;
                c.name = r.name;
                c.market_cap_usd = r.market_cap_usd;
                c.bonding_curve_progress_pct = Some(r.progress_pct);
                c.graduation_threshold_usd_or_sol = r.graduation_threshold_usd_or_sol;
                c
            })
            .collect();
        info!(
            total_seen = total,
            past_gate = candidates.len(),
            "bonding-feed: progress >= 70% gate applied"
        );
        Ok(candidates)
    }
}

/// On-chain curve detector adapter (§4.1, RPC pool scan).
pub struct CurveDetectorAdapter {
    port: Arc<dyn CurvePoolScanPort>,
}

impl CurveDetectorAdapter {
    pub fn new(port: Arc<dyn CurvePoolScanPort>) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SourceAdapter for CurveDetectorAdapter {
    fn name(&self) -> &str {
        "curve-detector"
    }

    async fn discover(&self) -> Result<Vec<Candidate>, SourceError> {
        let records = self.port.scan_pools().await?;
        let now = Utc::now();
        Ok(records
            .into_iter()
            .map(|r| {
                let mut c = Candidate::new(r.address, Source::CurveDetector, now);
                c.symbol = r.symbol;
                c.bonding_curve_progress_pct = r.progress_pct;
                c.market_cap_usd = r.market_cap_usd;
                c
            })
            .collect())
    }
}

/// Live-launch event-queue adapter (§4.1).
pub struct LiveLaunchAdapter {
    port: Arc<dyn LiveLaunchEventPort>,
}

impl LiveLaunchAdapter {
    pub fn new(port: Arc<dyn LiveLaunchEventPort>) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SourceAdapter for LiveLaunchAdapter {
    fn name(&self) -> &str {
        "live-launch"
    }

    async fn discover(&self) -> Result<Vec<Candidate>, SourceError> {
        let events = self.port.next_batch().await?;
        let now = Utc::now();
        Ok(events
            .into_iter()
            .map(|e| {
                let mut c = Candidate::new(e.address, Source::LiveLaunch, now);
                c.symbol = e.symbol;
                c.name = e.name;
                c
            })
            .collect())
    }
}
