//! Capability ports consumed by the core (§6, §9 "capability interface").
//!
//! Every external collaborator — per-source HTTP/RPC clients, the batch
//! metadata vendor, the OHLCV vendor, the alert formatter, a security
//! scanner — is behind one of these traits. The core never constructs a
//! concrete HTTP client itself; it is handed `Arc<dyn ...>` implementations
//! at detector construction time: context is passed explicitly rather than
//! reached for through module-level globals (§9).

use crate::error::SourceError;
use crate::model::{Candidate, Timeframe};
use crate::scoring::breakdown::{ConvictionLevel, ScoringBreakdown};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single source's discovery capability (§4.1 adapter contract).
///
/// Each adapter maps its feed's fields into `Candidate` and tags `source`
/// itself; retries and HTTP/RPC specifics are the adapter's concern.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;
    async fn discover(&self) -> Result<Vec<Candidate>, SourceError>;
}

/// Metadata fields a batch (or individual) call can return for one address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub price_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub volume: crate::model::TimeframeSeries<f64>,
    pub trades: crate::model::TimeframeSeries<u64>,
    pub price_change_pct: crate::model::TimeframeSeries<f64>,
    pub unique_traders_24h: Option<u64>,
    pub holder_count: Option<u64>,
    pub security_score: Option<f64>,
}

/// One OHLCV candle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: i64,
}

/// Batch metadata / OHLCV capability (§4.2, §6 metadata and OHLCV ports).
///
/// `cost_cu` reports the vendor's declared cost model for a batch of size
/// `n` (`5 + n^0.8` for a true batch call; implementations backed by a
/// per-token vendor should report `30 * n` so the enricher's savings
/// estimate stays honest).
#[async_trait]
pub trait MetadataPort: Send + Sync {
    fn name(&self) -> &str;

    fn cost_cu(&self, n: usize) -> f64;

    /// A single call retrieving metadata for every address in `addresses`.
    /// Per-address results may individually be `Err` without failing the
    /// whole batch (§4.2 "per-token merge").
    async fn fetch_metadata_batch(
        &self,
        addresses: &[String],
    ) -> Result<HashMap<String, Result<MetadataRecord, SourceError>>, SourceError>;

    /// Per-token fallback used at the end of the downgrade chain (§4.2).
    async fn fetch_metadata_single(
        &self,
        address: &str,
    ) -> Result<MetadataRecord, SourceError>;
}

#[async_trait]
pub trait OhlcvPort: Send + Sync {
    async fn fetch_ohlcv(
        &self,
        address: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError>;

    async fn fetch_ohlcv_batch(
        &self,
        addresses: &[String],
        timeframes: &[Timeframe],
        limit: usize,
    ) -> Result<HashMap<String, HashMap<Timeframe, Vec<Candle>>>, SourceError>;
}

/// Optional on-chain/off-chain security scanner (§4.7 safety_validation,
/// SPEC_FULL.md Supplemented Features #4).
#[async_trait]
pub trait SecurityScorePort: Send + Sync {
    async fn fetch_security_score(&self, address: &str) -> Result<f64, SourceError>;
}

// --- Raw per-feed records and the fetch ports the named discovery adapters
// in `discovery::adapters` wrap (§4.1). The HTTP/RPC client behind each of
// these is the out-of-scope external collaborator; the adapter's own
// mapping-into-`Candidate` and filter logic (12h graduation window, 70%
// bonding-progress gate) lives in `discovery::adapters` as core code.

/// One row of the trending-feed HTTP response (§4.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendingFeedRecord {
    pub address: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub price_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub volume_24h: Option<f64>,
}

#[async_trait]
pub trait TrendingFeedPort: Send + Sync {
    async fn fetch_trending(&self) -> Result<Vec<TrendingFeedRecord>, SourceError>;
}

/// One row of the graduated-tokens HTTP response (§4.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraduatedFeedRecord {
    pub address: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub market_cap_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub graduation_threshold_usd_or_sol: Option<f64>,
    pub hours_since_graduation: f64,
}

#[async_trait]
pub trait GraduatedFeedPort: Send + Sync {
    async fn fetch_graduated(&self) -> Result<Vec<GraduatedFeedRecord>, SourceError>;
}

/// One row of the bonding-tokens HTTP response (§4.1, §9 OQ1: the single
/// richer fetcher this core ships).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BondingFeedRecord {
    pub address: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub market_cap_usd: Option<f64>,
    pub progress_pct: f64,
    pub graduation_threshold_usd_or_sol: Option<f64>,
}

#[async_trait]
pub trait BondingFeedPort: Send + Sync {
    async fn fetch_bonding(&self) -> Result<Vec<BondingFeedRecord>, SourceError>;
}

/// One pool observed by the on-chain curve scan (§4.1 "RPC pool scan").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurvePoolRecord {
    pub address: String,
    pub symbol: Option<String>,
    pub progress_pct: Option<f64>,
    pub market_cap_usd: Option<f64>,
}

#[async_trait]
pub trait CurvePoolScanPort: Send + Sync {
    async fn scan_pools(&self) -> Result<Vec<CurvePoolRecord>, SourceError>;
}

/// One event off the live-launch event queue (§4.1 "event queue").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveLaunchEvent {
    pub address: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
}

#[async_trait]
pub trait LiveLaunchEventPort: Send + Sync {
    async fn next_batch(&self) -> Result<Vec<LiveLaunchEvent>, SourceError>;
}

/// The downstream alerter (§6 alert port). External; the core guarantees the
/// schema it hands over.
#[async_trait]
pub trait AlertPort: Send + Sync {
    async fn emit(
        &self,
        candidate: &Candidate,
        final_score: f64,
        breakdown: &ScoringBreakdown,
        conviction: ConvictionLevel,
    ) -> anyhow::Result<()>;
}
