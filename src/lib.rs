//! Progressive early-gem detection pipeline for newly-launched Solana
//! tokens: a four-stage triage funnel (discover -> enrich -> validate ->
//! deep-analyze) over a source-agnostic candidate record, gated throughout
//! by a shared circuit breaker and cost ledger.
//!
//! External collaborators — HTTP/RPC feeds, the batch metadata and OHLCV
//! vendors, the alert sink — are injected as `Arc<dyn ...>` implementations
//! of the traits in [`ports`]; the core never constructs a concrete client.

pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod enrich;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod ports;
pub mod resilience;
pub mod scoring;

pub use config::DetectorConfig;
pub use coordinator::{Coordinator, CycleReport, Finalist};
pub use error::DetectorError;
pub use model::Candidate;
