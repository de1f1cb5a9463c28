//! Error taxonomy for the progressive analysis engine.
//!
//! Per-candidate and per-stage failures are absorbed at their boundary (see
//! `coordinator`); only `ConfigurationMissing` is fatal and allowed to bubble
//! out of `Detector::new`.

use thiserror::Error;

/// Errors a single source adapter or enrichment call can raise.
///
/// These never abort a cycle: the orchestrator and enricher catch them and
/// fold the failure into an empty contribution or an unchanged candidate.
#[derive(Debug, Error, Clone)]
pub enum SourceError {
    #[error("source '{0}' unavailable: {1}")]
    Unavailable(String, String),

    #[error("source '{0}' rate limited")]
    RateLimited(String),

    #[error("source '{0}' timed out after {1:?}")]
    TimedOut(String, std::time::Duration),
}

/// Errors raised while scoring a single candidate.
///
/// Absorbed by the caller: the candidate keeps its previous-stage score with
/// an `*_error` annotation and stays eligible for alerting.
#[derive(Debug, Error, Clone)]
pub enum ScoringError {
    #[error("insufficient data to score candidate {0}")]
    InsufficientData(String),

    #[error("OHLCV batch failed for candidate {0}: {1}")]
    OhlcvFailure(String, String),
}

/// Wholesale failure of an entire stage. The coordinator catches this,
/// applies the stage's penalization factor, and falls back to the prior
/// stage's output (see `coordinator::Coordinator::run_cycle`).
#[derive(Debug, Error, Clone)]
#[error("stage '{stage}' failed wholesale: {reason}")]
pub struct StageError {
    pub stage: &'static str,
    pub reason: String,
}

/// Fatal initialization error. The only error kind allowed to bubble out of
/// detector construction.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("configuration missing required field: {0}")]
    ConfigurationMissing(&'static str),

    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),
}
