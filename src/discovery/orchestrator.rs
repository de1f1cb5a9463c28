//! Discovery Orchestrator (C1, §4.1). Fans out to every registered source
//! concurrently, absorbs per-source errors and timeouts, and returns a
//! deduplicated, newest-first candidate list.

use crate::model::Candidate;
use crate::ports::SourceAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// One registered feed: its adapter, the timeout that governs it, and an
/// optional cached fallback used when the live adapter times out (§4.1
/// "fallback path processes cached on-chain data").
pub struct SourceRegistration {
    pub adapter: Arc<dyn SourceAdapter>,
    pub timeout: Duration,
    pub cached_fallback: Option<Arc<dyn SourceAdapter>>,
}

impl SourceRegistration {
    pub fn new(adapter: Arc<dyn SourceAdapter>, timeout: Duration) -> Self {
        Self {
            adapter,
            timeout,
            cached_fallback: None,
        }
    }

    pub fn with_cached_fallback(mut self, fallback: Arc<dyn SourceAdapter>) -> Self {
        self.cached_fallback = Some(fallback);
        self
    }
}

pub struct DiscoveryOrchestrator {
    sources: Vec<SourceRegistration>,
}

impl DiscoveryOrchestrator {
    pub fn new(sources: Vec<SourceRegistration>) -> Self {
        Self { sources }
    }

    /// Runs one discovery pass: every source concurrently, each bounded by
    /// its own timeout, dedup by address (keep first occurrence), sorted
    /// newest-first (§4.1).
    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn discover_all(&self) -> Vec<Candidate> {
        let mut tasks = Vec::with_capacity(self.sources.len());
        for registration in &self.sources {
            tasks.push(self.run_one(registration));
        }

        let per_source_results = futures::future::join_all(tasks).await;

        let mut seen = HashMap::new();
        let mut ordered = Vec::new();
        for candidates in per_source_results {
            for candidate in candidates {
                if seen.insert(candidate.address.clone(), ()).is_none() {
                    ordered.push(candidate);
                }
            }
        }

        ordered.sort_by(|a, b| b.first_seen_at.cmp(&a.first_seen_at));
        ordered
    }

    async fn run_one(&self, registration: &SourceRegistration) -> Vec<Candidate> {
        let name = registration.adapter.name().to_string();
        match tokio::time::timeout(registration.timeout, registration.adapter.discover()).await {
            Ok(Ok(candidates)) => {
                info!(source = %name, count = candidates.len(), "source returned candidates");
                candidates
            }
            Ok(Err(err)) => {
                warn!(source = %name, error = %err, "source adapter failed");
                Vec::new()
            }
            Err(_) => {
                warn!(source = %name, timeout = ?registration.timeout, "source timed out");
                if let Some(fallback) = &registration.cached_fallback {
                    match fallback.discover().await {
                        Ok(candidates) => {
                            info!(source = %name, count = candidates.len(), "used cached fallback");
                            candidates
                        }
                        Err(err) => {
                            warn!(source = %name, error = %err, "cached fallback also failed");
                            Vec::new()
                        }
                    }
                } else {
                    Vec::new()
                }
            }
        }
    }
}
