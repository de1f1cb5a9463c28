//! Discovery Orchestrator (C1, §4.1): fan-out to every source adapter,
//! timeout and error absorption, dedup, and the in-memory adapters used by
//! tests and the demo binary.

pub mod adapters;
pub mod orchestrator;

pub use orchestrator::{DiscoveryOrchestrator, SourceRegistration};
