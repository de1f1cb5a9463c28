//! Resilience: the circuit breaker and cost ledger that gate and account for
//! every paid call the funnel makes (§4.8, C8).

pub mod circuit_breaker;
pub mod cost_ledger;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use cost_ledger::CostLedger;
