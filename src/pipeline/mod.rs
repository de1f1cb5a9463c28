//! The four-stage triage funnel (C3-C6, §4.3-§4.6): monotonically narrowing
//! and deepening analysis, cheapest checks first.

pub mod stage1;
pub mod stage2;
pub mod stage3;
pub mod stage4;
