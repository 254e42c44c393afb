//! InferQ Load Generator
//!
//! End-to-end load harness: publishes a batch of uniquely identified
//! requests, collects correlated replies on a separate connection, and
//! reports round-trip latency statistics with a bounded wait.

pub mod correlation;
pub mod harness;
pub mod report;

pub use correlation::{CorrelationTable, ResolveOutcome};
pub use harness::{HarnessOptions, HarnessOutcome, PublishStats};
pub use report::LatencyReport;
