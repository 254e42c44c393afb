//! InferQ message contract
//!
//! Wire envelopes exchanged between the load generator and the worker over
//! the broker, plus the shared wall-clock helper both sides stamp
//! timestamps with.

pub mod clock;
pub mod envelope;

pub use clock::wall_clock_secs;
pub use envelope::{ReplyEnvelope, RequestEnvelope};
