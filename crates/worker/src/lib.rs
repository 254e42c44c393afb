//! InferQ Worker
//!
//! Durable work-queue consumer that drains inference requests under a
//! bounded admission window, runs the preprocess/predict pipeline per
//! message, and publishes a correlated reply to each request's reply
//! destination.

pub mod consumer;
pub mod model;
pub mod pipeline;

pub use consumer::{Inflight, Worker};
pub use model::{Layer, Model};
pub use pipeline::{IdentityPipeline, ModelPipeline, Pipeline};
