//! Two-stage inference pipeline
//!
//! The pipeline seam the worker runs per message: `preprocess` shapes the
//! raw request data, `predict` runs the model over the result. Both stages
//! are synchronous and side-effect free; any failure is converted to a nack
//! by the delivery handler.

use crate::model::Model;
use inferq_common::error::{InferQError, Result};

/// The preprocess/predict seam between the worker and the inference engine
pub trait Pipeline: Send + Sync {
    /// Transform raw request data into model input
    fn preprocess(&self, input: &[f64]) -> Result<Vec<f64>>;

    /// Run the model over preprocessed data
    fn predict(&self, processed: &[f64]) -> Result<Vec<f64>>;
}

/// Production pipeline: min-max scaling followed by the layered model
pub struct ModelPipeline {
    model: Model,
}

impl ModelPipeline {
    /// Create a pipeline around a loaded model
    pub fn new(model: Model) -> Self {
        Self { model }
    }
}

impl Pipeline for ModelPipeline {
    /// Scale the input into [0, 1]. A constant vector maps to zeros.
    fn preprocess(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.is_empty() {
            return Err(InferQError::pipeline("Input data must not be empty"));
        }

        if input.iter().any(|v| !v.is_finite()) {
            return Err(InferQError::pipeline("Input data must be finite"));
        }

        let min = input.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = input.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        if range == 0.0 {
            return Ok(vec![0.0; input.len()]);
        }

        Ok(input.iter().map(|v| (v - min) / range).collect())
    }

    fn predict(&self, processed: &[f64]) -> Result<Vec<f64>> {
        self.model.predict(processed)
    }
}

/// Passthrough pipeline: both stages are the identity function.
///
/// Useful for smoke-testing the request/reply path, where the reply's
/// `model_output` must equal its `original_input`.
pub struct IdentityPipeline;

impl Pipeline for IdentityPipeline {
    fn preprocess(&self, input: &[f64]) -> Result<Vec<f64>> {
        Ok(input.to_vec())
    }

    fn predict(&self, processed: &[f64]) -> Result<Vec<f64>> {
        Ok(processed.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_scales_to_unit_interval() {
        let pipeline = ModelPipeline::new(Model::identity(1));
        let processed = pipeline.preprocess(&[2.0, 4.0, 6.0]).unwrap();

        assert_eq!(processed, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_preprocess_constant_vector_maps_to_zeros() {
        let pipeline = ModelPipeline::new(Model::identity(1));
        let processed = pipeline.preprocess(&[3.0, 3.0, 3.0]).unwrap();

        assert_eq!(processed, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_preprocess_rejects_empty_input() {
        let pipeline = ModelPipeline::new(Model::identity(1));
        assert!(pipeline.preprocess(&[]).is_err());
    }

    #[test]
    fn test_preprocess_rejects_non_finite_input() {
        let pipeline = ModelPipeline::new(Model::identity(1));
        assert!(pipeline.preprocess(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_model_pipeline_end_to_end() {
        let pipeline = ModelPipeline::new(Model::identity(3));
        let processed = pipeline.preprocess(&[0.0, 5.0, 10.0]).unwrap();
        let output = pipeline.predict(&processed).unwrap();

        // Identity model: prediction equals the preprocessed data
        assert_eq!(output, processed);
    }

    #[test]
    fn test_identity_pipeline_is_passthrough() {
        let input = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let pipeline = IdentityPipeline;

        let processed = pipeline.preprocess(&input).unwrap();
        let output = pipeline.predict(&processed).unwrap();

        assert_eq!(output, input);
    }
}
