//! Model artifact loading and prediction
//!
//! The model is a JSON artifact holding an ordered stack of element-wise
//! layers. The artifact is produced offline by the `make-model` binary and
//! loaded once at worker startup; prediction applies the layers in order.

use inferq_common::error::{InferQError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A single element-wise layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Pass values through unchanged
    Identity,

    /// Multiply every value by a factor
    Scale { factor: f64 },

    /// Add an offset to every value
    Shift { offset: f64 },
}

impl Layer {
    fn apply(&self, value: f64) -> f64 {
        match self {
            Layer::Identity => value,
            Layer::Scale { factor } => value * factor,
            Layer::Shift { offset } => value + offset,
        }
    }
}

/// An inference model: a named, ordered stack of layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model name, embedded in the artifact
    pub name: String,

    /// Layers applied in order during prediction
    pub layers: Vec<Layer>,
}

impl Model {
    /// Build a dummy model of `size` sequential identity layers
    pub fn identity(size: usize) -> Self {
        Self {
            name: "dummy-identity".to_string(),
            layers: vec![Layer::Identity; size],
        }
    }

    /// Load a model artifact from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|e| {
            InferQError::Model(format!("Failed to read model artifact {}: {}", path.display(), e))
        })?;

        let model: Model = serde_json::from_slice(&content).map_err(|e| {
            InferQError::Model(format!("Failed to parse model artifact {}: {}", path.display(), e))
        })?;

        if model.layers.is_empty() {
            return Err(InferQError::model("Model artifact has no layers"));
        }

        info!("Loaded model '{}' with {} layers", model.name, model.layers.len());

        Ok(model)
    }

    /// Write the model artifact to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Run the layer stack over an input vector
    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.is_empty() {
            return Err(InferQError::invalid_input("Model input must not be empty"));
        }

        if input.iter().any(|v| !v.is_finite()) {
            return Err(InferQError::invalid_input("Model input must be finite"));
        }

        let mut values = input.to_vec();
        for layer in &self.layers {
            for value in &mut values {
                *value = layer.apply(*value);
            }
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_model_is_passthrough() {
        let model = Model::identity(3);
        let input = vec![0.1, 0.2, 0.3];

        assert_eq!(model.predict(&input).unwrap(), input);
    }

    #[test]
    fn test_layer_stack_applies_in_order() {
        let model = Model {
            name: "affine".to_string(),
            layers: vec![Layer::Scale { factor: 2.0 }, Layer::Shift { offset: 1.0 }],
        };

        assert_eq!(model.predict(&[1.0, 2.0]).unwrap(), vec![3.0, 5.0]);
    }

    #[test]
    fn test_predict_rejects_empty_input() {
        let model = Model::identity(1);
        assert!(model.predict(&[]).is_err());
    }

    #[test]
    fn test_predict_rejects_non_finite_input() {
        let model = Model::identity(1);
        assert!(model.predict(&[0.5, f64::NAN]).is_err());
        assert!(model.predict(&[f64::INFINITY]).is_err());
    }

    #[test]
    fn test_artifact_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let model = Model::identity(5);
        model.save(&path).unwrap();

        let loaded = Model::load(&path).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(loaded.layers.len(), 5);
    }

    #[test]
    fn test_load_rejects_empty_layer_stack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, br#"{"name":"empty","layers":[]}"#).unwrap();

        assert!(Model::load(&path).is_err());
    }
}
