//! Request and reply envelopes
//!
//! Both envelopes travel as JSON bodies on broker deliveries. Decoding is
//! strict: a missing or malformed required field is a decode error, never a
//! silently substituted default.

use serde::{Deserialize, Serialize};

/// A single inference job submitted to the work queue.
///
/// `message_id` is producer-assigned and must also be carried as the
/// delivery's correlation id so both layers of identity agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Producer-assigned unique identifier, immutable for the message's life
    pub message_id: String,

    /// Raw numeric input to the pipeline
    pub data: Vec<f64>,

    /// Wall-clock seconds at submission, captured immediately before publish
    pub send_timestamp: f64,
}

/// The worker's answer to a [`RequestEnvelope`], published to the
/// request's reply destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    /// Copied unchanged from the request
    pub message_id: String,

    /// The request's `data`, echoed back
    pub original_input: Vec<f64>,

    /// Output of the preprocessing stage
    pub processed_data: Vec<f64>,

    /// Output of the prediction stage
    pub model_output: Vec<f64>,

    /// Wall-clock seconds when the worker began processing
    pub pick_up_timestamp: f64,

    /// Wall-clock seconds immediately before the reply was published
    pub response_timestamp: f64,
}

impl RequestEnvelope {
    /// Serialize to the JSON wire format
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Strictly decode from the JSON wire format
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl ReplyEnvelope {
    /// Serialize to the JSON wire format
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Strictly decode from the JSON wire format
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Whether the worker-side timestamps are ordered as required
    pub fn timestamps_ordered(&self) -> bool {
        self.pick_up_timestamp <= self.response_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_decode() {
        let raw = br#"{"message_id":"abc-123","data":[0.1,0.2,0.3],"send_timestamp":1700000000.5}"#;
        let envelope = RequestEnvelope::from_bytes(raw).unwrap();

        assert_eq!(envelope.message_id, "abc-123");
        assert_eq!(envelope.data, vec![0.1, 0.2, 0.3]);
        assert_eq!(envelope.send_timestamp, 1700000000.5);
    }

    #[test]
    fn test_request_decode_missing_field_fails() {
        let raw = br#"{"data":[0.1],"send_timestamp":1.0}"#;
        assert!(RequestEnvelope::from_bytes(raw).is_err());
    }

    #[test]
    fn test_request_decode_non_numeric_data_fails() {
        let raw = br#"{"message_id":"abc","data":["not-a-number"],"send_timestamp":1.0}"#;
        assert!(RequestEnvelope::from_bytes(raw).is_err());
    }

    #[test]
    fn test_request_roundtrip() {
        let envelope = RequestEnvelope {
            message_id: "id-1".to_string(),
            data: vec![0.5, 0.25],
            send_timestamp: 42.0,
        };

        let bytes = envelope.to_bytes().unwrap();
        let decoded = RequestEnvelope::from_bytes(&bytes).unwrap();

        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_reply_roundtrip() {
        let reply = ReplyEnvelope {
            message_id: "id-2".to_string(),
            original_input: vec![1.0, 2.0],
            processed_data: vec![0.0, 1.0],
            model_output: vec![0.0, 1.0],
            pick_up_timestamp: 10.0,
            response_timestamp: 10.5,
        };

        let bytes = reply.to_bytes().unwrap();
        let decoded = ReplyEnvelope::from_bytes(&bytes).unwrap();

        assert_eq!(reply, decoded);
        assert!(decoded.timestamps_ordered());
    }

    #[test]
    fn test_reply_timestamps_unordered() {
        let reply = ReplyEnvelope {
            message_id: "id-3".to_string(),
            original_input: vec![],
            processed_data: vec![],
            model_output: vec![],
            pick_up_timestamp: 11.0,
            response_timestamp: 10.0,
        };

        assert!(!reply.timestamps_ordered());
    }
}
