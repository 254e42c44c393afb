//! Latency statistics over resolved correlation entries

use inferq_protocol::ReplyEnvelope;
use std::fmt;

/// Round-trip latency summary for one harness run.
///
/// Computed only over resolved entries; a run that resolved nothing has no
/// report (`compute` returns `None`) rather than a division by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyReport {
    /// Entries that resolved before the wait ended
    pub resolved: usize,

    /// Requests published
    pub expected: usize,

    /// Mean of `pick_up_timestamp - send_timestamp`, seconds
    pub avg_pick_up_latency: f64,

    /// Mean of `response_timestamp - pick_up_timestamp`, seconds
    pub avg_processing_latency: f64,

    /// Mean of `response_timestamp - send_timestamp`, seconds
    pub avg_total_latency: f64,

    /// Earliest send to latest response, seconds
    pub total_duration: f64,
}

impl LatencyReport {
    /// Summarize resolved `(send_timestamp, reply)` pairs.
    ///
    /// Returns `None` when no entries resolved.
    pub fn compute(entries: &[(f64, ReplyEnvelope)], expected: usize) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }

        let count = entries.len() as f64;
        let mut pick_up_sum = 0.0;
        let mut processing_sum = 0.0;
        let mut total_sum = 0.0;
        let mut earliest_send = f64::INFINITY;
        let mut latest_response = f64::NEG_INFINITY;

        for (send_timestamp, reply) in entries {
            pick_up_sum += reply.pick_up_timestamp - send_timestamp;
            processing_sum += reply.response_timestamp - reply.pick_up_timestamp;
            total_sum += reply.response_timestamp - send_timestamp;
            earliest_send = earliest_send.min(*send_timestamp);
            latest_response = latest_response.max(reply.response_timestamp);
        }

        Some(Self {
            resolved: entries.len(),
            expected,
            avg_pick_up_latency: pick_up_sum / count,
            avg_processing_latency: processing_sum / count,
            avg_total_latency: total_sum / count,
            total_duration: latest_response - earliest_send,
        })
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Processing Metrics ---")?;
        writeln!(
            f,
            "Number of responses received: {}/{}",
            self.resolved, self.expected
        )?;
        writeln!(
            f,
            "Average Pick-Up Latency: {:.4} seconds",
            self.avg_pick_up_latency
        )?;
        writeln!(
            f,
            "Average Processing Latency: {:.4} seconds",
            self.avg_processing_latency
        )?;
        writeln!(
            f,
            "Average Total Latency (Send to Response): {:.4} seconds",
            self.avg_total_latency
        )?;
        write!(f, "Total Processing Time: {:.4} seconds", self.total_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(id: &str, pick_up: f64, response: f64) -> ReplyEnvelope {
        ReplyEnvelope {
            message_id: id.to_string(),
            original_input: vec![],
            processed_data: vec![],
            model_output: vec![],
            pick_up_timestamp: pick_up,
            response_timestamp: response,
        }
    }

    #[test]
    fn test_compute_means() {
        let entries = vec![
            (10.0, reply("a", 11.0, 12.0)),
            (20.0, reply("b", 23.0, 26.0)),
        ];

        let report = LatencyReport::compute(&entries, 2).unwrap();

        assert_eq!(report.resolved, 2);
        assert_eq!(report.expected, 2);
        assert!((report.avg_pick_up_latency - 2.0).abs() < 1e-9);
        assert!((report.avg_processing_latency - 2.0).abs() < 1e-9);
        assert!((report.avg_total_latency - 4.0).abs() < 1e-9);
        // Earliest send 10.0, latest response 26.0
        assert!((report.total_duration - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_partial_resolution() {
        let entries = vec![(10.0, reply("a", 10.5, 11.0))];
        let report = LatencyReport::compute(&entries, 5).unwrap();

        assert_eq!(report.resolved, 1);
        assert_eq!(report.expected, 5);
    }

    #[test]
    fn test_compute_empty_yields_none() {
        assert!(LatencyReport::compute(&[], 20).is_none());
    }

    #[test]
    fn test_display_contains_counts() {
        let entries = vec![(1.0, reply("a", 1.5, 2.0))];
        let report = LatencyReport::compute(&entries, 3).unwrap();
        let text = report.to_string();

        assert!(text.contains("1/3"));
        assert!(text.contains("Average Total Latency"));
    }
}
