//! Correlation table
//!
//! Maps each published message id to the metadata needed to match its
//! eventual reply and compute latency. Entries are created at publish time
//! and resolved at most once; the collector task is the only writer while
//! the harness is running, and the report reads the table only after the
//! wait completes.

use inferq_protocol::ReplyEnvelope;
use parking_lot::Mutex;
use std::collections::HashMap;

/// One published request awaiting (or holding) its reply
#[derive(Debug, Clone)]
pub struct CorrelationEntry {
    /// Wall-clock seconds captured immediately before publish
    pub send_timestamp: f64,

    /// The matching reply, once it arrives. Never overwritten.
    pub reply: Option<ReplyEnvelope>,
}

/// What happened when a reply was offered to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The entry was pending and is now resolved
    Resolved,

    /// The entry was already resolved; the reply was dropped
    Duplicate,

    /// No entry exists for this message id
    Unknown,
}

/// In-memory request/reply correlation state
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: Mutex<HashMap<String, CorrelationEntry>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request at publish time
    pub fn insert_pending(&self, message_id: &str, send_timestamp: f64) {
        let mut entries = self.entries.lock();
        entries.insert(
            message_id.to_string(),
            CorrelationEntry {
                send_timestamp,
                reply: None,
            },
        );
    }

    /// Offer a reply; writes the entry at most once
    pub fn resolve(&self, reply: ReplyEnvelope) -> ResolveOutcome {
        let mut entries = self.entries.lock();
        match entries.get_mut(&reply.message_id) {
            Some(entry) if entry.reply.is_none() => {
                entry.reply = Some(reply);
                ResolveOutcome::Resolved
            }
            Some(_) => ResolveOutcome::Duplicate,
            None => ResolveOutcome::Unknown,
        }
    }

    /// Number of requests recorded
    pub fn expected(&self) -> usize {
        self.entries.lock().len()
    }

    /// Number of entries holding a reply
    pub fn resolved(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.reply.is_some())
            .count()
    }

    /// Snapshot of resolved entries as (send_timestamp, reply) pairs
    pub fn resolved_entries(&self) -> Vec<(f64, ReplyEnvelope)> {
        self.entries
            .lock()
            .values()
            .filter_map(|entry| {
                entry
                    .reply
                    .as_ref()
                    .map(|reply| (entry.send_timestamp, reply.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(id: &str) -> ReplyEnvelope {
        ReplyEnvelope {
            message_id: id.to_string(),
            original_input: vec![0.1],
            processed_data: vec![0.1],
            model_output: vec![0.1],
            pick_up_timestamp: 2.0,
            response_timestamp: 3.0,
        }
    }

    #[test]
    fn test_resolve_pending_entry() {
        let table = CorrelationTable::new();
        table.insert_pending("a", 1.0);

        assert_eq!(table.resolve(reply("a")), ResolveOutcome::Resolved);
        assert_eq!(table.resolved(), 1);
        assert_eq!(table.expected(), 1);
    }

    #[test]
    fn test_duplicate_reply_is_dropped() {
        let table = CorrelationTable::new();
        table.insert_pending("a", 1.0);

        let mut second = reply("a");
        second.response_timestamp = 99.0;

        assert_eq!(table.resolve(reply("a")), ResolveOutcome::Resolved);
        assert_eq!(table.resolve(second), ResolveOutcome::Duplicate);

        // First write wins
        let entries = table.resolved_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.response_timestamp, 3.0);
    }

    #[test]
    fn test_foreign_reply_is_rejected() {
        let table = CorrelationTable::new();
        table.insert_pending("a", 1.0);

        assert_eq!(table.resolve(reply("b")), ResolveOutcome::Unknown);
        assert_eq!(table.resolved(), 0);
    }

    #[test]
    fn test_unresolved_entries_are_excluded() {
        let table = CorrelationTable::new();
        table.insert_pending("a", 1.0);
        table.insert_pending("b", 1.5);
        table.resolve(reply("a"));

        assert_eq!(table.expected(), 2);
        assert_eq!(table.resolved(), 1);

        let entries = table.resolved_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, 1.0);
    }
}
