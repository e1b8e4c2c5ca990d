//! Epoch-bucketed index over the raw history log.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::event::HistoryEvent;

/// Events grouped by resolved epoch.
///
/// Buckets keep insertion order (the log's order) and are not sorted further.
/// Building is idempotent: re-running over a fuller log simply replaces the
/// prior index.
#[derive(Debug, Clone, Default)]
pub struct HistoryIndex {
    by_epoch: BTreeMap<u64, Vec<HistoryEvent>>,
    max_epoch: u64,
}

impl HistoryIndex {
    /// Builds an index from serialized log lines.
    ///
    /// Malformed lines are skipped and logged; they never abort the load.
    pub fn build<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = Self::default();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            match HistoryEvent::from_line(line) {
                Some(event) => index.insert(event),
                None => tracing::warn!("skipping malformed history line: {:.80}", line),
            }
        }
        index
    }

    /// Builds an index from already-parsed values.
    ///
    /// A value may itself be a JSON-encoded string (newline-delimited
    /// semantics tolerated) or a structured record.
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut index = Self::default();
        for value in values {
            let event = match value {
                Value::String(line) => HistoryEvent::from_line(line),
                other => HistoryEvent::from_value(other),
            };
            match event {
                Some(event) => index.insert(event),
                None => tracing::warn!("skipping malformed history record"),
            }
        }
        index
    }

    fn insert(&mut self, event: HistoryEvent) {
        self.max_epoch = self.max_epoch.max(event.epoch);
        self.by_epoch.entry(event.epoch).or_default().push(event);
    }

    /// Events that occurred in the given epoch, in log order.
    pub fn events_at(&self, epoch: u64) -> &[HistoryEvent] {
        self.by_epoch.get(&epoch).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest resolved epoch seen; 0 when the log was empty.
    pub fn max_epoch(&self) -> u64 {
        self.max_epoch
    }

    /// Epochs that have at least one event, ascending.
    pub fn epochs(&self) -> impl Iterator<Item = u64> + '_ {
        self.by_epoch.keys().copied()
    }

    /// Total number of indexed events.
    pub fn len(&self) -> usize {
        self.by_epoch.values().map(Vec::len).sum()
    }

    /// True when nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.by_epoch.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_skips_malformed() {
        let lines = [
            r#"{"created_at":2,"event_type":"raid_start"}"#,
            "not json",
            r#"{"age":5}"#,
        ];
        let index = HistoryIndex::build(lines);

        assert_eq!(index.len(), 2);
        assert_eq!(index.events_at(2).len(), 1);
        assert_eq!(index.events_at(2)[0].event_type, "raid_start");
        assert_eq!(index.events_at(5).len(), 1);
        assert_eq!(index.max_epoch(), 5);
        assert!(index.events_at(3).is_empty());
    }

    #[test]
    fn test_build_is_idempotent() {
        let lines = [
            r#"{"created_at":1,"event_type":"settlement_founded"}"#,
            r#"{"created_at":1,"event_type":"raid_start"}"#,
            r#"{"age":4,"event_type":"leader_death"}"#,
        ];
        let first = HistoryIndex::build(lines);
        let second = HistoryIndex::build(lines);

        assert_eq!(first.max_epoch(), second.max_epoch());
        assert_eq!(first.len(), second.len());
        let first_epochs: Vec<_> = first.epochs().collect();
        let second_epochs: Vec<_> = second.epochs().collect();
        assert_eq!(first_epochs, second_epochs);
        for epoch in first.epochs() {
            let a: Vec<_> = first.events_at(epoch).iter().map(|e| &e.event_type).collect();
            let b: Vec<_> = second.events_at(epoch).iter().map(|e| &e.event_type).collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_bucket_keeps_log_order() {
        let lines = [
            r#"{"created_at":3,"event_type":"b"}"#,
            r#"{"created_at":3,"event_type":"a"}"#,
            r#"{"created_at":3,"event_type":"c"}"#,
        ];
        let index = HistoryIndex::build(lines);
        let types: Vec<_> = index.events_at(3).iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_empty_log() {
        let index = HistoryIndex::build([]);
        assert!(index.is_empty());
        assert_eq!(index.max_epoch(), 0);
        assert!(index.events_at(0).is_empty());
    }

    #[test]
    fn test_from_values_mixed_shapes() {
        let values = vec![
            json!({"created_at": 2, "event_type": "raid_start"}),
            json!(r#"{"age":6,"event_type":"truce_signed"}"#),
            json!(42),
        ];
        let index = HistoryIndex::from_values(values.iter());
        assert_eq!(index.len(), 2);
        assert_eq!(index.max_epoch(), 6);
    }

    #[test]
    fn test_blank_lines_tolerated() {
        let lines = ["", "   ", r#"{"age":1}"#];
        let index = HistoryIndex::build(lines);
        assert_eq!(index.len(), 1);
    }
}
