//! Bounded polling of a backend simulation run.
//!
//! After `POST run` the backend grinds in the background and the only
//! observable progress is the growing history log. The driver here polls
//! `history_logs` until the observed max epoch reaches the target, stops
//! early when the log stagnates, and times out at an absolute attempt
//! ceiling so a wedged backend can never hold the viewer forever.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use world_model::HistoryIndex;

use crate::api::{BackendError, SimulationBackend};

/// Polling knobs, loadable from the `[poll]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between polls, in milliseconds.
    pub interval_ms: u64,
    /// Absolute attempt ceiling; exceeding it is a timeout.
    pub max_attempts: u32,
    /// Consecutive unchanged-max-epoch polls before giving up early.
    pub stagnation_limit: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_attempts: 240,
            stagnation_limit: 8,
        }
    }
}

/// Polling failure modes.
#[derive(Debug, Error)]
pub enum PollError {
    /// The attempt ceiling was exhausted. Fatal to this operation only.
    #[error("backend did not reach epoch {target} within {attempts} polls")]
    Timeout { target: u64, attempts: u32 },
}

/// How a poll loop ended short of an error.
#[derive(Debug)]
pub enum PollOutcome {
    /// The log reached the target epoch.
    Reached { index: HistoryIndex, attempts: u32 },
    /// The max epoch stopped advancing; what was collected is returned.
    Stagnated { index: HistoryIndex, attempts: u32 },
}

impl PollOutcome {
    /// The index collected by the loop, however it ended.
    pub fn into_index(self) -> HistoryIndex {
        match self {
            PollOutcome::Reached { index, .. } | PollOutcome::Stagnated { index, .. } => index,
        }
    }
}

/// Detects a run that has stopped producing history.
#[derive(Debug)]
pub struct StagnationDetector {
    limit: u32,
    last_max: Option<u64>,
    unchanged: u32,
}

impl StagnationDetector {
    /// Creates a detector that trips after `limit` consecutive unchanged
    /// observations.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            last_max: None,
            unchanged: 0,
        }
    }

    /// Feeds one observation; returns true once stagnation is established.
    pub fn observe(&mut self, max_epoch: u64) -> bool {
        if self.last_max == Some(max_epoch) {
            self.unchanged += 1;
        } else {
            self.last_max = Some(max_epoch);
            self.unchanged = 0;
        }
        self.limit > 0 && self.unchanged >= self.limit
    }
}

/// Polls `history_logs` until `target_epoch` is observed, the log stagnates,
/// or the attempt ceiling trips.
///
/// Transport and decode failures are transient: they consume an attempt and
/// the loop keeps going. The `sleep` hook makes the loop testable without
/// wall-clock delays.
pub fn poll_history<B, S>(
    backend: &mut B,
    target_epoch: u64,
    config: &PollConfig,
    mut sleep: S,
) -> Result<PollOutcome, PollError>
where
    B: SimulationBackend + ?Sized,
    S: FnMut(Duration),
{
    let mut detector = StagnationDetector::new(config.stagnation_limit);
    let mut last_index = HistoryIndex::default();

    for attempt in 1..=config.max_attempts {
        match backend.fetch_history_logs() {
            Ok(lines) => {
                let index = HistoryIndex::build(lines.iter().map(String::as_str));
                let max_epoch = index.max_epoch();
                last_index = index;

                if max_epoch >= target_epoch {
                    tracing::debug!(attempt, max_epoch, "poll reached target epoch");
                    return Ok(PollOutcome::Reached {
                        index: last_index,
                        attempts: attempt,
                    });
                }
                if detector.observe(max_epoch) {
                    tracing::info!(
                        attempt,
                        max_epoch,
                        target_epoch,
                        "history stagnated before target, returning what was collected"
                    );
                    return Ok(PollOutcome::Stagnated {
                        index: last_index,
                        attempts: attempt,
                    });
                }
            }
            Err(error) => {
                // Transient; the attempt ceiling bounds how long we tolerate it.
                tracing::warn!(attempt, %error, "history poll failed, retrying");
            }
        }
        sleep(Duration::from_millis(config.interval_ms));
    }

    Err(PollError::Timeout {
        target: target_epoch,
        attempts: config.max_attempts,
    })
}

/// [`poll_history`] with a real thread sleep between attempts.
pub fn poll_history_blocking<B>(
    backend: &mut B,
    target_epoch: u64,
    config: &PollConfig,
) -> Result<PollOutcome, PollError>
where
    B: SimulationBackend + ?Sized,
{
    poll_history(backend, target_epoch, config, std::thread::sleep)
}

/// Convenience: a transient error wrapper when a caller wants to surface a
/// backend failure alongside a poll failure.
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Poll(#[from] PollError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use world_model::{WorldGraph, WorldLayout};

    fn quiet_config(max_attempts: u32, stagnation_limit: u32) -> PollConfig {
        PollConfig {
            interval_ms: 0,
            max_attempts,
            stagnation_limit,
        }
    }

    fn backend_with_batches(batches: Vec<Vec<String>>) -> MemoryBackend {
        let mut backend =
            MemoryBackend::new(WorldLayout::new(3, 3), WorldGraph::default(), Vec::new());
        for batch in batches {
            backend.push_history_batch(batch);
        }
        backend
    }

    #[test]
    fn test_poll_reaches_target() {
        let mut backend = backend_with_batches(vec![
            vec![r#"{"age":1,"event_type":"settlement_founded"}"#.to_string()],
            vec![r#"{"age":2,"event_type":"raid_start"}"#.to_string()],
            vec![r#"{"age":3,"event_type":"leader_death"}"#.to_string()],
        ]);

        let outcome = poll_history(&mut backend, 3, &quiet_config(10, 4), |_| {}).unwrap();
        match outcome {
            PollOutcome::Reached { index, attempts } => {
                assert_eq!(index.max_epoch(), 3);
                assert!(attempts <= 4);
            }
            other => panic!("expected Reached, got {:?}", other),
        }
    }

    #[test]
    fn test_poll_stagnates() {
        let mut backend = backend_with_batches(vec![vec![
            r#"{"age":2,"event_type":"raid_start"}"#.to_string(),
        ]]);

        let outcome = poll_history(&mut backend, 50, &quiet_config(100, 3), |_| {}).unwrap();
        match outcome {
            PollOutcome::Stagnated { index, attempts } => {
                assert_eq!(index.max_epoch(), 2);
                // One advancing poll, then the stagnation window.
                assert!(attempts <= 6);
            }
            other => panic!("expected Stagnated, got {:?}", other),
        }
    }

    #[test]
    fn test_poll_times_out_without_stagnation_detector() {
        let mut backend = backend_with_batches(vec![]);

        // stagnation_limit 0 disables early exit, so the ceiling must trip.
        let result = poll_history(&mut backend, 5, &quiet_config(7, 0), |_| {});
        match result {
            Err(PollError::Timeout { target, attempts }) => {
                assert_eq!(target, 5);
                assert_eq!(attempts, 7);
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_poll_counts_sleeps() {
        let mut backend = backend_with_batches(vec![]);
        let mut sleeps = 0u32;
        let _ = poll_history(&mut backend, 5, &quiet_config(4, 0), |_| sleeps += 1);
        assert_eq!(sleeps, 4);
    }

    #[test]
    fn test_stagnation_detector() {
        let mut detector = StagnationDetector::new(3);
        assert!(!detector.observe(1));
        assert!(!detector.observe(1));
        assert!(!detector.observe(1));
        assert!(detector.observe(1));
        // Progress resets the window.
        assert!(!detector.observe(2));
        assert!(!detector.observe(2));
    }
}
