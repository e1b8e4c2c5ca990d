//! In-memory backend for tests and demo mode.

use std::collections::VecDeque;
use std::sync::Mutex;

use world_model::{Entity, WorldGraph, WorldLayout};

use crate::api::{
    apply_exclude_tags, BackendError, BackendStatus, BuildRequest, RunRequest, SimulationBackend,
};

/// A scripted backend holding everything in memory.
///
/// History can be staged in batches with [`push_history_batch`]; each
/// `fetch_history_logs` call reveals one staged batch, which makes the
/// polling driver observable without a real simulation behind it.
///
/// [`push_history_batch`]: MemoryBackend::push_history_batch
pub struct MemoryBackend {
    layout: WorldLayout,
    graph: WorldGraph,
    history: Mutex<Vec<String>>,
    pending: Mutex<VecDeque<Vec<String>>>,
    running: bool,
}

impl MemoryBackend {
    /// Creates a backend serving fixed data.
    pub fn new(layout: WorldLayout, graph: WorldGraph, history: Vec<String>) -> Self {
        Self {
            layout,
            graph,
            history: Mutex::new(history),
            pending: Mutex::new(VecDeque::new()),
            running: false,
        }
    }

    /// Stages a batch of log lines revealed by the next history fetch.
    pub fn push_history_batch(&mut self, lines: Vec<String>) {
        self.pending.lock().expect("pending lock").push_back(lines);
    }

    /// Replaces the served graph (e.g. after a scripted "build").
    pub fn set_graph(&mut self, graph: WorldGraph) {
        self.graph = graph;
    }
}

impl SimulationBackend for MemoryBackend {
    fn fetch_layout(&self) -> Result<WorldLayout, BackendError> {
        Ok(self.layout.clone())
    }

    fn fetch_entities(&self) -> Result<Vec<Entity>, BackendError> {
        Ok(self.graph.entities.values().cloned().collect())
    }

    fn fetch_graph(&self, exclude_tags: &[String]) -> Result<WorldGraph, BackendError> {
        Ok(apply_exclude_tags(self.graph.clone(), exclude_tags))
    }

    fn fetch_history_logs(&self) -> Result<Vec<String>, BackendError> {
        let mut history = self.history.lock().expect("history lock");
        if let Some(batch) = self.pending.lock().expect("pending lock").pop_front() {
            history.extend(batch);
        }
        Ok(history.clone())
    }

    fn status(&self) -> Result<BackendStatus, BackendError> {
        Ok(BackendStatus {
            running: self.running || !self.pending.lock().expect("pending lock").is_empty(),
        })
    }

    fn start_build(&mut self, request: &BuildRequest) -> Result<(), BackendError> {
        request.validate()?;
        self.layout = WorldLayout::new(request.width, request.height);
        self.graph = WorldGraph::default();
        self.history.lock().expect("history lock").clear();
        self.pending.lock().expect("pending lock").clear();
        Ok(())
    }

    fn start_run(&mut self, _request: &RunRequest) -> Result<(), BackendError> {
        self.running = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_model::fixtures;

    #[test]
    fn test_fetch_graph_excludes_tags() {
        let backend = MemoryBackend::new(
            fixtures::sample_layout(),
            fixtures::sample_graph(),
            Vec::new(),
        );
        let graph = backend.fetch_graph(&["dead".to_string()]).unwrap();
        assert!(graph.get("c_old_king_f6").is_none());
        let graph = backend.fetch_graph(&[]).unwrap();
        assert!(graph.get("c_old_king_f6").is_some());
    }

    #[test]
    fn test_history_batches_reveal_one_per_fetch() {
        let mut backend = MemoryBackend::new(
            fixtures::sample_layout(),
            WorldGraph::default(),
            vec!["a".to_string()],
        );
        backend.push_history_batch(vec!["b".to_string()]);
        backend.push_history_batch(vec!["c".to_string()]);

        assert_eq!(backend.fetch_history_logs().unwrap(), vec!["a", "b"]);
        assert_eq!(backend.fetch_history_logs().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(backend.fetch_history_logs().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_build_resets_state() {
        let mut backend = MemoryBackend::new(
            fixtures::sample_layout(),
            fixtures::sample_graph(),
            fixtures::sample_history_lines(),
        );
        backend.start_build(&BuildRequest::new(4, 4)).unwrap();

        assert_eq!(backend.fetch_layout().unwrap().width, 4);
        assert!(backend.fetch_entities().unwrap().is_empty());
        assert!(backend.fetch_history_logs().unwrap().is_empty());
    }

    #[test]
    fn test_build_rejects_bad_size() {
        let mut backend =
            MemoryBackend::new(WorldLayout::new(3, 3), WorldGraph::default(), Vec::new());
        let result = backend.start_build(&BuildRequest::new(1, 50));
        assert!(matches!(result, Err(BackendError::InvalidRequest(_))));
        // State untouched after the rejected request.
        assert_eq!(backend.fetch_layout().unwrap().width, 3);
    }
}
