//! File-backed backend observing the generator's output directory.
//!
//! The generator writes `layouts/layout.json`, `world_output/history.jsonl`,
//! `world_output/world_final.json` and per-epoch snapshots under
//! `world_output/snapshots/`. This backend reads those files; it cannot
//! trigger builds or runs (it observes a process it does not own).

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use world_model::{Entity, WorldGraph, WorldLayout};

use crate::api::{
    apply_exclude_tags, BackendError, BackendStatus, BuildRequest, LayoutResponse, RunRequest,
    SimulationBackend,
};

const LAYOUT_FILE: &str = "layouts/layout.json";
const HISTORY_FILE: &str = "world_output/history.jsonl";
const FINAL_SNAPSHOT: &str = "world_output/world_final.json";
const SNAPSHOTS_DIR: &str = "world_output/snapshots";

/// Reads the generator's on-disk output.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Creates a backend rooted at the generator's working directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory worth watching for changes.
    pub fn watch_dir(&self) -> PathBuf {
        self.root.join("world_output")
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Picks the freshest graph file: the final snapshot when present, else
    /// the highest-numbered epoch snapshot.
    fn latest_graph_path(&self) -> Option<PathBuf> {
        let final_path = self.path(FINAL_SNAPSHOT);
        if final_path.exists() {
            return Some(final_path);
        }
        let mut snapshots: Vec<PathBuf> = fs::read_dir(self.path(SNAPSHOTS_DIR))
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().map_or(false, |ext| ext == "json")
                    && path
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .map_or(false, |stem| stem.starts_with("world_epoch_"))
            })
            .collect();
        snapshots.sort();
        snapshots.pop()
    }
}

/// World files wrap the graph in `{"graph": …}`; older snapshots are bare.
fn parse_graph_file(contents: &str) -> Result<WorldGraph, BackendError> {
    let value: Value = serde_json::from_str(contents)?;
    let graph_value = value.get("graph").cloned().unwrap_or(value);
    Ok(serde_json::from_value(graph_value)?)
}

impl SimulationBackend for FileBackend {
    fn fetch_layout(&self) -> Result<WorldLayout, BackendError> {
        let path = self.path(LAYOUT_FILE);
        if !path.exists() {
            // The backend serves an empty 10x10 grid before any build.
            return Ok(WorldLayout::new(10, 10));
        }
        let contents = fs::read_to_string(&path)?;
        let response: LayoutResponse = serde_json::from_str(&contents)?;
        Ok(response.into_layout())
    }

    fn fetch_entities(&self) -> Result<Vec<Entity>, BackendError> {
        let graph = self.fetch_graph(&[])?;
        Ok(graph.entities.into_values().collect())
    }

    fn fetch_graph(&self, exclude_tags: &[String]) -> Result<WorldGraph, BackendError> {
        let Some(path) = self.latest_graph_path() else {
            return Ok(WorldGraph::default());
        };
        let contents = fs::read_to_string(&path)?;
        let graph = parse_graph_file(&contents)?;
        tracing::debug!(path = %path.display(), entities = graph.len(), "loaded world graph");
        Ok(apply_exclude_tags(graph, exclude_tags))
    }

    fn fetch_history_logs(&self) -> Result<Vec<String>, BackendError> {
        let path = self.path(HISTORY_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    fn status(&self) -> Result<BackendStatus, BackendError> {
        // An observer cannot see the generator process itself.
        Ok(BackendStatus { running: false })
    }

    fn start_build(&mut self, _request: &BuildRequest) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("build"))
    }

    fn start_run(&mut self, _request: &RunRequest) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("run"))
    }
}

/// Writes the given world data into `root` using the generator's layout.
/// Test and demo helper.
pub fn write_world_dir(
    root: &Path,
    layout: &WorldLayout,
    graph: &WorldGraph,
    history_lines: &[String],
) -> Result<(), BackendError> {
    let layouts = root.join("layouts");
    let output = root.join("world_output");
    fs::create_dir_all(&layouts)?;
    fs::create_dir_all(output.join("snapshots"))?;

    fs::write(
        layouts.join("layout.json"),
        serde_json::to_string_pretty(layout)?,
    )?;
    let world = serde_json::json!({ "graph": graph });
    fs::write(
        output.join("world_final.json"),
        serde_json::to_string_pretty(&world)?,
    )?;
    fs::write(output.join("history.jsonl"), history_lines.join("\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_model::fixtures;

    #[test]
    fn test_missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());

        let layout = backend.fetch_layout().unwrap();
        assert_eq!((layout.width, layout.height), (10, 10));
        assert!(layout.cells.is_empty());
        assert!(backend.fetch_graph(&[]).unwrap().is_empty());
        assert!(backend.fetch_history_logs().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fixtures::sample_layout();
        let graph = fixtures::sample_graph();
        let lines = fixtures::sample_history_lines();
        write_world_dir(dir.path(), &layout, &graph, &lines).unwrap();

        let backend = FileBackend::new(dir.path());
        assert_eq!(backend.fetch_layout().unwrap().cell(0, 0), Some("b_forest"));
        assert_eq!(backend.fetch_graph(&[]).unwrap().len(), graph.len());
        assert_eq!(backend.fetch_history_logs().unwrap().len(), lines.len());

        let filtered = backend.fetch_graph(&["dead".to_string()]).unwrap();
        assert!(filtered.get("c_old_king_f6").is_none());
    }

    #[test]
    fn test_snapshot_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = dir.path().join("world_output/snapshots");
        fs::create_dir_all(&snapshots).unwrap();

        let early = serde_json::json!({"graph": {"entities": {}, "relations": []}});
        let late = serde_json::json!({"graph": {
            "entities": {"b_late": {"id": "b_late", "type": "Biome", "name": "Late"}},
            "relations": []
        }});
        fs::write(
            snapshots.join("world_epoch_0.json"),
            early.to_string(),
        )
        .unwrap();
        fs::write(
            snapshots.join("world_epoch_12.json"),
            late.to_string(),
        )
        .unwrap();

        let backend = FileBackend::new(dir.path());
        let graph = backend.fetch_graph(&[]).unwrap();
        assert!(graph.get("b_late").is_some());
    }

    #[test]
    fn test_bare_graph_file_tolerated() {
        let contents = r#"{"entities": {}, "relations": []}"#;
        assert!(parse_graph_file(contents).unwrap().is_empty());
        let contents = r#"{"graph": {"entities": {}, "relations": []}}"#;
        assert!(parse_graph_file(contents).unwrap().is_empty());
    }

    #[test]
    fn test_mutations_unsupported() {
        let mut backend = FileBackend::new("/nonexistent");
        assert!(matches!(
            backend.start_build(&BuildRequest::new(3, 3)),
            Err(BackendError::Unsupported(_))
        ));
        assert!(matches!(
            backend.start_run(&RunRequest { epochs: 5 }),
            Err(BackendError::Unsupported(_))
        ));
    }
}
