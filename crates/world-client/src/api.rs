//! Backend contract: payload shapes and the capability trait.
//!
//! The viewer treats the generator as a black box returning these shapes.
//! Transport is deliberately abstracted behind [`SimulationBackend`] so a
//! file observer, an in-memory fake, or a network client can stand in.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use world_model::{Entity, WorldGraph, WorldLayout};

/// Width/height bounds the backend enforces on world builds.
pub const BUILD_SIZE_RANGE: std::ops::RangeInclusive<u32> = 2..=20;

/// Errors crossing the backend boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("failed to decode backend payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
}

/// `latest_layout` arrives either bare or wrapped in `{"layout": …}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LayoutResponse {
    Wrapped { layout: WorldLayout },
    Bare(WorldLayout),
}

impl LayoutResponse {
    /// Unwraps either shape into the layout itself.
    pub fn into_layout(self) -> WorldLayout {
        match self {
            LayoutResponse::Wrapped { layout } => layout,
            LayoutResponse::Bare(layout) => layout,
        }
    }
}

/// `latest_entities` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitiesResponse {
    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// `history_logs` payload: one JSON-encoded event per string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryLogsResponse {
    #[serde(default)]
    pub logs: Vec<String>,
}

/// `status` payload.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BackendStatus {
    #[serde(default)]
    pub running: bool,
}

/// `build` request body. Triggers world (re)generation and invalidates every
/// client cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biome_ids: Option<Vec<String>>,
}

impl BuildRequest {
    /// Creates a build request for the given grid size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            biome_ids: None,
        }
    }

    /// Restricts generation to the given biome definitions.
    pub fn with_biomes(mut self, biome_ids: Vec<String>) -> Self {
        self.biome_ids = Some(biome_ids);
        self
    }

    /// Validates against the backend's size bounds before sending.
    pub fn validate(&self) -> Result<(), BackendError> {
        if !BUILD_SIZE_RANGE.contains(&self.width) || !BUILD_SIZE_RANGE.contains(&self.height) {
            return Err(BackendError::InvalidRequest(format!(
                "world size {}x{} outside allowed range {}..={}",
                self.width,
                self.height,
                BUILD_SIZE_RANGE.start(),
                BUILD_SIZE_RANGE.end()
            )));
        }
        Ok(())
    }
}

/// `run` request body: advance the simulation by this many epochs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunRequest {
    pub epochs: u64,
}

/// The operations the viewer consumes, one method per endpoint.
///
/// Mutating operations are fire-and-forget on the backend side; the caller
/// observes progress by polling `fetch_history_logs` (see [`crate::poll`]).
pub trait SimulationBackend {
    /// `GET latest_layout`.
    fn fetch_layout(&self) -> Result<WorldLayout, BackendError>;

    /// `GET latest_entities`.
    fn fetch_entities(&self) -> Result<Vec<Entity>, BackendError>;

    /// `GET world/graph?exclude_tags=…` / `GET latest_graph`.
    ///
    /// Entities carrying any of `exclude_tags` are absent from the result,
    /// along with relations that lost an endpoint.
    fn fetch_graph(&self, exclude_tags: &[String]) -> Result<WorldGraph, BackendError>;

    /// `GET history_logs`.
    fn fetch_history_logs(&self) -> Result<Vec<String>, BackendError>;

    /// `GET status`.
    fn status(&self) -> Result<BackendStatus, BackendError>;

    /// `POST build`.
    fn start_build(&mut self, request: &BuildRequest) -> Result<(), BackendError>;

    /// `POST run`.
    fn start_run(&mut self, request: &RunRequest) -> Result<(), BackendError>;
}

/// Applies an exclude-tags filter the way the backend's graph endpoint does:
/// tagged entities disappear, then relations missing an endpoint follow.
pub fn apply_exclude_tags(mut graph: WorldGraph, exclude_tags: &[String]) -> WorldGraph {
    if exclude_tags.is_empty() {
        return graph;
    }
    let WorldGraph {
        entities, relations, ..
    } = &mut graph;
    entities.retain(|_, entity| !entity.has_any_tag(exclude_tags.iter().map(String::as_str)));
    relations.retain(|relation| {
        entities.contains_key(&relation.from_entity.id)
            && entities.contains_key(&relation.to_entity.id)
    });
    graph
}
