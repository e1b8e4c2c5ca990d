//! Client side of the world generator's contract.
//!
//! This crate defines the payload shapes the backend serves, a capability
//! trait over the handful of operations the viewer consumes, file and
//! in-memory implementations of that trait, and the bounded polling driver
//! used while the backend grinds through a simulation run.

pub mod api;
pub mod config;
pub mod fs;
pub mod memory;
pub mod poll;

pub use api::{
    BackendError, BackendStatus, BuildRequest, EntitiesResponse, HistoryLogsResponse,
    LayoutResponse, RunRequest, SimulationBackend,
};
pub use config::{ClientConfig, ConfigError, GraphConfig, PlaybackConfig};
pub use fs::FileBackend;
pub use memory::MemoryBackend;
pub use poll::{poll_history, poll_history_blocking, PollConfig, PollError, PollOutcome, StagnationDetector};
