//! Shared world data types for the chronicle viewer.
//!
//! This crate contains pure data structures and pure algorithms with no I/O
//! beyond serde. It is a dependency for all other crates in the workspace.

pub mod entity;
pub mod event;
pub mod filter;
pub mod graph;
pub mod history;
pub mod layout;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export entity types
pub use entity::{Entity, EntityData, EntityKind, Relation, RelationKind, RelationTypeRecord};

// Re-export event types
pub use event::{EventClass, EventEntityRef, HistoryEvent};

// Re-export filter types
pub use filter::{EdgeKind, GraphTemporalFilter, VisibleEdge, VisibleSet, DEFAULT_EXCLUDED_TAGS};

// Re-export graph types
pub use graph::WorldGraph;

// Re-export history types
pub use history::HistoryIndex;

// Re-export layout types
pub use layout::{parse_coord_key, WorldLayout};
