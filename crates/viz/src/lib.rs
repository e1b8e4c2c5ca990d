//! Visualization layer: Bevy-based world viewer.

pub mod camera;
pub mod debug;
pub mod effects;
pub mod graph;
pub mod loader;
pub mod map;
pub mod overlay;
pub mod palette;
pub mod playback;
pub mod plugin;
pub mod tile_layout;

pub use plugin::WorldVizPlugin;
