//! World chronicle viewer.
//!
//! Run with: cargo run -p viz
//!
//! Examples:
//!   cargo run -p viz -- --demo --autoplay
//!   cargo run -p viz -- --backend-dir ../generator --watch-epochs 20

use bevy::prelude::*;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use viz::graph::GraphFilter;
use viz::loader::{LoaderSettings, WorldBackend};
use viz::playback::PlaybackSettings;
use viz::WorldVizPlugin;
use world_client::{ClientConfig, FileBackend, MemoryBackend, SimulationBackend};
use world_model::fixtures;

/// World chronicle viewer
#[derive(Parser, Debug)]
#[command(name = "viz")]
#[command(about = "Map and graph viewer for generated world chronicles")]
struct Args {
    /// Generator working directory to observe
    #[arg(long, default_value = "world_data")]
    backend_dir: PathBuf,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serve a built-in sample world instead of reading a backend directory
    #[arg(long)]
    demo: bool,

    /// Wall-clock duration of one epoch in milliseconds (overrides config)
    #[arg(long)]
    epoch_ms: Option<u64>,

    /// Start playback as soon as the world is loaded
    #[arg(long)]
    autoplay: bool,

    /// Poll the history log in the background until this epoch is observed
    #[arg(long)]
    watch_epochs: Option<u64>,
}

fn main() {
    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => match ClientConfig::from_file(path) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("failed to load config {}: {}", path.display(), error);
                std::process::exit(1);
            }
        },
        None => ClientConfig::default(),
    };

    let playback = PlaybackSettings {
        epoch_duration: Duration::from_millis(
            args.epoch_ms.unwrap_or(config.playback.epoch_duration_ms),
        ),
        autoplay: args.autoplay || config.playback.autoplay,
    };

    let (backend, watch_dir): (Box<dyn SimulationBackend + Send + Sync>, Option<PathBuf>) =
        if args.demo {
            let backend = MemoryBackend::new(
                fixtures::sample_layout(),
                fixtures::sample_graph(),
                fixtures::sample_history_lines(),
            );
            (Box::new(backend), None)
        } else {
            let backend = FileBackend::new(&args.backend_dir);
            let watch_dir = backend.watch_dir();
            (Box::new(backend), Some(watch_dir))
        };

    let mut filter = GraphFilter::default();
    filter.filter.excluded_tags = config.graph.exclude_tags.iter().cloned().collect();

    App::new()
        .insert_resource(WorldBackend(backend))
        .insert_resource(LoaderSettings {
            watch_dir,
            watch_target: args.watch_epochs,
            poll: config.poll.clone(),
        })
        .insert_resource(playback)
        .insert_resource(filter)
        .add_plugins(WorldVizPlugin)
        .run();
}
