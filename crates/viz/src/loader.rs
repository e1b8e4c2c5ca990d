//! World loading: backend access, file watching, and the poll bridge.
//!
//! The viewer observes a generator it does not own. State arrives three
//! ways: an initial fetch at startup, a `notify` watcher on the generator's
//! output directory, and an optional worker thread that polls the history
//! log while a simulation run grinds in the background. A failed load keeps
//! the previous world on screen and records the error for the overlay.

use bevy::prelude::*;
use notify::{Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Mutex;
use std::time::Instant;

use world_client::{
    poll_history_blocking, FileBackend, PollConfig, PollError, PollOutcome, SimulationBackend,
};
use world_model::{HistoryIndex, WorldGraph, WorldLayout};

use crate::camera::ContentSize;
use crate::playback::{PlaybackSettings, PlaybackState};
use crate::tile_layout::{build_render_cache, RenderCache, TILE_SIZE};

/// The backend the viewer reads from.
#[derive(Resource)]
pub struct WorldBackend(pub Box<dyn SimulationBackend + Send + Sync>);

/// Loader knobs, inserted by the binary.
#[derive(Resource, Debug, Default, Clone)]
pub struct LoaderSettings {
    /// Directory to watch for generator output changes; `None` disables the
    /// watcher (demo mode).
    pub watch_dir: Option<PathBuf>,
    /// When set, a worker thread polls the history log until this epoch is
    /// observed, the log stagnates, or the attempt ceiling trips.
    pub watch_target: Option<u64>,
    pub poll: PollConfig,
}

/// The currently loaded world.
#[derive(Resource, Default)]
pub struct WorldState {
    pub layout: WorldLayout,
    pub graph: WorldGraph,
    pub history: HistoryIndex,
    pub last_update: Option<Instant>,
    pub last_error: Option<String>,
}

impl WorldState {
    /// True once any world has been loaded.
    pub fn has_world(&self) -> bool {
        self.last_update.is_some()
    }
}

/// Emitted whenever the loaded world changed.
#[derive(Event)]
pub struct WorldUpdatedEvent;

/// Plugin for world loading and refresh.
pub struct LoaderPlugin;

impl Plugin for LoaderPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<LoaderSettings>() {
            app.init_resource::<LoaderSettings>();
        }
        app.init_resource::<WorldState>()
            .init_resource::<RenderCache>()
            .init_resource::<PollBridgeStatus>()
            .add_event::<WorldUpdatedEvent>()
            .add_systems(Startup, (initial_load, start_poll_bridge))
            .add_systems(
                Update,
                (check_file_updates, drain_poll_bridge, handle_reload_key),
            );
    }
}

/// Fetches everything from the backend and rebuilds derived state.
///
/// Returns true when the world was replaced. On any fetch failure the
/// previous state stays untouched; the error is recorded and logged.
pub fn load_world(
    backend: &dyn SimulationBackend,
    state: &mut WorldState,
    cache: &mut RenderCache,
    playback: &mut PlaybackState,
    content: &mut ContentSize,
) -> bool {
    let fetched = backend.fetch_layout().and_then(|layout| {
        let graph = backend.fetch_graph(&[])?;
        let lines = backend.fetch_history_logs()?;
        Ok((layout, graph, lines))
    });

    match fetched {
        Ok((layout, graph, lines)) => {
            state.history = HistoryIndex::build(lines.iter().map(String::as_str));
            *cache = build_render_cache(&layout, &graph);
            content.width = layout.width as f32 * TILE_SIZE;
            content.height = layout.height as f32 * TILE_SIZE;
            playback.set_max_epoch(state.history.max_epoch());

            tracing::info!(
                entities = graph.len(),
                events = state.history.len(),
                max_epoch = state.history.max_epoch(),
                "world loaded"
            );
            state.layout = layout;
            state.graph = graph;
            state.last_update = Some(Instant::now());
            state.last_error = None;
            true
        }
        Err(error) => {
            tracing::error!(%error, "world load failed, keeping previous state");
            state.last_error = Some(error.to_string());
            false
        }
    }
}

fn initial_load(
    backend: Res<WorldBackend>,
    settings: Res<PlaybackSettings>,
    mut state: ResMut<WorldState>,
    mut cache: ResMut<RenderCache>,
    mut playback: ResMut<PlaybackState>,
    mut content: ResMut<ContentSize>,
    mut events: EventWriter<WorldUpdatedEvent>,
) {
    if load_world(
        backend.0.as_ref(),
        &mut state,
        &mut cache,
        &mut playback,
        &mut content,
    ) {
        events.send(WorldUpdatedEvent);
        if settings.autoplay && playback.max_epoch > 0 {
            playback.play();
        }
    }
}

/// File watching state held in a `Local` (the watcher is not `Sync`).
#[derive(Default)]
struct FileWatcherState {
    watcher: Option<RecommendedWatcher>,
    rx: Option<Receiver<Result<NotifyEvent, notify::Error>>>,
    initialized: bool,
}

impl FileWatcherState {
    fn ensure_initialized(&mut self, watch_dir: Option<&PathBuf>) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        let Some(dir) = watch_dir else {
            return;
        };
        let (tx, rx) = channel();
        match RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        ) {
            Ok(mut watcher) => {
                if dir.exists() {
                    if let Err(e) = watcher.watch(dir, RecursiveMode::Recursive) {
                        tracing::warn!("failed to watch {:?}: {}", dir, e);
                    } else {
                        tracing::info!("watching directory: {:?}", dir);
                    }
                } else {
                    tracing::info!("watch directory {:?} does not exist yet", dir);
                }
                self.watcher = Some(watcher);
                self.rx = Some(rx);
            }
            Err(e) => {
                tracing::error!("failed to create file watcher: {}", e);
            }
        }
    }
}

/// Reloads the world when generator output files change on disk.
fn check_file_updates(
    mut watcher_state: Local<FileWatcherState>,
    settings: Res<LoaderSettings>,
    backend: Res<WorldBackend>,
    mut state: ResMut<WorldState>,
    mut cache: ResMut<RenderCache>,
    mut playback: ResMut<PlaybackState>,
    mut content: ResMut<ContentSize>,
    mut events: EventWriter<WorldUpdatedEvent>,
) {
    watcher_state.ensure_initialized(settings.watch_dir.as_ref());
    let Some(ref rx) = watcher_state.rx else {
        return;
    };

    let mut relevant = false;
    while let Ok(result) = rx.try_recv() {
        match result {
            Ok(event) => {
                let touches_data = event.paths.iter().any(|p| {
                    p.extension()
                        .map_or(false, |ext| ext == "json" || ext == "jsonl")
                });
                if touches_data
                    && matches!(
                        event.kind,
                        notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                    )
                {
                    relevant = true;
                }
            }
            Err(e) => tracing::warn!("file watcher error: {}", e),
        }
    }

    if relevant {
        tracing::debug!("generator output changed, reloading");
        if load_world(
            backend.0.as_ref(),
            &mut state,
            &mut cache,
            &mut playback,
            &mut content,
        ) {
            events.send(WorldUpdatedEvent);
        }
    }
}

/// R forces a reload.
fn handle_reload_key(
    keyboard: Res<ButtonInput<KeyCode>>,
    backend: Res<WorldBackend>,
    mut state: ResMut<WorldState>,
    mut cache: ResMut<RenderCache>,
    mut playback: ResMut<PlaybackState>,
    mut content: ResMut<ContentSize>,
    mut events: EventWriter<WorldUpdatedEvent>,
) {
    if keyboard.just_pressed(KeyCode::KeyR) {
        tracing::info!("manual reload triggered");
        if load_world(
            backend.0.as_ref(),
            &mut state,
            &mut cache,
            &mut playback,
            &mut content,
        ) {
            events.send(WorldUpdatedEvent);
        }
    }
}

/// Messages the poll worker thread reports back to the frame loop.
#[derive(Debug)]
enum PollMessage {
    Finished { max_epoch: u64, stagnated: bool },
    TimedOut { attempts: u32 },
}

/// Receiver side of the poll worker, drained once per frame.
#[derive(Resource)]
struct PollBridge {
    rx: Mutex<Receiver<PollMessage>>,
}

/// Human-readable poll progress for the overlay.
#[derive(Resource, Debug, Default)]
pub struct PollBridgeStatus(pub Option<String>);

/// Spawns the poll worker when a watch target was requested.
fn start_poll_bridge(
    mut commands: Commands,
    settings: Res<LoaderSettings>,
    mut status: ResMut<PollBridgeStatus>,
) {
    let Some(target) = settings.watch_target else {
        return;
    };
    let Some(dir) = settings
        .watch_dir
        .as_ref()
        .and_then(|d| d.parent().map(PathBuf::from))
    else {
        tracing::warn!("--watch-epochs needs a file backend, ignoring");
        return;
    };

    let poll_config = settings.poll.clone();
    let (tx, rx) = channel();
    std::thread::spawn(move || {
        let mut backend = FileBackend::new(dir);
        let message = match poll_history_blocking(&mut backend, target, &poll_config) {
            Ok(PollOutcome::Reached { index, .. }) => PollMessage::Finished {
                max_epoch: index.max_epoch(),
                stagnated: false,
            },
            Ok(PollOutcome::Stagnated { index, .. }) => PollMessage::Finished {
                max_epoch: index.max_epoch(),
                stagnated: true,
            },
            Err(PollError::Timeout { attempts, .. }) => PollMessage::TimedOut { attempts },
        };
        let _ = tx.send(message);
    });

    status.0 = Some(format!("polling history until epoch {}", target));
    commands.insert_resource(PollBridge { rx: Mutex::new(rx) });
    tracing::info!(target, "poll bridge started");
}

/// Drains poll worker messages and refreshes the world on completion.
fn drain_poll_bridge(
    bridge: Option<Res<PollBridge>>,
    backend: Res<WorldBackend>,
    mut status: ResMut<PollBridgeStatus>,
    mut state: ResMut<WorldState>,
    mut cache: ResMut<RenderCache>,
    mut playback: ResMut<PlaybackState>,
    mut content: ResMut<ContentSize>,
    mut events: EventWriter<WorldUpdatedEvent>,
) {
    let Some(bridge) = bridge else {
        return;
    };
    let Ok(rx) = bridge.rx.lock() else {
        return;
    };

    loop {
        match rx.try_recv() {
            Ok(PollMessage::Finished {
                max_epoch,
                stagnated,
            }) => {
                status.0 = Some(if stagnated {
                    format!("history stagnated at epoch {}", max_epoch)
                } else {
                    format!("history reached epoch {}", max_epoch)
                });
                if load_world(
                    backend.0.as_ref(),
                    &mut state,
                    &mut cache,
                    &mut playback,
                    &mut content,
                ) {
                    events.send(WorldUpdatedEvent);
                }
            }
            Ok(PollMessage::TimedOut { attempts }) => {
                status.0 = Some(format!("history poll timed out after {} attempts", attempts));
                tracing::warn!(attempts, "history poll timed out");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
}
