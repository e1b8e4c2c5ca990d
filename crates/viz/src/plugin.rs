//! Main visualization plugin that ties all systems together.

use bevy::prelude::*;

use crate::camera::CameraPlugin;
use crate::debug::DebugPlugin;
use crate::effects::EffectsPlugin;
use crate::graph::GraphViewPlugin;
use crate::loader::LoaderPlugin;
use crate::map::MapPlugin;
use crate::overlay::OverlayPlugin;
use crate::playback::PlaybackPlugin;

/// Which of the two views is on screen. Tab switches.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Map,
    Graph,
}

/// Main plugin for the world viewer.
///
/// Sets up the window, registers all sub-plugins, and owns the view-mode
/// toggle.
pub struct WorldVizPlugin;

impl Plugin for WorldVizPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "World Chronicle".into(),
                        resolution: (1280., 720.).into(),
                        ..default()
                    }),
                    ..default()
                })
                .set(ImagePlugin::default_nearest()), // Pixel-perfect rendering
        )
        .init_resource::<ViewMode>()
        .add_plugins((
            LoaderPlugin,
            CameraPlugin,
            PlaybackPlugin,
            MapPlugin,
            EffectsPlugin,
            GraphViewPlugin,
            OverlayPlugin,
            DebugPlugin,
        ))
        .add_systems(Update, toggle_view_mode);
    }
}

fn toggle_view_mode(keyboard: Res<ButtonInput<KeyCode>>, mut mode: ResMut<ViewMode>) {
    if keyboard.just_pressed(KeyCode::Tab) {
        *mode = match *mode {
            ViewMode::Map => ViewMode::Graph,
            ViewMode::Graph => ViewMode::Map,
        };
        tracing::info!(mode = ?*mode, "view mode toggled");
    }
}
