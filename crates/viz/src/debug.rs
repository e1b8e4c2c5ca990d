//! Debug overlay for development information display.
//!
//! Shows FPS, camera state, scene counts, and the last load error.
//! Toggle with F3.

use bevy::prelude::*;
use std::collections::VecDeque;

use crate::camera::CameraController;
use crate::graph::GraphView;
use crate::loader::WorldState;
use crate::map::MarkerIndex;
use crate::playback::PlaybackState;

/// Plugin for the debug overlay.
pub struct DebugPlugin;

impl Plugin for DebugPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugOverlay>()
            .add_systems(Startup, setup_debug_overlay)
            .add_systems(Update, (toggle_debug_overlay, update_debug_display));
    }
}

/// Resource controlling debug overlay settings.
#[derive(Resource, Default)]
pub struct DebugOverlay {
    /// Whether the debug overlay is visible.
    pub enabled: bool,
}

#[derive(Component)]
struct DebugOverlayContainer;

#[derive(Component)]
struct DebugText;

/// Rolling FPS window.
#[derive(Default)]
struct FpsHistory {
    history: VecDeque<f32>,
}

impl FpsHistory {
    fn push(&mut self, fps: f32) {
        self.history.push_back(fps);
        if self.history.len() > 60 {
            self.history.pop_front();
        }
    }

    fn average(&self) -> f32 {
        if self.history.is_empty() {
            0.0
        } else {
            self.history.iter().sum::<f32>() / self.history.len() as f32
        }
    }
}

fn setup_debug_overlay(mut commands: Commands) {
    commands
        .spawn((
            NodeBundle {
                style: Style {
                    position_type: PositionType::Absolute,
                    top: Val::Px(40.0), // Below status bar
                    left: Val::Px(10.0),
                    padding: UiRect::all(Val::Px(10.0)),
                    flex_direction: FlexDirection::Column,
                    ..default()
                },
                background_color: Color::srgba(0.0, 0.0, 0.0, 0.8).into(),
                visibility: Visibility::Hidden,
                ..default()
            },
            DebugOverlayContainer,
        ))
        .with_children(|parent| {
            parent.spawn(TextBundle::from_section(
                "DEBUG (F3 to toggle)",
                TextStyle {
                    font_size: 14.0,
                    color: Color::srgb(0.9, 0.9, 0.3),
                    ..default()
                },
            ));
            parent.spawn((
                TextBundle::from_section(
                    "",
                    TextStyle {
                        font_size: 12.0,
                        color: Color::srgb(0.8, 0.8, 0.8),
                        ..default()
                    },
                ),
                DebugText,
            ));
        });
}

fn toggle_debug_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut debug_overlay: ResMut<DebugOverlay>,
    mut container: Query<&mut Visibility, With<DebugOverlayContainer>>,
) {
    if keyboard.just_pressed(KeyCode::F3) {
        debug_overlay.enabled = !debug_overlay.enabled;
        for mut visibility in container.iter_mut() {
            *visibility = if debug_overlay.enabled {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            };
        }
    }
}

fn update_debug_display(
    debug_overlay: Res<DebugOverlay>,
    camera: Res<CameraController>,
    state: Res<WorldState>,
    playback: Res<PlaybackState>,
    graph_view: Res<GraphView>,
    markers: Res<MarkerIndex>,
    time: Res<Time>,
    mut fps_history: Local<FpsHistory>,
    mut debug_text: Query<&mut Text, With<DebugText>>,
) {
    if !debug_overlay.enabled {
        return;
    }

    let dt = time.delta_seconds();
    if dt > 0.0 {
        fps_history.push(1.0 / dt);
    }
    let avg_fps = fps_history.average();

    let mut lines = vec![
        format!("FPS: {:.0}{}", avg_fps, if avg_fps < 30.0 { " LOW!" } else { "" }),
        format!("Camera: ({:.0}, {:.0})", camera.x, camera.y),
        format!("Zoom: {:.2}x", camera.zoom),
        format!(
            "Epoch: {} + {:.2}",
            playback.current_epoch, playback.progress
        ),
        format!("Entities: {}", state.graph.len()),
        format!("Tiles: {}  Markers: {}", markers.tile_count(), markers.marker_count()),
        format!(
            "Graph: {} nodes, {} edges",
            graph_view.node_count(),
            graph_view.edge_count()
        ),
    ];
    if let Some(ref error) = state.last_error {
        lines.push(format!("ERROR: {}", error));
    }

    for mut text in debug_text.iter_mut() {
        if let Some(section) = text.sections.first_mut() {
            section.value = lines.join("\n");
            section.style.color = if avg_fps < 30.0 {
                Color::srgb(1.0, 0.3, 0.3)
            } else {
                Color::srgb(0.8, 0.8, 0.8)
            };
        }
    }
}
