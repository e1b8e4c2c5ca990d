//! UI overlays: status bar, kind legend, and control hints.

use bevy::prelude::*;

use crate::graph::{GraphFilter, KIND_TOGGLE_ORDER};
use crate::loader::{PollBridgeStatus, WorldState};
use crate::palette;
use crate::playback::PlaybackState;
use crate::plugin::ViewMode;

/// Plugin for UI overlay rendering.
pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_overlay)
            .add_systems(Update, (update_status_bar, update_legend));
    }
}

#[derive(Component)]
struct StatusText;

#[derive(Component)]
struct LegendText;

fn setup_overlay(mut commands: Commands) {
    // Status bar across the top.
    commands
        .spawn(NodeBundle {
            style: Style {
                position_type: PositionType::Absolute,
                top: Val::Px(0.0),
                left: Val::Px(0.0),
                right: Val::Px(0.0),
                padding: UiRect::all(Val::Px(8.0)),
                ..default()
            },
            background_color: Color::srgba(0.0, 0.0, 0.0, 0.7).into(),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                TextBundle::from_section(
                    "loading…",
                    TextStyle {
                        font_size: 14.0,
                        color: Color::srgb(0.9, 0.9, 0.9),
                        ..default()
                    },
                ),
                StatusText,
            ));
        });

    // Kind legend, bottom-left.
    commands
        .spawn(NodeBundle {
            style: Style {
                position_type: PositionType::Absolute,
                bottom: Val::Px(30.0),
                left: Val::Px(10.0),
                padding: UiRect::all(Val::Px(8.0)),
                flex_direction: FlexDirection::Column,
                ..default()
            },
            background_color: Color::srgba(0.0, 0.0, 0.0, 0.6).into(),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((TextBundle::default(), LegendText));
        });

    // Control hints along the bottom edge.
    commands
        .spawn(NodeBundle {
            style: Style {
                position_type: PositionType::Absolute,
                bottom: Val::Px(0.0),
                left: Val::Px(0.0),
                right: Val::Px(0.0),
                padding: UiRect::all(Val::Px(6.0)),
                ..default()
            },
            background_color: Color::srgba(0.0, 0.0, 0.0, 0.7).into(),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn(TextBundle::from_section(
                "[Space] play/pause  [,/.] step  [0/End] jump  [Tab] map/graph  \
                 [drag] pan  [wheel] zoom  [1-9] toggle kinds  [G] shuffle  [R] reload  [F3] debug",
                TextStyle {
                    font_size: 12.0,
                    color: Color::srgb(0.6, 0.6, 0.6),
                    ..default()
                },
            ));
        });
}

fn update_status_bar(
    playback: Res<PlaybackState>,
    mode: Res<ViewMode>,
    state: Res<WorldState>,
    poll_status: Res<PollBridgeStatus>,
    mut query: Query<&mut Text, With<StatusText>>,
) {
    let play_state = if playback.is_playing() {
        "playing"
    } else if playback.progress >= 1.0 {
        "finished"
    } else {
        "paused"
    };
    let view = match *mode {
        ViewMode::Map => "map",
        ViewMode::Graph => "graph",
    };

    let mut line = format!(
        "Epoch {}/{}  ·  {}  ·  {} view  ·  {} entities  ·  {} events this epoch",
        playback.current_epoch,
        playback.max_epoch,
        play_state,
        view,
        state.graph.len(),
        state.history.events_at(playback.current_epoch).len(),
    );
    if let Some(ref status) = poll_status.0 {
        line.push_str("  ·  ");
        line.push_str(status);
    }
    if let Some(ref error) = state.last_error {
        line.push_str("  ·  ERROR: ");
        line.push_str(error);
    }

    for mut text in query.iter_mut() {
        if let Some(section) = text.sections.first_mut() {
            section.value = line.clone();
        } else {
            *text = Text::from_section(
                line.clone(),
                TextStyle {
                    font_size: 14.0,
                    color: Color::srgb(0.9, 0.9, 0.9),
                    ..default()
                },
            );
        }
    }
}

fn update_legend(filter: Res<GraphFilter>, mut query: Query<&mut Text, With<LegendText>>) {
    if !filter.is_changed() {
        return;
    }

    let sections: Vec<TextSection> = KIND_TOGGLE_ORDER
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let hidden = filter.filter.is_hidden(kind);
            let label = if hidden {
                format!("{} {}  (off)\n", i + 1, kind)
            } else {
                format!("{} {}\n", i + 1, kind)
            };
            let color = if hidden {
                Color::srgb(0.4, 0.4, 0.4)
            } else {
                palette::kind_color(kind)
            };
            TextSection::new(
                label,
                TextStyle {
                    font_size: 12.0,
                    color,
                    ..default()
                },
            )
        })
        .collect();

    for mut text in query.iter_mut() {
        text.sections = sections.clone();
    }
}
