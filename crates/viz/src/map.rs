//! Map rendering: terrain tiles, grid lines, and entity markers.
//!
//! Draw order, back to front: background fill, terrain tiles, grid lines,
//! entity icons, then the animated event glyphs from `effects`. Terrain and
//! markers are diff-synced against the loaded world instead of being rebuilt,
//! so scrubbing the timeline never respawns the whole scene.

use bevy::prelude::*;
use std::collections::{HashMap, HashSet};

use world_model::EntityKind;

use crate::camera::{world_to_bevy, CameraController};
use crate::loader::{WorldState, WorldUpdatedEvent};
use crate::palette;
use crate::playback::PlaybackState;
use crate::plugin::ViewMode;
use crate::tile_layout::{tile_center, RenderCache, TILE_SIZE};

/// Grid lines are skipped below this zoom; they would be subpixel noise.
pub const GRID_ZOOM_CUTOFF: f32 = 0.5;

/// Whether grid lines are drawn at this zoom level.
pub fn grid_visible(zoom: f32) -> bool {
    zoom >= GRID_ZOOM_CUTOFF
}

/// Whether an entity born at `created_at` is visible at a fractional epoch.
pub fn born_by(created_at: u64, epoch: f64) -> bool {
    created_at <= epoch.floor() as u64
}

// Z layers, back to front.
const Z_BACKGROUND: f32 = -10.0;
const Z_TERRAIN: f32 = -5.0;
const Z_GRID: f32 = -2.0;
const Z_MARKER: f32 = 1.0;

/// Plugin for the 2D map view.
pub struct MapPlugin;

impl Plugin for MapPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MarkerIndex>()
            .add_systems(Startup, spawn_background)
            .add_systems(
                Update,
                (
                    (sync_terrain, sync_markers).run_if(on_event::<WorldUpdatedEvent>()),
                    update_map_visibility,
                )
                    .chain(),
            );
    }
}

#[derive(Component)]
struct MapBackground;

/// One terrain tile sprite.
#[derive(Component)]
pub struct TerrainTile {
    pub coord: (i64, i64),
}

/// One entity icon on the map.
#[derive(Component)]
pub struct EntityMarker {
    pub entity_id: String,
    pub created_at: u64,
}

/// Spawned scene handles, keyed for diffing.
#[derive(Resource, Default)]
pub struct MarkerIndex {
    tiles: HashMap<(i64, i64), Entity>,
    markers: HashMap<String, Entity>,
}

impl MarkerIndex {
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }
}

fn spawn_background(mut commands: Commands) {
    commands.spawn((
        SpriteBundle {
            sprite: Sprite {
                color: Color::srgb(0.08, 0.09, 0.11),
                custom_size: Some(Vec2::splat(20_000.0)),
                ..default()
            },
            transform: Transform::from_xyz(0.0, 0.0, Z_BACKGROUND),
            ..default()
        },
        MapBackground,
    ));
}

/// Diffs terrain tiles against the loaded layout.
fn sync_terrain(
    mut commands: Commands,
    state: Res<WorldState>,
    mut index: ResMut<MarkerIndex>,
    mut tiles: Query<&mut Sprite, With<TerrainTile>>,
) {
    let current: HashMap<(i64, i64), &str> = state.layout.iter_cells().collect();

    // Remove tiles whose cell vanished.
    let stale: Vec<(i64, i64)> = index
        .tiles
        .keys()
        .filter(|coord| !current.contains_key(coord))
        .copied()
        .collect();
    for coord in stale {
        if let Some(entity) = index.tiles.remove(&coord) {
            commands.entity(entity).despawn_recursive();
        }
    }

    for (coord, biome) in current {
        let color = palette::biome_color(biome);
        if let Some(&entity) = index.tiles.get(&coord) {
            // Cell may have been regenerated with a different biome.
            if let Ok(mut sprite) = tiles.get_mut(entity) {
                sprite.color = color;
            }
            continue;
        }
        let center = tile_center(coord.0, coord.1);
        let entity = commands
            .spawn((
                SpriteBundle {
                    sprite: Sprite {
                        color,
                        custom_size: Some(Vec2::splat(TILE_SIZE - 2.0)),
                        ..default()
                    },
                    transform: Transform::from_translation(world_to_bevy(center, Z_TERRAIN)),
                    ..default()
                },
                TerrainTile { coord },
            ))
            .id();
        index.tiles.insert(coord, entity);
    }

    // The grid is cheap enough to rebuild whenever the layout changes.
    rebuild_grid(&mut commands, &state);
}

#[derive(Component)]
struct GridRoot;

fn rebuild_grid(commands: &mut Commands, state: &WorldState) {
    let width = state.layout.width as f32 * TILE_SIZE;
    let height = state.layout.height as f32 * TILE_SIZE;
    let color = Color::srgba(0.9, 0.9, 0.9, 0.12);

    // One root so the old grid disappears in a single despawn.
    commands.add(|world: &mut World| {
        let mut roots = world.query_filtered::<Entity, With<GridRoot>>();
        let old: Vec<Entity> = roots.iter(world).collect();
        for entity in old {
            world.entity_mut(entity).despawn_recursive();
        }
    });

    commands
        .spawn((
            SpatialBundle::from_transform(Transform::from_xyz(0.0, 0.0, Z_GRID)),
            GridRoot,
        ))
        .with_children(|parent| {
            for x in 0..=state.layout.width {
                let px = x as f32 * TILE_SIZE;
                parent.spawn(SpriteBundle {
                    sprite: Sprite {
                        color,
                        custom_size: Some(Vec2::new(1.5, height)),
                        ..default()
                    },
                    transform: Transform::from_translation(world_to_bevy(
                        Vec2::new(px, height / 2.0),
                        0.0,
                    )),
                    ..default()
                });
            }
            for y in 0..=state.layout.height {
                let py = y as f32 * TILE_SIZE;
                parent.spawn(SpriteBundle {
                    sprite: Sprite {
                        color,
                        custom_size: Some(Vec2::new(width, 1.5)),
                        ..default()
                    },
                    transform: Transform::from_translation(world_to_bevy(
                        Vec2::new(width / 2.0, py),
                        0.0,
                    )),
                    ..default()
                });
            }
        });
}

/// Diffs entity markers against the rebuilt render cache.
fn sync_markers(
    mut commands: Commands,
    state: Res<WorldState>,
    cache: Res<RenderCache>,
    mut index: ResMut<MarkerIndex>,
    mut markers: Query<&mut Transform, With<EntityMarker>>,
) {
    let wanted: HashSet<&str> = cache
        .entries
        .keys()
        .map(String::as_str)
        .filter(|id| {
            state
                .graph
                .get(id)
                .map_or(false, |e| e.kind != EntityKind::Biome)
        })
        .collect();

    let stale: Vec<String> = index
        .markers
        .keys()
        .filter(|id| !wanted.contains(id.as_str()))
        .cloned()
        .collect();
    for id in stale {
        if let Some(entity) = index.markers.remove(&id) {
            commands.entity(entity).despawn_recursive();
        }
    }

    for id in wanted {
        let placed = &cache.entries[id];
        let translation = world_to_bevy(placed.pos, Z_MARKER);

        if let Some(&entity) = index.markers.get(id) {
            // Re-slotted after a rebuild (siblings appeared or vanished).
            if let Ok(mut transform) = markers.get_mut(entity) {
                transform.translation = translation;
            }
            continue;
        }

        let kind = &state.graph.entities[id].kind;
        let entity = commands
            .spawn((
                Text2dBundle {
                    text: Text::from_section(
                        placed.icon.clone(),
                        TextStyle {
                            font_size: 22.0,
                            color: palette::kind_color(kind),
                            ..default()
                        },
                    ),
                    transform: Transform::from_translation(translation),
                    ..default()
                },
                EntityMarker {
                    entity_id: id.to_string(),
                    created_at: placed.created_at,
                },
            ))
            .id();
        index.markers.insert(id.to_string(), entity);
    }
}

/// Applies view mode, zoom cutoff, and birth epoch to map visibility.
fn update_map_visibility(
    mode: Res<ViewMode>,
    camera: Res<CameraController>,
    playback: Res<PlaybackState>,
    mut sets: ParamSet<(
        Query<&mut Visibility, With<TerrainTile>>,
        Query<&mut Visibility, With<GridRoot>>,
        Query<(&mut Visibility, &EntityMarker)>,
    )>,
) {
    let on_map = *mode == ViewMode::Map;
    let show = |visible: bool| {
        if visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        }
    };

    for mut visibility in sets.p0().iter_mut() {
        *visibility = show(on_map);
    }
    let grid = on_map && grid_visible(camera.zoom);
    for mut visibility in sets.p1().iter_mut() {
        *visibility = show(grid);
    }
    let epoch = playback.fractional_epoch();
    for (mut visibility, marker) in sets.p2().iter_mut() {
        *visibility = show(on_map && born_by(marker.created_at, epoch));
    }
}
