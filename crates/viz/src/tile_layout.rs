//! Child placement inside biome tiles and the derived render cache.
//!
//! Placement is a fixed closed-form heuristic, not a packing solver: tiles
//! rarely hold more than a handful of children, and reproducibility matters
//! more than optimal packing. Children are sorted by id before slots are
//! assigned, so the layout is identical across rebuilds regardless of the
//! order entities arrive in.

use bevy::prelude::*;
use std::collections::HashMap;
use std::f32::consts::PI;

use world_model::{Entity, EntityKind, WorldGraph, WorldLayout};

use crate::palette;

/// Edge length of one biome tile, in world pixels.
pub const TILE_SIZE: f32 = 96.0;

/// Ring radius for three or more children, in tile-normalized units.
const RING_RADIUS: f32 = 0.3;

/// Non-overlapping offsets for `n` children, in tile-local normalized
/// coordinates `[0,1]x[0,1]` (y grows downward).
///
/// One child sits at the center; two take the diagonal; three or more are
/// evenly spaced on a ring starting at the top and proceeding clockwise.
pub fn child_offsets(n: usize) -> Vec<Vec2> {
    match n {
        0 => Vec::new(),
        1 => vec![Vec2::new(0.5, 0.5)],
        2 => vec![Vec2::new(0.35, 0.35), Vec2::new(0.65, 0.65)],
        _ => (0..n)
            .map(|i| {
                let angle = (2.0 * PI / n as f32) * i as f32 - PI / 2.0;
                Vec2::new(
                    0.5 + RING_RADIUS * angle.cos(),
                    0.5 + RING_RADIUS * angle.sin(),
                )
            })
            .collect(),
    }
}

/// Assigns one tile-local offset per child, keyed by entity id.
///
/// An explicit `local_coord` in the entity's attribute bag wins over the
/// computed slot; everything else is placed by the closed-form heuristic in
/// id order.
pub fn place_children<'a, I>(children: I) -> Vec<(&'a str, Vec2)>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut sorted: Vec<&Entity> = children.into_iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let offsets = child_offsets(sorted.len());
    sorted
        .iter()
        .zip(offsets)
        .map(|(entity, slot)| {
            let offset = entity
                .data
                .as_ref()
                .and_then(|d| d.local_coord)
                .map(|[x, y]| Vec2::new(x as f32, y as f32))
                .unwrap_or(slot);
            (entity.id.as_str(), offset)
        })
        .collect()
}

/// One positioned entity in the render cache.
#[derive(Debug, Clone)]
pub struct PlacedEntity {
    /// World-pixel position (y down).
    pub pos: Vec2,
    pub icon: String,
    pub created_at: u64,
}

/// Entity id to pixel position/icon, derived from the current world.
///
/// Rebuilt whenever the entity set changes; never persisted.
#[derive(Resource, Debug, Default)]
pub struct RenderCache {
    pub entries: HashMap<String, PlacedEntity>,
}

impl RenderCache {
    /// Looks up a placed entity.
    pub fn get(&self, id: &str) -> Option<&PlacedEntity> {
        self.entries.get(id)
    }

    /// Pixel position of an entity, if it is placed.
    pub fn position_of(&self, id: &str) -> Option<Vec2> {
        self.entries.get(id).map(|p| p.pos)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the cache for the current layout and entity graph.
///
/// Biomes land on their tile centers, their children on layout-engine slots
/// inside the tile, and deeper descendants inherit their parent's position.
/// Entities with no resolvable position are simply absent from the cache.
pub fn build_render_cache(layout: &WorldLayout, graph: &WorldGraph) -> RenderCache {
    let mut cache = RenderCache::default();

    // Biome tiles first. A biome without a coordinate falls back to the
    // layout grid if a cell references its definition.
    for entity in graph.entities.values() {
        if entity.kind != EntityKind::Biome {
            continue;
        }
        let coord = entity.coord().or_else(|| {
            let definition = entity.definition_id.as_deref()?;
            layout
                .iter_cells()
                .find(|(_, biome)| *biome == definition)
                .map(|(coord, _)| coord)
        });
        if let Some((x, y)) = coord {
            cache.entries.insert(
                entity.id.clone(),
                PlacedEntity {
                    pos: tile_center(x, y),
                    icon: palette::icon_of(entity).to_string(),
                    created_at: entity.created_at,
                },
            );
        }
    }

    // Children of placed biomes, slotted inside the parent tile.
    let mut by_parent: HashMap<&str, Vec<&Entity>> = HashMap::new();
    for entity in graph.entities.values() {
        if let Some(parent_id) = entity.parent_id.as_deref() {
            if cache.entries.contains_key(parent_id) {
                by_parent.entry(parent_id).or_default().push(entity);
            }
        }
    }
    for (parent_id, children) in by_parent {
        let origin = cache.entries[parent_id].pos - Vec2::splat(TILE_SIZE / 2.0);
        for (child_id, offset) in place_children(children.iter().copied()) {
            let child = &graph.entities[child_id];
            cache.entries.insert(
                child_id.to_string(),
                PlacedEntity {
                    pos: origin + offset * TILE_SIZE,
                    icon: palette::icon_of(child).to_string(),
                    created_at: child.created_at,
                },
            );
        }
    }

    // Deeper descendants anchor onto their parent until the chain resolves.
    // Bounded passes; anything still unresolved has no on-screen position.
    for _ in 0..4 {
        let mut added = Vec::new();
        for entity in graph.entities.values() {
            if cache.entries.contains_key(&entity.id) {
                continue;
            }
            let Some(parent_id) = entity.parent_id.as_deref() else {
                continue;
            };
            if let Some(pos) = cache.position_of(parent_id) {
                added.push((
                    entity.id.clone(),
                    PlacedEntity {
                        pos,
                        icon: palette::icon_of(entity).to_string(),
                        created_at: entity.created_at,
                    },
                ));
            }
        }
        if added.is_empty() {
            break;
        }
        cache.entries.extend(added);
    }

    cache
}

/// Pixel center of a grid tile.
pub fn tile_center(x: i64, y: i64) -> Vec2 {
    Vec2::new(
        x as f32 * TILE_SIZE + TILE_SIZE / 2.0,
        y as f32 * TILE_SIZE + TILE_SIZE / 2.0,
    )
}
