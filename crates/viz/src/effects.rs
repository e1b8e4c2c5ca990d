//! Animated event glyphs for the current epoch.
//!
//! Every event class maps to a glyph and one of four closed-form effects;
//! each effect is a pure function of playback progress, so scrubbing to any
//! fractional epoch reproduces the exact same frame. Events that cannot be
//! anchored to an on-screen position are dropped from the frame, never an
//! error.

use bevy::prelude::*;

use world_model::{EntityKind, EventClass, HistoryEvent, WorldGraph};

use crate::camera::world_to_bevy;
use crate::loader::{WorldState, WorldUpdatedEvent};
use crate::playback::PlaybackState;
use crate::plugin::ViewMode;
use crate::tile_layout::RenderCache;

const Z_GLYPH: f32 = 5.0;

/// How far a float-fade glyph rises over one epoch, in pixels.
const FLOAT_RISE: f32 = 26.0;
/// Drop start height above the anchor, in pixels.
const DROP_HEIGHT: f32 = 30.0;

/// The four animation shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Scale oscillation, `1 + 0.4*sin(5*pi*p)`.
    Pulse,
    /// Rises linearly while alpha fades to a floor.
    FloatFade,
    /// Falls in from above while alpha rises to full.
    Drop,
    /// Scale ramp `min(1, 2p)`; fully visible after half the epoch.
    Pop,
}

/// Glyph and effect for an event class.
pub fn glyph_for(class: EventClass) -> (&'static str, EffectKind) {
    match class {
        EventClass::Conflict => ("X", EffectKind::Pulse),     // crossed swords
        EventClass::Death => ("+", EffectKind::FloatFade),    // grave marker
        EventClass::Migration => (">", EffectKind::Drop),     // runner
        EventClass::Growth => ("*", EffectKind::Pop),         // sparkle
        EventClass::Diplomacy => ("=", EffectKind::Pop),      // handshake
        EventClass::Unknown => ("o", EffectKind::Pop),
    }
}

/// Tint for an event class.
pub fn class_color(class: EventClass) -> Color {
    match class {
        EventClass::Conflict => Color::srgb(0.90, 0.25, 0.20),
        EventClass::Death => Color::srgb(0.85, 0.85, 0.88),
        EventClass::Migration => Color::srgb(0.90, 0.65, 0.25),
        EventClass::Growth => Color::srgb(0.40, 0.85, 0.40),
        EventClass::Diplomacy => Color::srgb(0.40, 0.65, 0.95),
        EventClass::Unknown => Color::srgb(0.75, 0.75, 0.75),
    }
}

pub fn pulse_scale(progress: f32) -> f32 {
    1.0 + 0.4 * (5.0 * std::f32::consts::PI * progress).sin()
}

/// Y-down pixel offset of a float-fade glyph (negative = upward).
pub fn float_offset(progress: f32) -> f32 {
    -FLOAT_RISE * progress
}

/// Float-fade alpha; never fully transparent.
pub fn float_alpha(progress: f32) -> f32 {
    (1.0 - progress).max(0.2)
}

/// Y-down pixel offset of a drop glyph; starts above, lands on the anchor.
pub fn drop_offset(progress: f32) -> f32 {
    -DROP_HEIGHT * (1.0 - progress)
}

/// Drop alpha; rises from a floor to full.
pub fn drop_alpha(progress: f32) -> f32 {
    (0.3 + 0.7 * progress).min(1.0)
}

pub fn pop_scale(progress: f32) -> f32 {
    (2.0 * progress).min(1.0)
}

/// Resolves an event to a world-pixel anchor.
///
/// Preference order: the explicit `location_id`; a Location primary entity
/// directly; a located primary entity (faction, resource, character, boss)
/// through its parent. Anything unresolvable yields `None`.
pub fn resolve_anchor(
    event: &HistoryEvent,
    graph: &WorldGraph,
    cache: &RenderCache,
) -> Option<Vec2> {
    if let Some(location_id) = event.location_id.as_deref() {
        if let Some(pos) = cache.position_of(location_id) {
            return Some(pos);
        }
    }

    let primary = event.primary_entity.as_ref()?;
    let kind = primary
        .kind
        .clone()
        .or_else(|| graph.get(&primary.id).map(|e| e.kind.clone()))?;

    if kind == EntityKind::Location {
        return cache.position_of(&primary.id);
    }
    if kind.is_located() {
        let parent_id = primary
            .parent_id
            .clone()
            .or_else(|| graph.get(&primary.id).and_then(|e| e.parent_id.clone()))?;
        return cache.position_of(&parent_id);
    }
    cache.position_of(&primary.id)
}

/// One animated glyph on screen.
#[derive(Component)]
pub struct EffectGlyph {
    pub kind: EffectKind,
    /// World-pixel anchor (y down).
    pub base: Vec2,
    pub color: Color,
}

/// Glyphs currently spawned, replaced whenever the integer epoch changes.
#[derive(Resource, Default)]
struct ActiveGlyphs {
    epoch: Option<u64>,
    spawned: Vec<Entity>,
}

/// Plugin for event glyph animation.
pub struct EffectsPlugin;

impl Plugin for EffectsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ActiveGlyphs>()
            .add_systems(Update, (sync_event_glyphs, animate_glyphs).chain());
    }
}

/// Respawns the glyph set when the integer epoch or the world changes.
fn sync_event_glyphs(
    mut commands: Commands,
    state: Res<WorldState>,
    cache: Res<RenderCache>,
    playback: Res<PlaybackState>,
    mut active: ResMut<ActiveGlyphs>,
    mut world_updates: EventReader<WorldUpdatedEvent>,
) {
    let world_changed = world_updates.read().next().is_some();
    let epoch = playback.current_epoch;
    if active.epoch == Some(epoch) && !world_changed {
        return;
    }

    for entity in active.spawned.drain(..) {
        commands.entity(entity).despawn_recursive();
    }
    active.epoch = Some(epoch);

    for event in state.history.events_at(epoch) {
        let Some(anchor) = resolve_anchor(event, &state.graph, &cache) else {
            tracing::debug!(event_type = %event.event_type, "event has no on-screen anchor, skipped");
            continue;
        };
        let class = event.class();
        let (glyph, kind) = glyph_for(class);
        let color = class_color(class);

        let entity = commands
            .spawn((
                Text2dBundle {
                    text: Text::from_section(
                        glyph,
                        TextStyle {
                            font_size: 28.0,
                            color,
                            ..default()
                        },
                    ),
                    transform: Transform::from_translation(world_to_bevy(anchor, Z_GLYPH)),
                    ..default()
                },
                EffectGlyph {
                    kind,
                    base: anchor,
                    color,
                },
            ))
            .id();
        active.spawned.push(entity);
    }
}

/// Applies the closed-form curves for the current progress.
fn animate_glyphs(
    mode: Res<ViewMode>,
    playback: Res<PlaybackState>,
    mut glyphs: Query<(&EffectGlyph, &mut Transform, &mut Text, &mut Visibility)>,
) {
    let progress = playback.progress;
    let on_map = *mode == ViewMode::Map;

    for (glyph, mut transform, mut text, mut visibility) in glyphs.iter_mut() {
        *visibility = if on_map {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        if !on_map {
            continue;
        }

        let mut offset_y = 0.0;
        let mut scale = 1.0;
        let mut alpha = 1.0;
        match glyph.kind {
            EffectKind::Pulse => scale = pulse_scale(progress),
            EffectKind::FloatFade => {
                offset_y = float_offset(progress);
                alpha = float_alpha(progress);
            }
            EffectKind::Drop => {
                offset_y = drop_offset(progress);
                alpha = drop_alpha(progress);
            }
            EffectKind::Pop => scale = pop_scale(progress),
        }

        let base = glyph.base + Vec2::new(0.0, offset_y);
        transform.translation = world_to_bevy(base, Z_GLYPH);
        transform.scale = Vec3::new(scale, scale, 1.0);
        if let Some(section) = text.sections.first_mut() {
            section.style.color = glyph.color.with_alpha(alpha);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_model::fixtures;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_pulse_curve() {
        assert!((pulse_scale(0.0) - 1.0).abs() < EPS);
        // Peak of the first oscillation at p = 0.1.
        assert!((pulse_scale(0.1) - 1.4).abs() < EPS);
        assert!((pulse_scale(0.2) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_float_fade_never_vanishes() {
        assert!((float_alpha(0.0) - 1.0).abs() < EPS);
        assert!((float_alpha(0.5) - 0.5).abs() < EPS);
        assert!((float_alpha(0.95) - 0.2).abs() < EPS);
        assert!(float_offset(0.5) < 0.0);
        assert!(float_offset(0.9) < float_offset(0.1));
    }

    #[test]
    fn test_drop_lands_on_anchor() {
        assert!((drop_offset(0.0) + DROP_HEIGHT).abs() < EPS);
        assert!(drop_offset(1.0).abs() < EPS);
        assert!(drop_alpha(0.0) > 0.0);
        assert!((drop_alpha(1.0) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_pop_full_at_half() {
        assert!((pop_scale(0.25) - 0.5).abs() < EPS);
        assert!((pop_scale(0.5) - 1.0).abs() < EPS);
        assert!((pop_scale(0.9) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_every_class_has_a_glyph() {
        for class in [
            EventClass::Conflict,
            EventClass::Death,
            EventClass::Migration,
            EventClass::Growth,
            EventClass::Diplomacy,
            EventClass::Unknown,
        ] {
            let (glyph, _) = glyph_for(class);
            assert!(!glyph.is_empty());
        }
        assert_eq!(glyph_for(EventClass::Conflict).1, EffectKind::Pulse);
        assert_eq!(glyph_for(EventClass::Death).1, EffectKind::FloatFade);
        assert_eq!(glyph_for(EventClass::Migration).1, EffectKind::Drop);
        assert_eq!(glyph_for(EventClass::Unknown).1, EffectKind::Pop);
    }

    fn sample_world() -> (WorldGraph, RenderCache) {
        let layout = fixtures::sample_layout();
        let graph = fixtures::sample_graph();
        let cache = crate::tile_layout::build_render_cache(&layout, &graph);
        (graph, cache)
    }

    #[test]
    fn test_anchor_prefers_location_id() {
        let (graph, cache) = sample_world();
        let event = HistoryEvent::from_line(
            r#"{"age":1,"event_type":"settlement_founded","location_id":"loc_village_a1"}"#,
        )
        .unwrap();
        assert_eq!(
            resolve_anchor(&event, &graph, &cache),
            cache.position_of("loc_village_a1")
        );
    }

    #[test]
    fn test_anchor_location_primary_targets_itself() {
        let (graph, cache) = sample_world();
        let event = HistoryEvent::from_line(
            r#"{"age":2,"event_type":"discovery","primary_entity":{"id":"loc_shrine_b2","type":"Location"}}"#,
        )
        .unwrap();
        assert_eq!(
            resolve_anchor(&event, &graph, &cache),
            cache.position_of("loc_shrine_b2")
        );
    }

    #[test]
    fn test_anchor_located_kind_resolves_to_parent() {
        let (graph, cache) = sample_world();
        let event = HistoryEvent::from_line(
            r#"{"age":3,"event_type":"raid_start","primary_entity":{"id":"f_eels_e5","type":"Faction","parent_id":"loc_dock_c3"}}"#,
        )
        .unwrap();
        assert_eq!(
            resolve_anchor(&event, &graph, &cache),
            cache.position_of("loc_dock_c3")
        );
    }

    #[test]
    fn test_anchor_bare_id_falls_back_to_graph_lookup() {
        let (graph, cache) = sample_world();
        // Bare string reference: kind and parent come from the graph.
        let event = HistoryEvent::from_line(
            r#"{"age":3,"event_type":"raid_start","primary_entity":"f_wolves_d4"}"#,
        )
        .unwrap();
        assert_eq!(
            resolve_anchor(&event, &graph, &cache),
            cache.position_of("loc_village_a1")
        );
    }

    #[test]
    fn test_unresolvable_event_dropped() {
        let (graph, cache) = sample_world();
        let event =
            HistoryEvent::from_line(r#"{"age":3,"event_type":"strange_lights"}"#).unwrap();
        assert_eq!(resolve_anchor(&event, &graph, &cache), None);

        let event = HistoryEvent::from_line(
            r#"{"age":3,"event_type":"raid_start","primary_entity":"nobody_home"}"#,
        )
        .unwrap();
        assert_eq!(resolve_anchor(&event, &graph, &cache), None);
    }
}
