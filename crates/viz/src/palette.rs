//! Deterministic string-to-color/glyph mapping.
//!
//! Everything here is a pure function of its seed: the same entity keeps the
//! same color and glyph for the lifetime of the process, across rebuilds, and
//! across runs. No randomness is involved anywhere.

use bevy::prelude::*;

use world_model::{Entity, EntityKind};

/// 32-bit rolling hash over the seed string.
///
/// `hash = hash * 31 + char`, wrapped to signed 32-bit, then the absolute
/// value. The empty string hashes to 0 and is a valid seed.
pub fn hash_seed(seed: &str) -> u32 {
    let mut hash: i32 = 0;
    for c in seed.chars() {
        hash = hash.wrapping_mul(31).wrapping_add(c as i32);
    }
    hash.unsigned_abs()
}

/// HSL components derived from a seed: hue in [0,360), saturation in
/// [60,80), lightness in [40,60).
pub fn hsl_components(seed: &str) -> (f32, f32, f32) {
    let hash = hash_seed(seed);
    let hue = hash % 360;
    let sat = 60 + (hash / 360) % 20;
    let light = 40 + (hash / 7200) % 20;
    (hue as f32, sat as f32 / 100.0, light as f32 / 100.0)
}

/// Deterministic color for an arbitrary seed string.
pub fn color_of(seed: &str) -> Color {
    let (hue, sat, light) = hsl_components(seed);
    Color::hsl(hue, sat, light)
}

// Per-kind glyph pools, single characters the default font can render.
// Recovered from the generator's fallback icon tables.
const BIOME_GLYPHS: &[&str] = &["^", "~", "#", "%", "="];
const LOCATION_GLYPHS: &[&str] = &["A", "H", "O", "T", "U", "#"];
const FACTION_GLYPHS: &[&str] = &["X", "V", "W", "Y", "K"];
const BOSS_GLYPHS: &[&str] = &["!", "&"];
const RESOURCE_GLYPHS: &[&str] = &["$", "o", "+", "*"];
const DEFAULT_GLYPHS: &[&str] = &["?", "*", "+", "@"];

fn glyph_pool(kind: &EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Biome => BIOME_GLYPHS,
        EntityKind::Location => LOCATION_GLYPHS,
        EntityKind::Faction => FACTION_GLYPHS,
        EntityKind::Boss => BOSS_GLYPHS,
        EntityKind::Resource => RESOURCE_GLYPHS,
        _ => DEFAULT_GLYPHS,
    }
}

/// Resolves an entity's display glyph.
///
/// An explicit `data.icon` always wins. Otherwise the glyph is hashed from
/// `definition_id` so all instances of the same archetype share one, falling
/// back to the instance id.
pub fn icon_of(entity: &Entity) -> &str {
    if let Some(icon) = entity.icon() {
        return icon;
    }
    let seed = entity.definition_id.as_deref().unwrap_or(&entity.id);
    let pool = glyph_pool(&entity.kind);
    pool[hash_seed(seed) as usize % pool.len()]
}

/// Fixed colors for the common entity kinds, used by graph nodes and the
/// legend. Kinds outside the fixed set fall back to the hash palette so
/// unknown tags still get a stable color.
pub fn kind_color(kind: &EntityKind) -> Color {
    match kind {
        EntityKind::Biome => Color::srgb(0.30, 0.55, 0.30),
        EntityKind::Location => Color::srgb(0.65, 0.55, 0.35),
        EntityKind::Faction => Color::srgb(0.75, 0.30, 0.30),
        EntityKind::Character => Color::srgb(0.35, 0.60, 0.75),
        EntityKind::Resource => Color::srgb(0.80, 0.75, 0.35),
        EntityKind::Event => Color::srgb(0.60, 0.45, 0.75),
        EntityKind::Conflict => Color::srgb(0.55, 0.20, 0.20),
        EntityKind::Item => Color::srgb(0.55, 0.65, 0.55),
        EntityKind::Ritual => Color::srgb(0.50, 0.35, 0.60),
        EntityKind::Belief => Color::srgb(0.45, 0.50, 0.70),
        EntityKind::Boss => Color::srgb(0.30, 0.20, 0.25),
        EntityKind::Other(tag) => color_of(tag),
    }
}

/// Terrain tile colors, matched by substring against the biome id.
const BIOME_COLOR_TABLE: &[(&str, [f32; 3])] = &[
    ("forest", [0.18, 0.42, 0.20]),
    ("jungle", [0.12, 0.38, 0.18]),
    ("swamp", [0.28, 0.36, 0.24]),
    ("desert", [0.78, 0.68, 0.42]),
    ("mountain", [0.52, 0.50, 0.48]),
    ("tundra", [0.72, 0.78, 0.82]),
    ("ice", [0.78, 0.85, 0.90]),
    ("snow", [0.85, 0.88, 0.90]),
    ("water", [0.22, 0.38, 0.60]),
    ("ocean", [0.16, 0.30, 0.52]),
    ("lake", [0.26, 0.44, 0.62]),
    ("volcano", [0.40, 0.18, 0.14]),
    ("plain", [0.46, 0.58, 0.32]),
    ("grass", [0.42, 0.60, 0.32]),
    ("cave", [0.25, 0.23, 0.26]),
];

/// Default terrain color for biome ids with no table match.
const BIOME_FALLBACK: [f32; 3] = [0.38, 0.42, 0.38];

/// Terrain color for a biome id, by substring match with a fixed fallback.
pub fn biome_color(biome_id: &str) -> Color {
    let lowered = biome_id.to_ascii_lowercase();
    let [r, g, b] = BIOME_COLOR_TABLE
        .iter()
        .find(|(pattern, _)| lowered.contains(pattern))
        .map(|(_, rgb)| *rgb)
        .unwrap_or(BIOME_FALLBACK);
    Color::srgb(r, g, b)
}
