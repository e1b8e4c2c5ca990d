//! Force-directed entity-relationship graph view.
//!
//! The layout engine hides behind the [`ForceLayout`] trait so the spring
//! simulation can be swapped for another backend. On every epoch or filter
//! change the visible set is diffed against what is already on screen and
//! only the difference is applied; existing positions, including ones the
//! user dragged, survive a scrub of the timeline. A full relayout runs only
//! when the diff added more nodes than the set actually grew by, or on an
//! explicit shuffle.

use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use world_model::{EdgeKind, EntityKind, GraphTemporalFilter};

use crate::camera::CameraController;
use crate::loader::{WorldState, WorldUpdatedEvent};
use crate::palette;
use crate::playback::PlaybackState;
use crate::plugin::ViewMode;

/// Virtual canvas the graph lays out in, in world pixels.
pub const GRAPH_BOUNDS: Vec2 = Vec2::new(1200.0, 800.0);

/// Jitter radius for seeding a node next to its parent.
const SEED_JITTER: f32 = 18.0;

const Z_NODE: f32 = 2.0;

/// Minimal capability interface over a force-layout backend.
pub trait ForceLayout {
    fn add_node(&mut self, id: &str, position: Vec2);
    fn remove_node(&mut self, id: &str);
    fn add_edge(&mut self, from: &str, to: &str);
    fn remove_edge(&mut self, from: &str, to: &str);
    /// Runs the simulation for a number of steps.
    fn run_layout(&mut self, iterations: u32);
    fn position(&self, id: &str) -> Option<Vec2>;
    fn set_position(&mut self, id: &str, position: Vec2);
    fn node_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy, Default)]
struct NodeBody {
    pos: Vec2,
    vel: Vec2,
}

/// Built-in spring simulation: pairwise repulsion, edge attraction, gentle
/// centering, velocity damping.
pub struct SpringLayout {
    nodes: BTreeMap<String, NodeBody>,
    edges: BTreeSet<(String, String)>,
    bounds: Vec2,
}

const REPULSION: f32 = 3000.0;
const ATTRACTION: f32 = 0.005;
const DAMPING: f32 = 0.85;
const CENTERING: f32 = 0.0005;

impl SpringLayout {
    pub fn new(bounds: Vec2) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeSet::new(),
            bounds,
        }
    }

    fn edge_key(from: &str, to: &str) -> (String, String) {
        if from <= to {
            (from.to_string(), to.to_string())
        } else {
            (to.to_string(), from.to_string())
        }
    }

    /// One simulation tick.
    pub fn step(&mut self) {
        if self.nodes.len() < 2 {
            return;
        }
        let ids: Vec<&String> = self.nodes.keys().collect();
        let index_of: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut bodies: Vec<NodeBody> = self.nodes.values().copied().collect();

        // Repulsion between all pairs.
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let delta = bodies[i].pos - bodies[j].pos;
                let dist_sq = delta.length_squared() + 1.0;
                let force = REPULSION / dist_sq;
                let push = delta / dist_sq.sqrt() * force;
                bodies[i].vel += push;
                bodies[j].vel -= push;
            }
        }

        // Attraction along edges.
        for (from, to) in &self.edges {
            let (Some(&i), Some(&j)) = (index_of.get(from.as_str()), index_of.get(to.as_str()))
            else {
                continue;
            };
            let pull = (bodies[j].pos - bodies[i].pos) * ATTRACTION;
            bodies[i].vel += pull;
            bodies[j].vel -= pull;
        }

        // Gentle centering, then integrate with damping.
        let center = self.bounds / 2.0;
        for body in &mut bodies {
            body.vel += (center - body.pos) * CENTERING;
            body.vel *= DAMPING;
            body.pos += body.vel;
        }

        for (body, slot) in bodies.into_iter().zip(self.nodes.values_mut()) {
            *slot = body;
        }
    }

    /// Edges currently in the engine, normalized pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }
}

impl ForceLayout for SpringLayout {
    fn add_node(&mut self, id: &str, position: Vec2) {
        self.nodes.entry(id.to_string()).or_insert(NodeBody {
            pos: position,
            vel: Vec2::ZERO,
        });
    }

    fn remove_node(&mut self, id: &str) {
        self.nodes.remove(id);
        self.edges.retain(|(a, b)| a != id && b != id);
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        if from != to {
            self.edges.insert(Self::edge_key(from, to));
        }
    }

    fn remove_edge(&mut self, from: &str, to: &str) {
        self.edges.remove(&Self::edge_key(from, to));
    }

    fn run_layout(&mut self, iterations: u32) {
        for _ in 0..iterations {
            self.step();
        }
    }

    fn position(&self, id: &str) -> Option<Vec2> {
        self.nodes.get(id).map(|b| b.pos)
    }

    fn set_position(&mut self, id: &str, position: Vec2) {
        if let Some(body) = self.nodes.get_mut(id) {
            body.pos = position;
            body.vel = Vec2::ZERO;
        }
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// A diff needs a full relayout when it added more nodes than the placed
/// set actually grew by (churn a pure diff cannot place sensibly).
pub fn needs_full_relayout(added: usize, prev_count: usize, new_count: usize) -> bool {
    let net_growth = (new_count as i64 - prev_count as i64).max(0);
    added as i64 > net_growth
}

/// Seeds a new node near its parent when the parent is placed, else at a
/// random point in the canvas bounds.
pub fn seed_position(parent_pos: Option<Vec2>, rng: &mut SmallRng, bounds: Vec2) -> Vec2 {
    match parent_pos {
        Some(parent) => {
            parent
                + Vec2::new(
                    rng.gen_range(-SEED_JITTER..=SEED_JITTER),
                    rng.gen_range(-SEED_JITTER..=SEED_JITTER),
                )
        }
        None => Vec2::new(
            rng.gen_range(0.0..bounds.x),
            rng.gen_range(0.0..bounds.y),
        ),
    }
}

/// Temporal/type filter driving the graph view, with a version counter so
/// the diff system notices toggles.
#[derive(Resource)]
pub struct GraphFilter {
    pub filter: GraphTemporalFilter,
    pub version: u32,
}

impl Default for GraphFilter {
    fn default() -> Self {
        Self {
            filter: GraphTemporalFilter::default(),
            version: 0,
        }
    }
}

impl GraphFilter {
    pub fn toggle_kind(&mut self, kind: EntityKind) {
        let hidden = self.filter.toggle_kind(kind.clone());
        self.version = self.version.wrapping_add(1);
        tracing::info!(kind = %kind, hidden, "toggled kind visibility");
    }
}

/// Kinds bound to the number keys, in order.
pub const KIND_TOGGLE_ORDER: &[EntityKind] = &[
    EntityKind::Biome,
    EntityKind::Location,
    EntityKind::Faction,
    EntityKind::Character,
    EntityKind::Resource,
    EntityKind::Item,
    EntityKind::Ritual,
    EntityKind::Belief,
    EntityKind::Boss,
];

struct EdgeDisplay {
    hierarchy: bool,
}

/// Persistent graph scene state.
#[derive(Resource)]
pub struct GraphView {
    engine: Box<dyn ForceLayout + Send + Sync>,
    shown_nodes: HashMap<String, Entity>,
    shown_edges: HashMap<(String, String), EdgeDisplay>,
    rng: SmallRng,
    /// Remaining warm simulation steps after a diff.
    settle: u32,
    dragging: Option<String>,
    last_synced: Option<(u64, u32)>,
}

impl Default for GraphView {
    fn default() -> Self {
        Self {
            engine: Box::new(SpringLayout::new(GRAPH_BOUNDS)),
            shown_nodes: HashMap::new(),
            shown_edges: HashMap::new(),
            rng: SmallRng::seed_from_u64(0x77_6f_72_6c_64),
            settle: 0,
            dragging: None,
            last_synced: None,
        }
    }
}

impl GraphView {
    pub fn node_count(&self) -> usize {
        self.shown_nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.shown_edges.len()
    }
}

fn edge_key(from: &str, to: &str) -> (String, String) {
    SpringLayout::edge_key(from, to)
}

/// Plugin for the graph view.
pub struct GraphViewPlugin;

impl Plugin for GraphViewPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GraphFilter>()
            .init_resource::<GraphView>()
            .add_systems(
                Update,
                (
                    handle_graph_keys,
                    sync_graph_view,
                    drag_graph_nodes,
                    settle_graph,
                    apply_node_positions,
                    draw_graph_edges,
                )
                    .chain(),
            );
    }
}

#[derive(Component)]
struct GraphNode {
    entity_id: String,
}

/// Number keys toggle kinds; G shuffles the layout.
fn handle_graph_keys(
    keyboard: Res<ButtonInput<KeyCode>>,
    mode: Res<ViewMode>,
    mut filter: ResMut<GraphFilter>,
    mut view: ResMut<GraphView>,
) {
    if *mode != ViewMode::Graph {
        return;
    }
    const DIGITS: &[KeyCode] = &[
        KeyCode::Digit1,
        KeyCode::Digit2,
        KeyCode::Digit3,
        KeyCode::Digit4,
        KeyCode::Digit5,
        KeyCode::Digit6,
        KeyCode::Digit7,
        KeyCode::Digit8,
        KeyCode::Digit9,
    ];
    for (key, kind) in DIGITS.iter().zip(KIND_TOGGLE_ORDER) {
        if keyboard.just_pressed(*key) {
            filter.toggle_kind(kind.clone());
        }
    }

    if keyboard.just_pressed(KeyCode::KeyG) {
        let ids: Vec<String> = view.shown_nodes.keys().cloned().collect();
        for id in ids {
            let pos = {
                let rng = &mut view.rng;
                Vec2::new(
                    rng.gen_range(0.0..GRAPH_BOUNDS.x),
                    rng.gen_range(0.0..GRAPH_BOUNDS.y),
                )
            };
            view.engine.set_position(&id, pos);
        }
        view.engine.run_layout(300);
        view.settle = 120;
        tracing::info!("graph layout shuffled");
    }
}

/// Diffs the filtered visible set against the rendered scene.
fn sync_graph_view(
    mut commands: Commands,
    state: Res<WorldState>,
    playback: Res<PlaybackState>,
    filter: Res<GraphFilter>,
    mut view: ResMut<GraphView>,
    mut world_updates: EventReader<WorldUpdatedEvent>,
) {
    let world_changed = world_updates.read().next().is_some();
    let signature = (playback.current_epoch, filter.version);
    if view.last_synced == Some(signature) && !world_changed {
        return;
    }
    view.last_synced = Some(signature);

    let visible = filter
        .filter
        .visible_set(&state.graph, playback.current_epoch);

    let wanted_nodes: BTreeSet<&str> = visible.nodes.iter().map(|e| e.id.as_str()).collect();
    let mut wanted_edges: HashMap<(String, String), EdgeDisplay> = HashMap::new();
    for edge in &visible.edges {
        wanted_edges.insert(
            edge_key(edge.from, edge.to),
            EdgeDisplay {
                hierarchy: edge.kind == EdgeKind::Hierarchy,
            },
        );
    }

    let prev_count = view.shown_nodes.len();

    // Subtractive first so freed space is available for seeding.
    let stale_nodes: Vec<String> = view
        .shown_nodes
        .keys()
        .filter(|id| !wanted_nodes.contains(id.as_str()))
        .cloned()
        .collect();
    for id in &stale_nodes {
        if let Some(entity) = view.shown_nodes.remove(id) {
            commands.entity(entity).despawn_recursive();
        }
        view.engine.remove_node(id);
    }
    let stale_edges: Vec<(String, String)> = view
        .shown_edges
        .keys()
        .filter(|key| !wanted_edges.contains_key(*key))
        .cloned()
        .collect();
    for key in stale_edges {
        view.engine.remove_edge(&key.0, &key.1);
        view.shown_edges.remove(&key);
    }

    // Additive pass.
    let mut added = 0usize;
    for node in &visible.nodes {
        if view.shown_nodes.contains_key(&node.id) {
            continue;
        }
        added += 1;

        let parent_pos = node
            .parent_id
            .as_deref()
            .and_then(|parent| view.engine.position(parent));
        let seed = {
            let rng = &mut view.rng;
            seed_position(parent_pos, rng, GRAPH_BOUNDS)
        };
        view.engine.add_node(&node.id, seed);

        let entity = commands
            .spawn((
                SpriteBundle {
                    sprite: Sprite {
                        color: palette::kind_color(&node.kind),
                        custom_size: Some(Vec2::splat(14.0)),
                        ..default()
                    },
                    transform: Transform::from_xyz(0.0, 0.0, Z_NODE),
                    ..default()
                },
                GraphNode {
                    entity_id: node.id.clone(),
                },
            ))
            .with_children(|parent| {
                parent.spawn(Text2dBundle {
                    text: Text::from_section(
                        truncate_label(&node.name, 14),
                        TextStyle {
                            font_size: 11.0,
                            color: Color::srgb(0.85, 0.85, 0.85),
                            ..default()
                        },
                    ),
                    transform: Transform::from_xyz(0.0, -16.0, 0.1),
                    ..default()
                });
            })
            .id();
        view.shown_nodes.insert(node.id.clone(), entity);
    }
    for (key, display) in wanted_edges {
        view.engine.add_edge(&key.0, &key.1);
        view.shown_edges.insert(key, display);
    }

    if needs_full_relayout(added, prev_count, view.shown_nodes.len()) {
        view.engine.run_layout(150);
        view.settle = 120;
    } else if added > 0 || !stale_nodes.is_empty() {
        view.settle = view.settle.max(60);
    }

    tracing::debug!(
        epoch = playback.current_epoch,
        nodes = view.shown_nodes.len(),
        edges = view.shown_edges.len(),
        added,
        removed = stale_nodes.len(),
        "graph view synced"
    );
}

/// Truncates a node label the way the on-screen labels expect.
fn truncate_label(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        name.to_string()
    } else {
        let cut: String = name.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Right-drag moves a node; the engine keeps the dragged position.
fn drag_graph_nodes(
    mode: Res<ViewMode>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    camera: Res<CameraController>,
    windows: Query<&Window>,
    mut view: ResMut<GraphView>,
) {
    if *mode != ViewMode::Graph {
        view.dragging = None;
        return;
    }
    let Ok(window) = windows.get_single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        if !mouse_button.pressed(MouseButton::Right) {
            view.dragging = None;
        }
        return;
    };
    let world = camera.screen_to_world(cursor);

    if mouse_button.just_pressed(MouseButton::Right) {
        let grab_radius = 14.0 / camera.zoom;
        let hit = view
            .shown_nodes
            .keys()
            .filter_map(|id| view.engine.position(id).map(|pos| (id.clone(), pos)))
            .find(|(_, pos)| pos.distance(world) < grab_radius);
        view.dragging = hit.map(|(id, _)| id);
    }
    if mouse_button.pressed(MouseButton::Right) {
        if let Some(id) = view.dragging.clone() {
            view.engine.set_position(&id, world);
        }
    } else {
        view.dragging = None;
    }
}

/// Runs a few warm simulation steps per frame while the layout settles.
fn settle_graph(mode: Res<ViewMode>, mut view: ResMut<GraphView>) {
    if *mode != ViewMode::Graph || view.settle == 0 {
        return;
    }
    view.settle -= 1;
    view.engine.run_layout(2);
}

/// Copies engine positions onto the Bevy transforms.
fn apply_node_positions(
    mode: Res<ViewMode>,
    view: Res<GraphView>,
    mut nodes: Query<(&GraphNode, &mut Transform, &mut Visibility)>,
) {
    let on_graph = *mode == ViewMode::Graph;
    for (node, mut transform, mut visibility) in nodes.iter_mut() {
        *visibility = if on_graph {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        if let Some(pos) = view.engine.position(&node.entity_id) {
            transform.translation = crate::camera::world_to_bevy(pos, Z_NODE);
        }
    }
}

/// Draws edges as lines between engine positions.
fn draw_graph_edges(mode: Res<ViewMode>, view: Res<GraphView>, mut gizmos: Gizmos) {
    if *mode != ViewMode::Graph {
        return;
    }
    for (key, display) in &view.shown_edges {
        let (Some(a), Some(b)) = (view.engine.position(&key.0), view.engine.position(&key.1))
        else {
            continue;
        };
        let color = if display.hierarchy {
            Color::srgba(0.5, 0.5, 0.55, 0.35)
        } else {
            Color::srgba(0.8, 0.75, 0.5, 0.55)
        };
        gizmos.line_2d(Vec2::new(a.x, -a.y), Vec2::new(b.x, -b.y), color);
    }
}
