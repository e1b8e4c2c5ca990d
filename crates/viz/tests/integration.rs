//! Integration tests for the visualization layer.
//!
//! These run the non-rendering pipeline end to end: backend fetch, history
//! indexing, tile layout, anchor resolution, playback, and the incremental
//! graph diff, all against the shared sample world.

use std::time::Duration;

use bevy::math::Vec2;

use viz::camera::ContentSize;
use viz::effects::resolve_anchor;
use viz::graph::{ForceLayout, SpringLayout, GRAPH_BOUNDS};
use viz::loader::{load_world, WorldState};
use viz::playback::PlaybackState;
use viz::tile_layout::{build_render_cache, tile_center, RenderCache, TILE_SIZE};
use world_client::{fs::write_world_dir, FileBackend, MemoryBackend};
use world_model::{fixtures, GraphTemporalFilter};

fn loaded_sample_world() -> (WorldState, RenderCache, PlaybackState) {
    let backend = MemoryBackend::new(
        fixtures::sample_layout(),
        fixtures::sample_graph(),
        fixtures::sample_history_lines(),
    );
    let mut state = WorldState::default();
    let mut cache = RenderCache::default();
    let mut playback = PlaybackState::default();
    let mut content = ContentSize::default();
    assert!(load_world(
        &backend,
        &mut state,
        &mut cache,
        &mut playback,
        &mut content
    ));
    (state, cache, playback)
}

#[test]
fn test_sample_world_loads_end_to_end() {
    let (state, cache, playback) = loaded_sample_world();

    // One corrupted line in the sample log is skipped, four events survive.
    assert_eq!(state.history.len(), 4);
    assert_eq!(playback.max_epoch, 4);

    // Every biome and every biome child is placed.
    for id in [
        "b_forest_00",
        "b_swamp_01",
        "loc_village_a1",
        "loc_shrine_b2",
        "loc_dock_c3",
    ] {
        assert!(cache.position_of(id).is_some(), "{} not placed", id);
    }
}

#[test]
fn test_every_sample_event_resolves_an_anchor() {
    let (state, cache, _) = loaded_sample_world();

    for epoch in state.history.epochs().collect::<Vec<_>>() {
        for event in state.history.events_at(epoch) {
            let anchor = resolve_anchor(event, &state.graph, &cache);
            assert!(
                anchor.is_some(),
                "event {:?} at epoch {} has no anchor",
                event.event_type,
                epoch
            );
        }
    }

    // The raid on the dock lands on the dock's tile position.
    let raid = &state.history.events_at(3)[0];
    assert_eq!(
        resolve_anchor(raid, &state.graph, &cache),
        cache.position_of("loc_dock_c3")
    );
}

#[test]
fn test_three_locations_ring_inside_tile() {
    let mut layout = world_model::WorldLayout::new(3, 2);
    layout.set_cell(0, 0, "b_forest");

    let mut graph = world_model::WorldGraph::default();
    graph.insert(
        world_model::Entity::new("b_forest_00", world_model::EntityKind::Biome, "Forest")
            .with_coord(0, 0),
    );
    for id in ["loc_1", "loc_2", "loc_3"] {
        graph.insert(
            world_model::Entity::new(id, world_model::EntityKind::Location, id)
                .with_parent("b_forest_00"),
        );
    }

    let cache = build_render_cache(&layout, &graph);
    let center = tile_center(0, 0);
    let radius = 0.3 * TILE_SIZE;

    let top = cache.position_of("loc_1").unwrap();
    assert!((top - (center + Vec2::new(0.0, -radius))).length() < 0.1);
    for id in ["loc_1", "loc_2", "loc_3"] {
        let pos = cache.position_of(id).unwrap();
        assert!((pos.distance(center) - radius).abs() < 0.1);
    }
}

#[test]
fn test_playback_replays_whole_sample_timeline() {
    let (_, _, mut playback) = loaded_sample_world();
    playback.play();

    let epoch = Duration::from_millis(100);
    let mut crossings = Vec::new();
    let mut now = 0.0;
    loop {
        let advance = playback.advance(now, epoch);
        crossings.extend(advance.crossings);
        if advance.finished {
            break;
        }
        now += 0.016;
        assert!(now < 10.0, "playback never finished");
    }

    assert_eq!(crossings, vec![1, 2, 3, 4]);
    assert_eq!(playback.current_epoch, 4);
    assert_eq!(playback.progress, 1.0);
}

#[test]
fn test_graph_diff_preserves_positions_across_epochs() {
    let (state, _, _) = loaded_sample_world();
    let filter = GraphTemporalFilter::default();
    let mut engine = SpringLayout::new(GRAPH_BOUNDS);

    // Epoch 0: only the initial entities exist.
    let epoch0 = filter.visible_set(&state.graph, 0);
    for node in &epoch0.nodes {
        engine.add_node(&node.id, Vec2::new(600.0, 400.0));
    }
    engine.run_layout(100);
    let forest_before = engine.position("b_forest_00").unwrap();

    // Scrub to epoch 3: apply only the additive diff.
    let epoch3 = filter.visible_set(&state.graph, 3);
    assert!(epoch3.nodes.len() > epoch0.nodes.len());
    for node in &epoch3.nodes {
        if engine.position(&node.id).is_none() {
            let seed = node
                .parent_id
                .as_deref()
                .and_then(|p| engine.position(p))
                .unwrap_or(Vec2::new(300.0, 300.0));
            engine.add_node(&node.id, seed + Vec2::new(5.0, 5.0));
        }
    }
    for edge in &epoch3.edges {
        engine.add_edge(edge.from, edge.to);
    }

    // The already-placed node did not move during the diff itself.
    assert_eq!(engine.position("b_forest_00").unwrap(), forest_before);
    assert!(engine.position("f_eels_e5").is_some());
}

#[test]
fn test_dead_entities_stay_out_of_the_graph_view() {
    let (state, _, _) = loaded_sample_world();
    let filter = GraphTemporalFilter::default();

    // The Old King is tagged dead: present in the world, absent on screen.
    assert!(state.graph.get("c_old_king_f6").is_some());
    let visible = filter.visible_set(&state.graph, 4);
    assert!(!visible.contains("c_old_king_f6"));
}

#[test]
fn test_file_backend_round_trip_into_viewer_state() {
    let dir = tempfile::tempdir().unwrap();
    write_world_dir(
        dir.path(),
        &fixtures::sample_layout(),
        &fixtures::sample_graph(),
        &fixtures::sample_history_lines(),
    )
    .unwrap();

    let backend = FileBackend::new(dir.path());
    let mut state = WorldState::default();
    let mut cache = RenderCache::default();
    let mut playback = PlaybackState::default();
    let mut content = ContentSize::default();
    assert!(load_world(
        &backend,
        &mut state,
        &mut cache,
        &mut playback,
        &mut content
    ));

    assert_eq!(playback.max_epoch, 4);
    assert_eq!(content.width, 3.0 * TILE_SIZE);
    assert!(cache.position_of("loc_dock_c3").is_some());
}
