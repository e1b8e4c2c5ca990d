//! Sample world data for tests and demo mode.
//!
//! Enable the `test-fixtures` feature to access these helpers from other
//! crates:
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // world-model = { path = "../world-model", features = ["test-fixtures"] }
//!
//! use world_model::fixtures;
//!
//! let layout = fixtures::sample_layout();
//! let graph = fixtures::sample_graph();
//! let lines = fixtures::sample_history_lines();
//! ```

use crate::entity::{Entity, EntityKind, Relation, RelationKind};
use crate::graph::WorldGraph;
use crate::layout::WorldLayout;

/// Mints an instance id in the generator's format, e.g. "loc_village_8d7a".
pub fn make_instance_id(definition_id: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", definition_id, &suffix[..4])
}

/// A 3x2 layout with three occupied tiles.
pub fn sample_layout() -> WorldLayout {
    let mut layout = WorldLayout::new(3, 2);
    layout.set_cell(0, 0, "b_forest");
    layout.set_cell(1, 0, "b_plains");
    layout.set_cell(2, 1, "b_swamp");
    layout
}

/// A small world: two biomes, three locations, two factions, one character,
/// spread over epochs 0..=4, with explicit relations and one dead entity.
pub fn sample_graph() -> WorldGraph {
    let forest = Entity::new("b_forest_00", EntityKind::Biome, "Old Forest")
        .with_definition("b_forest")
        .with_coord(0, 0);
    let swamp = Entity::new("b_swamp_01", EntityKind::Biome, "Mirefen")
        .with_definition("b_swamp")
        .with_coord(2, 1);

    let village = Entity::new("loc_village_a1", EntityKind::Location, "Thornholt")
        .with_definition("loc_village")
        .with_parent("b_forest_00");
    let shrine = Entity::new("loc_shrine_b2", EntityKind::Location, "Sunken Shrine")
        .with_definition("loc_shrine")
        .with_parent("b_forest_00")
        .with_created_at(2);
    let dock = Entity::new("loc_dock_c3", EntityKind::Location, "Eel Dock")
        .with_definition("loc_dock")
        .with_parent("b_swamp_01")
        .with_created_at(1);

    let wolves = Entity::new("f_wolves_d4", EntityKind::Faction, "Wolf Clan")
        .with_definition("f_clan")
        .with_parent("loc_village_a1")
        .with_created_at(1);
    let eels = Entity::new("f_eels_e5", EntityKind::Faction, "Eel Pact")
        .with_definition("f_pact")
        .with_parent("loc_dock_c3")
        .with_created_at(3);

    let old_king = Entity::new("c_old_king_f6", EntityKind::Character, "The Old King")
        .with_parent("loc_village_a1")
        .with_created_at(1)
        .with_tag("dead");

    let mut graph = WorldGraph::default();
    for entity in [
        forest.clone(),
        swamp,
        village.clone(),
        shrine,
        dock.clone(),
        wolves.clone(),
        eels.clone(),
        old_king,
    ] {
        graph.insert(entity);
    }

    graph.relations.push(Relation {
        from_entity: wolves.clone(),
        to_entity: eels.clone(),
        relation_type: RelationKind::Id("rivals_with".to_string()),
    });
    graph.relations.push(Relation {
        from_entity: wolves,
        to_entity: village,
        relation_type: RelationKind::Id("controls".to_string()),
    });
    graph
}

/// History lines matching [`sample_graph`], including one malformed line.
pub fn sample_history_lines() -> Vec<String> {
    vec![
        r#"{"created_at":1,"event_type":"settlement_founded","summary":"Thornholt rises","location_id":"loc_village_a1"}"#.to_string(),
        r#"{"age":2,"event_type":"discovery","summary":"A shrine surfaces","location_id":"loc_shrine_b2"}"#.to_string(),
        "### corrupted line ###".to_string(),
        r#"{"created_at":3,"event_type":"raid_start","summary":"Wolves raid the dock","primary_entity":{"id":"f_eels_e5","type":"Faction","parent_id":"loc_dock_c3"}}"#.to_string(),
        r#"{"data":{"age":4},"event_type":"leader_death","summary":"The Old King dies","primary_entity":{"id":"c_old_king_f6","type":"Character","parent_id":"loc_village_a1"}}"#.to_string(),
    ]
}
