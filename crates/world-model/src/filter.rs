//! Temporal and type visibility filtering for the graph view.

use std::collections::{BTreeSet, HashSet};

use crate::entity::{Entity, EntityKind};
use crate::graph::WorldGraph;

/// Lifecycle tags the backend excludes from graph snapshots by default.
pub const DEFAULT_EXCLUDED_TAGS: &[&str] = &["dead", "inactive", "absorbed"];

/// An edge in the visible set. Hierarchy edges (child to parent) are
/// synthesized in addition to the explicit relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind<'a> {
    Relation(&'a str),
    Hierarchy,
}

/// A renderable edge between two visible nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleEdge<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub kind: EdgeKind<'a>,
}

impl VisibleEdge<'_> {
    /// Display label for the edge.
    pub fn label(&self) -> &str {
        match self.kind {
            EdgeKind::Relation(label) => label,
            EdgeKind::Hierarchy => "part_of",
        }
    }
}

/// The node/edge set visible at one epoch under one filter configuration.
#[derive(Debug, Default)]
pub struct VisibleSet<'a> {
    /// Visible entities, sorted by id for reproducible output.
    pub nodes: Vec<&'a Entity>,
    pub edges: Vec<VisibleEdge<'a>>,
}

impl VisibleSet<'_> {
    /// True when a node id is in the set.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.binary_search_by(|e| e.id.as_str().cmp(id)).is_ok()
    }
}

/// Computes the visible node/edge set for an epoch and a visibility mask.
#[derive(Debug, Clone)]
pub struct GraphTemporalFilter {
    /// Entity kinds toggled off in the UI.
    pub hidden_kinds: BTreeSet<EntityKind>,
    /// Lifecycle tags that hide an entity.
    pub excluded_tags: BTreeSet<String>,
}

impl Default for GraphTemporalFilter {
    fn default() -> Self {
        Self {
            hidden_kinds: BTreeSet::new(),
            excluded_tags: DEFAULT_EXCLUDED_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl GraphTemporalFilter {
    /// A filter with no tag exclusions (shows dead entities too).
    pub fn all_lifecycles() -> Self {
        Self {
            hidden_kinds: BTreeSet::new(),
            excluded_tags: BTreeSet::new(),
        }
    }

    /// Toggles a kind, returning whether it is now hidden.
    pub fn toggle_kind(&mut self, kind: EntityKind) -> bool {
        if self.hidden_kinds.remove(&kind) {
            false
        } else {
            self.hidden_kinds.insert(kind);
            true
        }
    }

    /// True when the kind is currently hidden.
    pub fn is_hidden(&self, kind: &EntityKind) -> bool {
        self.hidden_kinds.contains(kind)
    }

    /// Node visibility: born by `epoch`, kind not hidden, no excluded tag.
    pub fn node_visible(&self, entity: &Entity, epoch: u64) -> bool {
        entity.created_at <= epoch
            && !self.hidden_kinds.contains(&entity.kind)
            && !entity
                .tags
                .iter()
                .any(|t| self.excluded_tags.contains(t.as_str()))
    }

    /// Computes the visible set for one epoch.
    ///
    /// An edge survives only if both endpoints are visible; a child whose
    /// parent was filtered out is drawn with no hierarchy edge.
    pub fn visible_set<'a>(&self, graph: &'a WorldGraph, epoch: u64) -> VisibleSet<'a> {
        let mut nodes: Vec<&Entity> = graph
            .entities
            .values()
            .filter(|e| self.node_visible(e, epoch))
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let visible_ids: HashSet<&str> = nodes.iter().map(|e| e.id.as_str()).collect();

        let mut edges = Vec::new();
        for relation in &graph.relations {
            let from = relation.from_entity.id.as_str();
            let to = relation.to_entity.id.as_str();
            if visible_ids.contains(from) && visible_ids.contains(to) {
                edges.push(VisibleEdge {
                    from,
                    to,
                    kind: EdgeKind::Relation(relation.label()),
                });
            }
        }
        for node in &nodes {
            if let Some(parent_id) = node.parent_id.as_deref() {
                if visible_ids.contains(parent_id) {
                    edges.push(VisibleEdge {
                        from: node.id.as_str(),
                        to: parent_id,
                        kind: EdgeKind::Hierarchy,
                    });
                }
            }
        }

        VisibleSet { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Relation, RelationKind};

    fn sample_graph() -> WorldGraph {
        let biome = Entity::new("b_forest_00", EntityKind::Biome, "Old Forest");
        let faction = Entity::new("f_wolves", EntityKind::Faction, "Wolf Clan")
            .with_parent("b_forest_00")
            .with_created_at(1);
        let location = Entity::new("loc_den_01", EntityKind::Location, "The Den")
            .with_parent("b_forest_00")
            .with_created_at(2);

        let mut graph = WorldGraph::default();
        graph.insert(biome);
        graph.insert(faction.clone());
        graph.insert(location.clone());
        graph.relations.push(Relation {
            from_entity: faction,
            to_entity: location,
            relation_type: RelationKind::Id("claims".to_string()),
        });
        graph
    }

    #[test]
    fn test_hidden_kind_removes_node_and_edges() {
        let mut filter = GraphTemporalFilter::default();
        filter.toggle_kind(EntityKind::Faction);

        let graph = sample_graph();
        let visible = filter.visible_set(&graph, 3);

        let ids: Vec<_> = visible.nodes.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b_forest_00", "loc_den_01"]);
        assert!(visible
            .edges
            .iter()
            .all(|e| e.from != "f_wolves" && e.to != "f_wolves"));
        // The location keeps its hierarchy edge to the biome.
        assert!(visible
            .edges
            .iter()
            .any(|e| e.from == "loc_den_01" && e.to == "b_forest_00" && e.kind == EdgeKind::Hierarchy));
    }

    #[test]
    fn test_unborn_nodes_hidden() {
        let filter = GraphTemporalFilter::default();
        let graph = sample_graph();

        let visible = filter.visible_set(&graph, 0);
        let ids: Vec<_> = visible.nodes.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b_forest_00"]);
        assert!(visible.edges.is_empty());

        let visible = filter.visible_set(&graph, 1);
        assert!(visible.contains("f_wolves"));
        assert!(!visible.contains("loc_den_01"));
        // The claims relation needs the location born at epoch 2.
        assert!(!visible
            .edges
            .iter()
            .any(|e| matches!(e.kind, EdgeKind::Relation(_))));
    }

    #[test]
    fn test_relation_appears_with_both_endpoints() {
        let filter = GraphTemporalFilter::default();
        let graph = sample_graph();
        let visible = filter.visible_set(&graph, 2);
        assert!(visible
            .edges
            .iter()
            .any(|e| e.from == "f_wolves" && e.to == "loc_den_01" && e.label() == "claims"));
    }

    #[test]
    fn test_excluded_tags_hide_dead() {
        let filter = GraphTemporalFilter::default();
        let mut graph = sample_graph();
        graph.insert(
            Entity::new("c_old_king", EntityKind::Character, "Old King")
                .with_tag("dead")
                .with_parent("b_forest_00"),
        );

        let visible = filter.visible_set(&graph, 9);
        assert!(!visible.contains("c_old_king"));

        let visible = GraphTemporalFilter::all_lifecycles().visible_set(&graph, 9);
        assert!(visible.contains("c_old_king"));
    }

    #[test]
    fn test_toggle_kind() {
        let mut filter = GraphTemporalFilter::default();
        assert!(filter.toggle_kind(EntityKind::Belief));
        assert!(filter.is_hidden(&EntityKind::Belief));
        assert!(!filter.toggle_kind(EntityKind::Belief));
        assert!(!filter.is_hidden(&EntityKind::Belief));
    }

    #[test]
    fn test_missing_relation_endpoint_dropped() {
        let filter = GraphTemporalFilter::default();
        let mut graph = sample_graph();
        graph.relations.push(Relation {
            from_entity: Entity::new("ghost", EntityKind::Faction, "Ghost"),
            to_entity: Entity::new("b_forest_00", EntityKind::Biome, "Old Forest"),
            relation_type: RelationKind::Id("haunts".to_string()),
        });

        let visible = filter.visible_set(&graph, 9);
        assert!(!visible.edges.iter().any(|e| e.label() == "haunts"));
    }
}
