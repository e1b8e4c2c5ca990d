//! Entity and relation records matching the world generator's output schema.
//!
//! Entities are immutable once created: the generator never edits them in
//! place, and a "dead" entity stays in the graph with a lifecycle tag rather
//! than being removed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Entity type tag.
///
/// The set is open: the generator may emit tags this build does not know
/// about, and those round-trip through `Other` instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Biome,
    Location,
    Faction,
    Character,
    Resource,
    Event,
    Conflict,
    Item,
    Ritual,
    Belief,
    Boss,
    Other(String),
}

impl EntityKind {
    /// Returns the wire tag for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::Biome => "Biome",
            EntityKind::Location => "Location",
            EntityKind::Faction => "Faction",
            EntityKind::Character => "Character",
            EntityKind::Resource => "Resource",
            EntityKind::Event => "Event",
            EntityKind::Conflict => "Conflict",
            EntityKind::Item => "Item",
            EntityKind::Ritual => "Ritual",
            EntityKind::Belief => "Belief",
            EntityKind::Boss => "Boss",
            EntityKind::Other(tag) => tag,
        }
    }

    /// Kinds that live inside a biome tile and anchor to their parent when an
    /// event needs an on-screen position.
    pub fn is_located(&self) -> bool {
        matches!(
            self,
            EntityKind::Faction | EntityKind::Resource | EntityKind::Character | EntityKind::Boss
        )
    }
}

impl From<String> for EntityKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "Biome" => EntityKind::Biome,
            "Location" => EntityKind::Location,
            "Faction" => EntityKind::Faction,
            "Character" => EntityKind::Character,
            "Resource" => EntityKind::Resource,
            "Event" => EntityKind::Event,
            "Conflict" => EntityKind::Conflict,
            "Item" => EntityKind::Item,
            "Ritual" => EntityKind::Ritual,
            "Belief" => EntityKind::Belief,
            "Boss" => EntityKind::Boss,
            _ => EntityKind::Other(tag),
        }
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view over the entity attribute bag.
///
/// Known spatial/display attributes get fields; everything else the generator
/// attaches is preserved in `extra` untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityData {
    /// Explicit display glyph, wins over any derived icon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Grid coordinate for biome tiles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<[i64; 2]>,
    /// Slot assigned inside the parent tile.
    #[serde(
        default,
        alias = "spatial_slot_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub slot_index: Option<u32>,
    /// Normalized position inside the parent, both axes in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_coord: Option<[f64; 2]>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single world entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique instance id, e.g. "loc_village_8d7a".
    pub id: String,
    /// Archetype id shared by all instances of the same template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<String>,
    /// Entity type tag.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free-form tags, including lifecycle states such as "dead".
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    /// Owning entity, e.g. a location's parent biome. A back-reference, not
    /// ownership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Epoch the entity came into existence. 0 for the initial world.
    #[serde(default)]
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EntityData>,
}

impl Entity {
    /// Creates a minimal entity; fixture and test helper.
    pub fn new(id: impl Into<String>, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            definition_id: None,
            kind,
            name: name.into(),
            tags: BTreeSet::new(),
            capacity: None,
            parent_id: None,
            created_at: 0,
            data: None,
        }
    }

    /// Sets the parent reference.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the creation epoch.
    pub fn with_created_at(mut self, epoch: u64) -> Self {
        self.created_at = epoch;
        self
    }

    /// Sets the grid coordinate (biome tiles).
    pub fn with_coord(mut self, x: i64, y: i64) -> Self {
        self.data.get_or_insert_with(EntityData::default).coord = Some([x, y]);
        self
    }

    /// Adds a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Sets the definition id.
    pub fn with_definition(mut self, definition_id: impl Into<String>) -> Self {
        self.definition_id = Some(definition_id.into());
        self
    }

    /// Explicit icon from the attribute bag, if any.
    pub fn icon(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.icon.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Grid coordinate from the attribute bag, if any.
    pub fn coord(&self) -> Option<(i64, i64)> {
        self.data
            .as_ref()
            .and_then(|d| d.coord)
            .map(|[x, y]| (x, y))
    }

    /// Checks a single tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Checks whether any of the given tags is present.
    pub fn has_any_tag<'a, I: IntoIterator<Item = &'a str>>(&self, tags: I) -> bool {
        tags.into_iter().any(|t| self.tags.contains(t))
    }
}

/// Relation type reference.
///
/// The generator serializes this either as a bare id string or as a full
/// record; both shapes are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationKind {
    Id(String),
    Typed(RelationTypeRecord),
}

impl RelationKind {
    /// Returns the relation type id regardless of wire shape.
    pub fn id(&self) -> &str {
        match self {
            RelationKind::Id(id) => id,
            RelationKind::Typed(record) => &record.id,
        }
    }
}

/// Full relation type record as the generator registers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationTypeRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_type: Option<EntityKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_type: Option<EntityKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_symmetric: bool,
}

/// A directed relation between two entities.
///
/// Endpoints are embedded entity records (the generator dumps the full
/// entity, not just the id), so each endpoint carries its own `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub from_entity: Entity,
    pub to_entity: Entity,
    pub relation_type: RelationKind,
}

impl Relation {
    /// The epoch this relation becomes renderable: the later of its two
    /// endpoints' creation epochs.
    pub fn effective_epoch(&self) -> u64 {
        self.from_entity.created_at.max(self.to_entity.created_at)
    }

    /// Display label for the relation.
    pub fn label(&self) -> &str {
        self.relation_type.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_roundtrip() {
        let json = serde_json::to_string(&EntityKind::Faction).unwrap();
        assert_eq!(json, r#""Faction""#);
        let parsed: EntityKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, EntityKind::Faction);
    }

    #[test]
    fn test_entity_kind_open_set() {
        let parsed: EntityKind = serde_json::from_str(r#""Prophecy""#).unwrap();
        assert_eq!(parsed, EntityKind::Other("Prophecy".to_string()));
        assert_eq!(parsed.as_str(), "Prophecy");
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#""Prophecy""#);
    }

    #[test]
    fn test_entity_kind_is_located() {
        assert!(EntityKind::Faction.is_located());
        assert!(EntityKind::Boss.is_located());
        assert!(!EntityKind::Location.is_located());
        assert!(!EntityKind::Biome.is_located());
    }

    #[test]
    fn test_entity_minimal_parse() {
        let json = r#"{"id":"b_forest_01","type":"Biome","name":"Old Forest"}"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.id, "b_forest_01");
        assert_eq!(entity.kind, EntityKind::Biome);
        assert_eq!(entity.created_at, 0);
        assert!(entity.parent_id.is_none());
        assert!(entity.icon().is_none());
    }

    #[test]
    fn test_entity_data_bag() {
        let json = r#"{
            "id": "loc_village_8d7a",
            "type": "Location",
            "name": "Mirefen",
            "parent_id": "b_swamp_02",
            "created_at": 4,
            "data": {"icon": "H", "spatial_slot_index": 2, "local_coord": [0.35, 0.35], "mood": "grim"}
        }"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.icon(), Some("H"));
        let data = entity.data.as_ref().unwrap();
        assert_eq!(data.slot_index, Some(2));
        assert_eq!(data.local_coord, Some([0.35, 0.35]));
        assert_eq!(data.extra.get("mood").unwrap(), "grim");
    }

    #[test]
    fn test_entity_coord() {
        let biome = Entity::new("b_tundra_00", EntityKind::Biome, "Frostmark").with_coord(2, 1);
        assert_eq!(biome.coord(), Some((2, 1)));
    }

    #[test]
    fn test_relation_kind_both_shapes() {
        let bare: RelationKind = serde_json::from_str(r#""believes_in""#).unwrap();
        assert_eq!(bare.id(), "believes_in");

        let typed: RelationKind = serde_json::from_str(
            r#"{"id":"leads","from_type":"Character","to_type":"Faction","description":"Leads"}"#,
        )
        .unwrap();
        assert_eq!(typed.id(), "leads");
    }

    #[test]
    fn test_relation_effective_epoch() {
        let relation = Relation {
            from_entity: Entity::new("f_a", EntityKind::Faction, "A").with_created_at(2),
            to_entity: Entity::new("f_b", EntityKind::Faction, "B").with_created_at(7),
            relation_type: RelationKind::Id("rivals_with".to_string()),
        };
        assert_eq!(relation.effective_epoch(), 7);
    }

    #[test]
    fn test_has_any_tag() {
        let entity = Entity::new("c_old_king", EntityKind::Character, "The Old King")
            .with_tag("dead")
            .with_tag("royal");
        assert!(entity.has_any_tag(["dead", "inactive"]));
        assert!(!entity.has_any_tag(["absorbed", "fled"]));
    }
}
