//! History event normalization and classification.
//!
//! The backend's log lines are heterogeneous: the epoch may live under
//! `created_at`, `age`, or `data.age`, references may be embedded records or
//! bare ids, and some lines are free-form. Everything funnels through one
//! normalization step here so the rest of the engine works with a single
//! canonical record.

use serde_json::Value;

use crate::entity::EntityKind;

/// Reference to an entity inside an event payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEntityRef {
    pub id: String,
    pub kind: Option<EntityKind>,
    pub parent_id: Option<String>,
}

/// Canonical history event record.
#[derive(Debug, Clone)]
pub struct HistoryEvent {
    /// Raw event type string as logged; may be empty.
    pub event_type: String,
    /// Resolved epoch. Precedence: root `created_at`, root `age`, `data.age`,
    /// else 0.
    pub epoch: u64,
    pub summary: Option<String>,
    pub primary_entity: Option<EventEntityRef>,
    pub location_id: Option<String>,
    /// Remaining structured payload.
    pub data: serde_json::Map<String, Value>,
}

impl HistoryEvent {
    /// Normalizes a structured log record. Returns `None` for shapes that are
    /// not objects; a missing event type or epoch is not an error.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let data = object
            .get("data")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let epoch = coerce_epoch(object.get("created_at"))
            .or_else(|| coerce_epoch(object.get("age")))
            .or_else(|| coerce_epoch(data.get("age")))
            .unwrap_or(0);

        Some(Self {
            event_type: object
                .get("event_type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            epoch,
            summary: object
                .get("summary")
                .and_then(Value::as_str)
                .map(str::to_string),
            primary_entity: object.get("primary_entity").and_then(entity_ref),
            location_id: object
                .get("location_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            data,
        })
    }

    /// Parses and normalizes a serialized log line.
    pub fn from_line(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;
        Self::from_value(&value)
    }

    /// Classifies this event for glyph/animation selection.
    pub fn class(&self) -> EventClass {
        EventClass::classify(&self.event_type)
    }
}

/// Epoch values arrive as integers, floats, or numeric strings. Anything
/// negative or non-numeric resolves to nothing and the next fallback applies.
fn coerce_epoch(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(u)
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.max(0.0) as u64)
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.max(0.0) as u64),
        _ => None,
    }
}

/// A reference is either a full embedded entity record or a bare id string.
fn entity_ref(value: &Value) -> Option<EventEntityRef> {
    match value {
        Value::String(id) if !id.is_empty() => Some(EventEntityRef {
            id: id.clone(),
            kind: None,
            parent_id: None,
        }),
        Value::Object(object) => {
            let id = object.get("id").and_then(Value::as_str)?;
            Some(EventEntityRef {
                id: id.to_string(),
                kind: object
                    .get("type")
                    .and_then(Value::as_str)
                    .map(|t| EntityKind::from(t.to_string())),
                parent_id: object
                    .get("parent_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        }
        _ => None,
    }
}

/// Closed classifier over the open event-type strings.
///
/// The backend names event types freely; matching is a deliberate,
/// best-effort substring check so the animation layer can switch on a closed
/// enum. Unrecognized types are `Unknown`, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    Conflict,
    Death,
    Migration,
    Growth,
    Diplomacy,
    Unknown,
}

const CONFLICT_KEYWORDS: &[&str] = &["conflict", "raid", "war", "battle", "attack", "siege"];
const DEATH_KEYWORDS: &[&str] = &["death", "kill", "depleted", "collapse", "destro"];
const MIGRATION_KEYWORDS: &[&str] = &["migration", "flee", "exodus", "migrate"];
const GROWTH_KEYWORDS: &[&str] = &["birth", "discovery", "growth", "found", "settle", "spawn"];
const DIPLOMACY_KEYWORDS: &[&str] = &["diplomacy", "alliance", "treaty", "pact"];

impl EventClass {
    /// Classifies an event type string, case-insensitively.
    pub fn classify(event_type: &str) -> Self {
        let lowered = event_type.to_ascii_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

        if matches(CONFLICT_KEYWORDS) {
            EventClass::Conflict
        } else if matches(DEATH_KEYWORDS) {
            EventClass::Death
        } else if matches(MIGRATION_KEYWORDS) {
            EventClass::Migration
        } else if matches(GROWTH_KEYWORDS) {
            EventClass::Growth
        } else if matches(DIPLOMACY_KEYWORDS) {
            EventClass::Diplomacy
        } else {
            EventClass::Unknown
        }
    }
}
