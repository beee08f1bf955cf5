//! Validated extraction output
//!
//! Model output is loosely shaped. Records are converted one by one into
//! typed mentions; a record without its required field is rejected and
//! counted, never fatal.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterMention {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

impl CharacterMention {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationMention {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub location_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMention {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMention {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Everything extracted from one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySet {
    pub characters: Vec<CharacterMention>,
    pub locations: Vec<LocationMention>,
    pub events: Vec<EventMention>,
    pub relationships: Vec<RelationshipMention>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Per-section counts of records dropped during validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rejections {
    pub characters: usize,
    pub locations: usize,
    pub events: usize,
    pub relationships: usize,
    pub objects: usize,
}

impl Rejections {
    pub fn total(&self) -> usize {
        self.characters + self.locations + self.events + self.relationships + self.objects
    }
}

impl EntitySet {
    /// Validate a parsed model reply.
    ///
    /// Missing sections are empty. A section that is not an array counts as
    /// one rejection.
    pub fn from_json(obj: &Map<String, Value>) -> (Self, Rejections) {
        let mut set = EntitySet::default();
        let mut rejected = Rejections::default();

        for record in records(obj, "characters", &mut rejected.characters) {
            match character(record) {
                Some(c) => set.characters.push(c),
                None => rejected.characters += 1,
            }
        }
        for record in records(obj, "locations", &mut rejected.locations) {
            match location(record) {
                Some(l) => set.locations.push(l),
                None => rejected.locations += 1,
            }
        }
        for record in records(obj, "events", &mut rejected.events) {
            match text_or_field(record, &["description", "event"]) {
                Some(description) => set.events.push(EventMention { description }),
                None => rejected.events += 1,
            }
        }
        for record in records(obj, "relationships", &mut rejected.relationships) {
            match relationship(record) {
                Some(r) => set.relationships.push(r),
                None => rejected.relationships += 1,
            }
        }
        for record in records(obj, "objects", &mut rejected.objects) {
            match text_or_field(record, &["name"]) {
                Some(name) => set.objects.push(name),
                None => rejected.objects += 1,
            }
        }
        set.summary = obj.get("summary").and_then(scalar);

        (set, rejected)
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
            && self.locations.is_empty()
            && self.events.is_empty()
            && self.relationships.is_empty()
            && self.objects.is_empty()
    }

    pub fn character_names(&self) -> Vec<String> {
        self.characters.iter().map(|c| c.name.clone()).collect()
    }
}

fn records<'a>(obj: &'a Map<String, Value>, key: &str, rejected: &mut usize) -> &'a [Value] {
    match obj.get(key) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => &[],
        Some(_) => {
            *rejected += 1;
            &[]
        }
    }
}

/// Non-empty trimmed text of a scalar value
fn scalar(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn field(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| record.get(*k).and_then(scalar))
}

/// A plain string, or the first present field of an object
fn text_or_field(record: &Value, keys: &[&str]) -> Option<String> {
    match record {
        Value::Object(map) => field(map, keys),
        other => scalar(other),
    }
}

fn character(record: &Value) -> Option<CharacterMention> {
    match record {
        Value::Object(map) => Some(CharacterMention {
            name: field(map, &["name"])?,
            archetype: field(map, &["archetype"]),
            emotion: field(map, &["emotion"]),
            goal: field(map, &["goal"]),
        }),
        other => scalar(other).map(CharacterMention::named),
    }
}

fn location(record: &Value) -> Option<LocationMention> {
    match record {
        Value::Object(map) => Some(LocationMention {
            name: field(map, &["name"])?,
            location_type: field(map, &["type", "location_type"]),
        }),
        other => scalar(other).map(|name| LocationMention {
            name,
            location_type: None,
        }),
    }
}

fn relationship(record: &Value) -> Option<RelationshipMention> {
    let map = record.as_object()?;
    Some(RelationshipMention {
        source: field(map, &["source", "from"])?,
        target: field(map, &["target", "to"])?,
        kind: field(map, &["type", "kind", "relationship"]),
    })
}
