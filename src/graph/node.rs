//! Node representation in the story graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a manuscript
///
/// Opaque to the core. Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManuscriptId(String);

impl ManuscriptId {
    /// Create a ManuscriptId from a string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Node id of the manuscript in the edge table
    pub fn node_id(&self) -> String {
        format!("manuscript:{}", self.0)
    }
}

impl std::fmt::Display for ManuscriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ManuscriptId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ManuscriptId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a scene
///
/// Composite of manuscript id, paragraph id and chunk index, so the same
/// chunk of the same paragraph always maps to the same scene. Components are
/// escaped so a `::` inside an id cannot forge another scene's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    /// Compose the scene id for a chunk of a paragraph
    pub fn compose(manuscript: &ManuscriptId, paragraph_id: &str, chunk_index: usize) -> Self {
        Self(format!(
            "{}::{}::{}",
            escape_component(manuscript.as_str()),
            escape_component(paragraph_id),
            chunk_index
        ))
    }

    /// Create a SceneId from a raw string (e.g. loaded from storage)
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape_component(raw: &str) -> String {
    raw.replace('%', "%25").replace(':', "%3A")
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Case-fold a canonical name for identity comparison.
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Node id of the entity with the given canonical name.
pub fn entity_node_id(name: &str) -> String {
    format!("entity:{}", fold_name(name))
}

/// One processed chunk of manuscript text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub manuscript_id: ManuscriptId,
    /// Position of the scene in the manuscript timeline
    pub sequence_index: i64,
    pub chapter: Option<u32>,
    pub paragraph_id: String,
    /// Position of the chunk within its submission
    pub chunk_index: usize,
    pub raw_text: String,
    /// Text of the first event extracted for this scene
    pub description: Option<String>,
    /// One-line summary produced by extraction
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Character-variant fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub archetype: Option<String>,
    pub emotion: Option<String>,
    pub goal: Option<String>,
}

/// Location-variant fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: Option<String>,
}

/// A named story entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NarrativeEntity {
    Character(Character),
    Location(Location),
}

impl NarrativeEntity {
    /// Canonical name as written
    pub fn name(&self) -> &str {
        match self {
            Self::Character(c) => &c.name,
            Self::Location(l) => &l.name,
        }
    }

    /// Case-folded name used as the identity key
    pub fn key(&self) -> String {
        fold_name(self.name())
    }

    pub fn node_id(&self) -> String {
        entity_node_id(self.name())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Character(_) => "character",
            Self::Location(_) => "location",
        }
    }
}

/// Something that happens in a scene
///
/// Identity is content-derived: the same description in the same scene of
/// the same manuscript always yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub description: String,
    pub scene_id: SceneId,
    pub manuscript_id: ManuscriptId,
}

impl Event {
    pub fn new(manuscript: &ManuscriptId, scene: &SceneId, description: impl Into<String>) -> Self {
        let description = description.into();
        let key = format!("{}\u{1f}{}\u{1f}{}", manuscript, scene, description);
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()),
            description,
            scene_id: scene.clone(),
            manuscript_id: manuscript.clone(),
        }
    }

    pub fn node_id(&self) -> String {
        format!("event:{}", self.id)
    }
}
