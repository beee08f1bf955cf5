//! Directed relationships between story nodes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Relationship types written by the ingestion pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    /// Manuscript contains scene
    Contains,
    /// Scene is followed by scene
    NextScene,
    /// Character appears in scene
    AppearsIn,
    /// Scene takes place at location
    SettingIs,
    /// Scene includes event
    IncludesEvent,
    /// Character interacts with character
    InteractsWith,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "CONTAINS",
            Self::NextScene => "NEXT_SCENE",
            Self::AppearsIn => "APPEARS_IN",
            Self::SettingIs => "SETTING_IS",
            Self::IncludesEvent => "INCLUDES_EVENT",
            Self::InteractsWith => "INTERACTS_WITH",
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONTAINS" => Ok(Self::Contains),
            "NEXT_SCENE" => Ok(Self::NextScene),
            "APPEARS_IN" => Ok(Self::AppearsIn),
            "SETTING_IS" => Ok(Self::SettingIs),
            "INCLUDES_EVENT" => Ok(Self::IncludesEvent),
            "INTERACTS_WITH" => Ok(Self::InteractsWith),
            other => Err(format!("unknown relationship: {}", other)),
        }
    }
}

/// A directed edge, keyed by (source, relationship, target)
///
/// Writing the same key twice merges: properties are overwritten,
/// no second edge appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub relationship: Relationship,
    pub target: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, relationship: Relationship, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            relationship,
            target: target.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a property to the edge
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
