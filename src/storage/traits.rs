//! Storage trait definitions

use crate::graph::{Edge, Event, ManuscriptId, NarrativeEntity, Scene, SceneId};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("Store connection poisoned by a panicked writer")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One (character, scene) appearance, as read for arc analysis
#[derive(Debug, Clone, PartialEq)]
pub struct ArcRow {
    pub sequence_index: i64,
    pub scene_description: Option<String>,
    pub raw_text: Option<String>,
    pub character: String,
    pub emotion: Option<String>,
    pub goal: Option<String>,
    pub archetype: Option<String>,
}

/// A character's state as recorded on its node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterState {
    pub name: String,
    pub emotion: Option<String>,
    pub goal: Option<String>,
}

/// A scene with everything attached to it, as read for the digest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineScene {
    pub scene_id: SceneId,
    pub sequence_index: i64,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub events: Vec<String>,
    pub characters: Vec<CharacterState>,
}

/// Node and edge counts for one manuscript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub scenes: usize,
    pub characters: usize,
    pub locations: usize,
    pub events: usize,
    pub edges: usize,
}

/// Write operations available inside one store transaction
///
/// Every `upsert_*` is create-or-match-then-set on the node's key.
pub trait GraphTx {
    fn upsert_manuscript(&mut self, id: &ManuscriptId) -> StorageResult<()>;

    /// Sequence index of an existing scene, if the scene exists
    fn scene_sequence(&mut self, scene: &SceneId) -> StorageResult<Option<i64>>;

    /// One past the highest sequence index in the manuscript (0 when empty)
    fn next_sequence_index(&mut self, manuscript: &ManuscriptId) -> StorageResult<i64>;

    /// The scene at a given sequence index, if any
    fn scene_at(&mut self, manuscript: &ManuscriptId, sequence_index: i64) -> StorageResult<Option<SceneId>>;

    /// Upsert a scene by id. Leaves an existing description untouched.
    fn upsert_scene(&mut self, scene: &Scene) -> StorageResult<()>;

    /// Set the description only if the scene has none yet.
    fn set_scene_description(&mut self, scene: &SceneId, description: &str) -> StorageResult<()>;

    /// Upsert an entity by (manuscript, case-folded name), overwriting the
    /// variant's fields with the given values.
    fn upsert_entity(&mut self, manuscript: &ManuscriptId, entity: &NarrativeEntity) -> StorageResult<()>;

    fn upsert_event(&mut self, event: &Event) -> StorageResult<()>;

    /// Upsert an edge by (source, relationship, target)
    fn upsert_edge(&mut self, manuscript: &ManuscriptId, edge: &Edge) -> StorageResult<()>;
}

/// Trait for graph storage backends
///
/// Implementations must be thread-safe (Send + Sync): readers run
/// concurrently with the ingestion worker.
pub trait GraphStore: Send + Sync {
    /// Run `work` inside a single transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back otherwise.
    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn GraphTx) -> StorageResult<()>,
    ) -> StorageResult<()>;

    fn load_scene(&self, id: &SceneId) -> StorageResult<Option<Scene>>;

    /// Load an entity by canonical name (case-insensitive)
    fn load_entity(&self, manuscript: &ManuscriptId, name: &str) -> StorageResult<Option<NarrativeEntity>>;

    /// Edges leaving a node
    fn edges_from(&self, manuscript: &ManuscriptId, source: &str) -> StorageResult<Vec<Edge>>;

    /// Appearances of characters whose name contains `name_query`
    /// (Unicode case-insensitive), ordered by scene sequence index.
    fn character_arc_rows(&self, manuscript: &ManuscriptId, name_query: &str) -> StorageResult<Vec<ArcRow>>;

    /// All scenes of the manuscript ordered by sequence index
    fn timeline(&self, manuscript: &ManuscriptId) -> StorageResult<Vec<TimelineScene>>;

    fn stats(&self, manuscript: &ManuscriptId) -> StorageResult<GraphStats>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
