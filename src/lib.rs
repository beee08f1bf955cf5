//! Storygraph: incremental story knowledge graph
//!
//! Ingests manuscript text as it is written, extracts characters, locations
//! and events with a text-generation model, and builds a graph of scenes and
//! entities. The same graph answers read-side questions: how a character's
//! mood moves across the story, free-text questions about the timeline, and
//! what could happen next.
//!
//! # Core Concepts
//!
//! - **Scenes**: one per processed chunk, ordered by a sequence index
//! - **Entities**: characters and locations under canonical, case-folded names
//! - **Context memory**: recently seen character names, fed back into extraction
//!
//! # Example
//!
//! ```
//! use storygraph::{Chunker, ManuscriptId, SceneId};
//!
//! let chunks = Chunker::default().chunk("Snow fell.\n\nShe lit a match.");
//! assert_eq!(chunks.len(), 1);
//!
//! let scene = SceneId::compose(&ManuscriptId::from("match-girl"), "p1", 0);
//! assert_eq!(scene.as_str(), "match-girl::p1::0");
//! ```

pub mod analytics;
pub mod config;
mod graph;
pub mod ingest;
pub mod llm;
pub mod storage;

pub use analytics::{
    AnalyticsError, ArcAnalyzer, ArcOutcome, ArcPoint, ArcShape, CharacterArc, QaAnswer,
    SceneSuggester, SceneSuggestion, TimelineQaEngine,
};
pub use config::{ConfigError, StorygraphConfig};
pub use graph::{
    entity_node_id, fold_name, Character, Edge, Event, Location, ManuscriptId, NarrativeEntity,
    Relationship, Scene, SceneId,
};
pub use ingest::{
    ChunkJob, Chunker, ContextMemory, EntitySet, ExtractionClient, GraphWriter, IngestEvent,
    IngestHandle, IngestionWorker, NameResolver, Submission,
};
pub use llm::{ChatClient, GenerationError, MockGenerator, Prompt, TextGenerator};
pub use storage::{GraphStore, OpenStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
