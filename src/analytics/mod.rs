//! Read-side analytics over the story graph
//!
//! - `ArcAnalyzer`: per-character sentiment trajectory
//! - `TimelineQaEngine`: questions answered from a timeline digest
//! - `SceneSuggester`: next-scene ideas from the same digest

mod arc;
mod qa;
pub mod sentiment;
mod suggest;

pub use arc::{smooth, ArcAnalyzer, ArcOutcome, ArcPoint, ArcShape, CharacterArc};
pub use qa::{render_digest, QaAnswer, TimelineQaEngine, APOLOGY, INSUFFICIENT_DATA};
pub use suggest::{SceneSuggester, SceneSuggestion, FALLBACK_SUGGESTION};

use crate::llm::GenerationError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
}
