//! Ingestion pipeline: chunk, extract, resolve, write
//!
//! Text arrives as `Submission`s, is split by the `Chunker` and queued as
//! one `ChunkJob` per chunk. The `IngestionWorker` drains the queue,
//! extracting entities with the `ExtractionClient` and committing them
//! through the `GraphWriter`.

mod chunker;
mod context_memory;
mod entities;
mod extraction;
pub mod lenient_json;
mod resolver;
mod worker;
mod writer;

pub use chunker::Chunker;
pub use context_memory::ContextMemory;
pub use entities::{
    CharacterMention, EntitySet, EventMention, LocationMention, Rejections, RelationshipMention,
};
pub use extraction::{Extraction, ExtractionClient};
pub use resolver::NameResolver;
pub use worker::{
    ChunkJob, IngestError, IngestEvent, IngestEventData, IngestHandle, IngestionWorker, JobError,
    JobState, RetryPolicy, Submission,
};
pub use writer::{GraphWriter, SceneMeta, WriteError, WriteSummary};
