//! Single-consumer ingestion queue
//!
//! Producers enqueue chunk jobs through an `IngestHandle` without blocking.
//! One worker task drains the queue in FIFO order, so at most one
//! extraction and one graph write are in flight per process.

use super::chunker::Chunker;
use super::context_memory::ContextMemory;
use super::entities::EntitySet;
use super::extraction::ExtractionClient;
use super::resolver::NameResolver;
use super::writer::{GraphWriter, SceneMeta, WriteError, WriteSummary};
use crate::config::StorygraphConfig;
use crate::graph::{ManuscriptId, SceneId};
use crate::llm::{GenerationError, TextGenerator};
use crate::storage::GraphStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One chunk of one submission, queued for processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkJob {
    pub job_id: Uuid,
    pub manuscript_id: ManuscriptId,
    pub chapter: Option<u32>,
    pub paragraph_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub raw_text: String,
}

impl ChunkJob {
    pub fn new(
        manuscript_id: ManuscriptId,
        chapter: Option<u32>,
        paragraph_id: impl Into<String>,
        chunk_index: usize,
        total_chunks: usize,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            manuscript_id,
            chapter,
            paragraph_id: paragraph_id.into(),
            chunk_index,
            total_chunks,
            raw_text: raw_text.into(),
        }
    }

    pub fn scene_id(&self) -> SceneId {
        SceneId::compose(&self.manuscript_id, &self.paragraph_id, self.chunk_index)
    }

    fn scene_meta(&self) -> SceneMeta {
        SceneMeta {
            manuscript_id: self.manuscript_id.clone(),
            chapter: self.chapter,
            paragraph_id: self.paragraph_id.clone(),
            chunk_index: self.chunk_index,
            raw_text: self.raw_text.clone(),
        }
    }
}

/// A piece of editor text for one (manuscript, chapter, paragraph)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub manuscript_id: ManuscriptId,
    pub chapter: Option<u32>,
    pub paragraph_id: String,
    pub text: String,
}

/// Linear backoff on transient generation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Cooldown after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Where a job is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Extracting { attempt: u32 },
    Cooldown { attempt: u32 },
    Writing,
    Done,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    MaxRetriesExceeded { attempts: u32, last: GenerationError },

    #[error("extraction failed: {0}")]
    Extraction(GenerationError),

    #[error("graph write failed: {0}")]
    Write(#[from] WriteError),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("ingestion queue is closed")]
    QueueClosed,
}

/// Payload of an ingestion result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestEventData {
    pub entities_extracted: EntitySet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one job, as pushed back to the submitter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: IngestEventData,
    #[serde(rename = "paragraphIndex")]
    pub paragraph_id: String,
    #[serde(rename = "chunkIndex")]
    pub chunk_index: usize,
    #[serde(rename = "totalChunks")]
    pub total_chunks: usize,
    #[serde(rename = "sceneId")]
    pub scene_id: SceneId,
}

impl IngestEvent {
    const TYPE: &'static str = "entities_extracted";

    fn saved(job: &ChunkJob, entities: EntitySet) -> Self {
        Self::build(job, entities, Some("saved".to_string()), None)
    }

    fn failed(job: &ChunkJob, err: &JobError) -> Self {
        Self::build(job, EntitySet::default(), None, Some(err.to_string()))
    }

    fn build(job: &ChunkJob, entities: EntitySet, status: Option<String>, error: Option<String>) -> Self {
        Self {
            event_type: Self::TYPE.to_string(),
            data: IngestEventData {
                entities_extracted: entities,
                status,
                error,
            },
            paragraph_id: job.paragraph_id.clone(),
            chunk_index: job.chunk_index,
            total_chunks: job.total_chunks,
            scene_id: job.scene_id(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.data.error.is_none()
    }
}

struct QueuedJob {
    job: ChunkJob,
    reply: Option<mpsc::UnboundedSender<IngestEvent>>,
}

/// Producer side of the ingestion queue. Cheap to clone.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::UnboundedSender<QueuedJob>,
    chunker: Chunker,
}

impl IngestHandle {
    /// Queue one job. Returns immediately.
    ///
    /// The result goes to `reply` if given; a dropped receiver does not
    /// cancel the job.
    pub fn enqueue(
        &self,
        job: ChunkJob,
        reply: Option<mpsc::UnboundedSender<IngestEvent>>,
    ) -> Result<Uuid, IngestError> {
        let job_id = job.job_id;
        debug!(job = %job_id, scene = %job.scene_id(), "Job queued");
        self.tx
            .send(QueuedJob { job, reply })
            .map_err(|_| IngestError::QueueClosed)?;
        Ok(job_id)
    }

    /// Chunk a submission and queue one job per chunk, in chunk order.
    pub fn submit(
        &self,
        submission: Submission,
        reply: Option<mpsc::UnboundedSender<IngestEvent>>,
    ) -> Result<Vec<Uuid>, IngestError> {
        let chunks = self.chunker.chunk(&submission.text);
        let total = chunks.len();
        info!(
            manuscript = %submission.manuscript_id,
            paragraph = %submission.paragraph_id,
            chunks = total,
            "Submission received"
        );

        chunks
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let job = ChunkJob::new(
                    submission.manuscript_id.clone(),
                    submission.chapter,
                    submission.paragraph_id.clone(),
                    index,
                    total,
                    text,
                );
                self.enqueue(job, reply.clone())
            })
            .collect()
    }
}

/// Drains the ingestion queue: extract, write, remember.
pub struct IngestionWorker {
    extractor: ExtractionClient,
    writer: GraphWriter,
    memory: ContextMemory,
    retry: RetryPolicy,
    chunker: Chunker,
}

impl IngestionWorker {
    pub fn new(extractor: ExtractionClient, writer: GraphWriter) -> Self {
        Self {
            extractor,
            writer,
            memory: ContextMemory::default(),
            retry: RetryPolicy::default(),
            chunker: Chunker::default(),
        }
    }

    /// Assemble a worker from configuration.
    pub fn from_config(
        config: &StorygraphConfig,
        store: Arc<dyn GraphStore>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let extractor = ExtractionClient::new(generator)
            .with_max_prompt_chars(config.extraction.max_prompt_chars)
            .with_context_capacity(config.context.capacity);
        let writer = GraphWriter::new(store, Arc::new(NameResolver::new(&config.resolver)));

        Self::new(extractor, writer)
            .with_memory(ContextMemory::new(config.context.capacity))
            .with_retry(RetryPolicy {
                max_attempts: config.retry.max_attempts,
                base_delay: Duration::from_secs(config.retry.base_delay_secs),
            })
            .with_chunker(Chunker::new(&config.chunking))
    }

    pub fn with_memory(mut self, memory: ContextMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn memory(&self) -> &ContextMemory {
        &self.memory
    }

    /// Start the consumer task.
    ///
    /// The task ends once every handle is dropped and the queue is drained.
    pub fn spawn(self) -> (IngestHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = IngestHandle {
            tx,
            chunker: self.chunker.clone(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<QueuedJob>) {
        info!("Ingestion worker started");
        while let Some(QueuedJob { job, reply }) = rx.recv().await {
            let event = match self.process(&job).await {
                Ok((entities, _)) => IngestEvent::saved(&job, entities),
                Err(e) => {
                    error!(job = %job.job_id, scene = %job.scene_id(), error = %e, "Job failed");
                    IngestEvent::failed(&job, &e)
                }
            };
            if let Some(reply) = reply {
                // Submitter may be gone; the result is dropped then
                let _ = reply.send(event);
            }
        }
        info!("Ingestion worker stopped");
    }

    /// Run one job to completion.
    pub async fn process(&mut self, job: &ChunkJob) -> Result<(EntitySet, WriteSummary), JobError> {
        let context = self.memory.get(&job.manuscript_id);
        debug!(job = %job.job_id, state = ?JobState::Queued, context = context.len(), "Job dequeued");

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        let extraction = loop {
            attempt += 1;
            debug!(job = %job.job_id, state = ?JobState::Extracting { attempt }, "Extracting");

            match self.extractor.extract(&job.raw_text, &context).await {
                Ok(extraction) => break extraction,
                Err(e) if e.is_transient() => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        job = %job.job_id,
                        state = ?JobState::Cooldown { attempt },
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Generator busy, cooling down"
                    );
                    tokio::time::sleep(delay).await;
                    if attempt >= max_attempts {
                        return Err(JobError::MaxRetriesExceeded { attempts: attempt, last: e });
                    }
                }
                Err(e) => return Err(JobError::Extraction(e)),
            }
        };

        debug!(job = %job.job_id, state = ?JobState::Writing, "Writing scene");
        let summary = self
            .writer
            .write(extraction.entities.clone(), job.scene_meta())
            .await?;

        self.memory.update(&job.manuscript_id, &extraction.context_names);
        info!(
            job = %job.job_id,
            state = ?JobState::Done,
            scene = %summary.scene_id,
            attempts = attempt,
            parse_failed = extraction.parse_failed,
            "Job done"
        );
        Ok((extraction.entities, summary))
    }
}
