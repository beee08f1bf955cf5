//! Shared helpers for storygraph integration tests
//!
//! Builds in-memory stores and mock-backed workers, and collects
//! ingestion events from reply channels.

use std::sync::Arc;
use storygraph::{
    IngestEvent, IngestHandle, IngestionWorker, ManuscriptId, MockGenerator, OpenStore,
    SqliteStore, StorygraphConfig, Submission,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

/// Spawn a worker over `store` that answers from `mock`.
pub fn spawn_worker(
    config: &StorygraphConfig,
    store: Arc<SqliteStore>,
    mock: Arc<MockGenerator>,
) -> (IngestHandle, JoinHandle<()>) {
    IngestionWorker::from_config(config, store, mock).spawn()
}

pub fn submission(manuscript: &str, paragraph: &str, text: &str) -> Submission {
    Submission {
        manuscript_id: ManuscriptId::from(manuscript),
        chapter: Some(1),
        paragraph_id: paragraph.to_string(),
        text: text.to_string(),
    }
}

/// Receive exactly `n` events.
pub async fn collect(rx: &mut mpsc::UnboundedReceiver<IngestEvent>, n: usize) -> Vec<IngestEvent> {
    let mut events = Vec::with_capacity(n);
    while events.len() < n {
        match rx.recv().await {
            Some(event) => events.push(event),
            None => break,
        }
    }
    events
}

/// An extraction reply naming the given characters and events.
pub fn mock_extraction(characters: &[(&str, &str)], events: &[&str]) -> String {
    let characters: Vec<serde_json::Value> = characters
        .iter()
        .map(|(name, emotion)| serde_json::json!({ "name": name, "emotion": emotion }))
        .collect();
    let events: Vec<serde_json::Value> = events
        .iter()
        .map(|d| serde_json::json!({ "description": d }))
        .collect();
    serde_json::json!({
        "characters": characters,
        "locations": [],
        "events": events,
        "relationships": [],
    })
    .to_string()
}
