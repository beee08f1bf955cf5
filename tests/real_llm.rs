//! Extraction against a live chat-completions endpoint.
//!
//! Run with `--features real_llm` and the configured API key exported.

#![cfg(feature = "real_llm")]

use std::sync::Arc;
use storygraph::{ChatClient, ContextMemory, ExtractionClient, ManuscriptId, StorygraphConfig};

#[tokio::test]
#[ignore = "calls a live endpoint"]
async fn live_extraction_finds_the_protagonist() {
    let config = StorygraphConfig::default();
    let client = ChatClient::from_config(&config.generator).expect("API key in environment");
    let extractor = ExtractionClient::new(Arc::new(client));

    let memory = ContextMemory::default();
    let context = memory.get(&ManuscriptId::from("live"));
    let extraction = extractor
        .extract(
            "On New Year's Eve a little match girl wandered the freezing streets, barefoot and alone.",
            &context,
        )
        .await
        .expect("extraction");

    assert!(!extraction.parse_failed);
    assert!(extraction
        .entities
        .character_names()
        .iter()
        .any(|n| n.to_lowercase().contains("match girl")));
}
