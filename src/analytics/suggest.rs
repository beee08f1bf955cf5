//! Next-scene suggestions from the scene timeline

use super::qa::{render_digest, APOLOGY, INSUFFICIENT_DATA};
use super::AnalyticsError;
use crate::graph::ManuscriptId;
use crate::llm::{Prompt, TextGenerator};
use crate::storage::GraphStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Used when the model replies with nothing
pub const FALLBACK_SUGGESTION: &str = "Continue the narrative with a new scene.";

const SYSTEM_PROMPT: &str = "You are a creative writing assistant. \
Suggest the next scene based on the story timeline in 2-3 sentences. \
Keep the characters consistent with how they feel and what they want in the latest scenes.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneSuggestion {
    pub suggestion: String,
}

impl SceneSuggestion {
    fn new(suggestion: impl Into<String>) -> Self {
        Self {
            suggestion: suggestion.into(),
        }
    }
}

/// Proposes what could happen next in a manuscript.
#[derive(Clone)]
pub struct SceneSuggester {
    store: Arc<dyn GraphStore>,
    generator: Arc<dyn TextGenerator>,
}

impl SceneSuggester {
    pub fn new(store: Arc<dyn GraphStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { store, generator }
    }

    /// Suggest the next scene; failures become a generic apology.
    pub async fn suggest(&self, manuscript: &ManuscriptId) -> SceneSuggestion {
        match self.try_suggest(manuscript).await {
            Ok(suggestion) => suggestion,
            Err(e) => {
                error!(manuscript = %manuscript, error = %e, "Scene suggestion failed");
                SceneSuggestion::new(APOLOGY)
            }
        }
    }

    #[instrument(skip(self, manuscript), fields(manuscript = %manuscript))]
    pub async fn try_suggest(&self, manuscript: &ManuscriptId) -> Result<SceneSuggestion, AnalyticsError> {
        let scenes = self.store.timeline(manuscript)?;
        if scenes.is_empty() {
            debug!("No scenes, skipping generation");
            return Ok(SceneSuggestion::new(INSUFFICIENT_DATA));
        }

        let digest = render_digest(manuscript, &scenes);
        let prompt = Prompt::new(
            SYSTEM_PROMPT,
            format!("STORY CONTEXT (Graph Timeline):\n{}\nWhat should happen next?", digest),
        );
        let reply = self.generator.generate(&prompt).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Ok(SceneSuggestion::new(FALLBACK_SUGGESTION));
        }
        Ok(SceneSuggestion::new(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Scene, SceneId};
    use crate::llm::{GenerationError, MockGenerator};
    use crate::storage::{OpenStore, SqliteStore};

    fn store_with_scene() -> (Arc<SqliteStore>, ManuscriptId) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let m = ManuscriptId::from("m1");
        store
            .transaction(&mut |tx| {
                tx.upsert_manuscript(&m)?;
                tx.upsert_scene(&Scene {
                    id: SceneId::compose(&m, "p1", 0),
                    manuscript_id: m.clone(),
                    sequence_index: 0,
                    chapter: None,
                    paragraph_id: "p1".to_string(),
                    chunk_index: 0,
                    raw_text: "She lit a match.".to_string(),
                    description: None,
                    summary: None,
                    created_at: chrono::Utc::now(),
                })?;
                tx.set_scene_description(&SceneId::compose(&m, "p1", 0), "She lights a match")
            })
            .unwrap();
        (store, m)
    }

    #[tokio::test]
    async fn empty_manuscript_does_not_call_generator() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mock = Arc::new(MockGenerator::new().with_fallback("unused"));
        let suggester = SceneSuggester::new(store, mock.clone());

        let out = suggester.suggest(&ManuscriptId::from("empty")).await;
        assert_eq!(out.suggestion, INSUFFICIENT_DATA);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn suggestion_is_generated_from_the_digest() {
        let (store, m) = store_with_scene();
        let mock = Arc::new(MockGenerator::new().with_response("  Her grandmother appears in the flame.\n"));
        let suggester = SceneSuggester::new(store, mock.clone());

        let out = suggester.suggest(&m).await;
        assert_eq!(out.suggestion, "Her grandmother appears in the flame.");

        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].system.starts_with("You are a creative writing assistant."));
        assert!(prompts[0].user.contains("SCENE 0:\n  Summary: She lights a match"));
        assert!(prompts[0].user.ends_with("What should happen next?"));
    }

    #[tokio::test]
    async fn blank_reply_falls_back() {
        let (store, m) = store_with_scene();
        let mock = Arc::new(MockGenerator::new().with_response("   "));
        let out = SceneSuggester::new(store, mock).suggest(&m).await;
        assert_eq!(out.suggestion, FALLBACK_SUGGESTION);
    }

    #[tokio::test]
    async fn generator_failure_becomes_apology() {
        let (store, m) = store_with_scene();
        let mock = Arc::new(MockGenerator::new().with_failure(GenerationError::Overloaded("529".into())));
        let out = SceneSuggester::new(store, mock).suggest(&m).await;
        assert_eq!(out.suggestion, APOLOGY);
    }
}
