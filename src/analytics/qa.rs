//! Question answering over the scene timeline

use super::AnalyticsError;
use crate::graph::ManuscriptId;
use crate::llm::{Prompt, TextGenerator};
use crate::storage::{GraphStore, TimelineScene};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Returned when the manuscript has no scenes yet
pub const INSUFFICIENT_DATA: &str =
    "I don't have enough data on this story yet. Please process the text first.";

/// Returned when the answer could not be produced
pub const APOLOGY: &str = "Sorry, I couldn't answer that question right now. Please try again later.";

const SYSTEM_PROMPT: &str = r#"You are a Story Expert with access to a precise knowledge graph of the narrative.
Answer ONLY from the story timeline you are given. If the timeline does not contain the answer, say so.

Guidelines:
1. Cite evidence with "Scene X" references (e.g. "In Scene 3, she felt joyful because...").
2. For questions about character growth, compare earlier scenes to later ones.
3. Be specific: use the exact events listed in the timeline, do not generalize."#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaAnswer {
    pub answer: String,
}

/// Render the manuscript timeline as prompt context.
pub fn render_digest(manuscript: &ManuscriptId, scenes: &[TimelineScene]) -> String {
    let mut out = format!("STORY TIMELINE FOR MANUSCRIPT '{}':\n\n", manuscript);
    for scene in scenes {
        let summary = scene
            .description
            .as_deref()
            .or(scene.summary.as_deref())
            .unwrap_or("(no description)");
        let _ = writeln!(out, "SCENE {}:", scene.sequence_index);
        let _ = writeln!(out, "  Summary: {}", summary);

        let mut events: Vec<&str> = Vec::new();
        for event in &scene.events {
            let event = event.trim();
            if !event.is_empty() && !events.contains(&event) {
                events.push(event);
            }
        }
        if !events.is_empty() {
            let _ = writeln!(out, "  Details: {}", events.join(", "));
        }

        if !scene.characters.is_empty() {
            let states: Vec<String> = scene
                .characters
                .iter()
                .map(|c| {
                    format!(
                        "{} (Feeling: {}, Goal: {})",
                        c.name,
                        c.emotion.as_deref().unwrap_or("Unknown"),
                        c.goal.as_deref().unwrap_or("Unknown")
                    )
                })
                .collect();
            let _ = writeln!(out, "  Characters: {}", states.join("; "));
        }
        out.push('\n');
    }
    out
}

/// Answers free-text questions from the scene timeline.
#[derive(Clone)]
pub struct TimelineQaEngine {
    store: Arc<dyn GraphStore>,
    generator: Arc<dyn TextGenerator>,
}

impl TimelineQaEngine {
    pub fn new(store: Arc<dyn GraphStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { store, generator }
    }

    /// Answer a question; failures become a generic apology.
    pub async fn answer(&self, manuscript: &ManuscriptId, question: &str) -> QaAnswer {
        match self.try_answer(manuscript, question).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(manuscript = %manuscript, error = %e, "Question answering failed");
                QaAnswer {
                    answer: APOLOGY.to_string(),
                }
            }
        }
    }

    #[instrument(skip(self, manuscript, question), fields(manuscript = %manuscript))]
    pub async fn try_answer(
        &self,
        manuscript: &ManuscriptId,
        question: &str,
    ) -> Result<QaAnswer, AnalyticsError> {
        let scenes = self.store.timeline(manuscript)?;
        if scenes.is_empty() {
            debug!("No scenes, skipping generation");
            return Ok(QaAnswer {
                answer: INSUFFICIENT_DATA.to_string(),
            });
        }

        let digest = render_digest(manuscript, &scenes);
        debug!(scenes = scenes.len(), digest_len = digest.len(), "Digest rendered");

        let prompt = Prompt::new(
            SYSTEM_PROMPT,
            format!(
                "STORY CONTEXT (Graph Timeline):\n{}\nUSER QUESTION:\n{}",
                digest,
                question.trim()
            ),
        );
        let answer = self.generator.generate(&prompt).await?;
        Ok(QaAnswer { answer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SceneId;
    use crate::llm::{GenerationError, MockGenerator};
    use crate::storage::{CharacterState, OpenStore, SqliteStore};

    fn scene(seq: i64, description: Option<&str>, events: &[&str], characters: Vec<CharacterState>) -> TimelineScene {
        TimelineScene {
            scene_id: SceneId::from_string(format!("m1::p{}::0", seq)),
            sequence_index: seq,
            description: description.map(String::from),
            summary: None,
            events: events.iter().map(|e| e.to_string()).collect(),
            characters,
        }
    }

    #[test]
    fn digest_lists_scenes_events_and_characters() {
        let scenes = vec![
            scene(
                0,
                Some("Anna walks out"),
                &["Anna walks out", "", "Anna walks out", "Snow falls"],
                vec![CharacterState {
                    name: "Anna".to_string(),
                    emotion: Some("Miserable".to_string()),
                    goal: None,
                }],
            ),
            scene(1, None, &[], vec![]),
        ];
        let digest = render_digest(&ManuscriptId::from("m1"), &scenes);

        assert!(digest.starts_with("STORY TIMELINE FOR MANUSCRIPT 'm1':\n\n"));
        assert!(digest.contains("SCENE 0:\n  Summary: Anna walks out\n"));
        assert!(digest.contains("  Details: Anna walks out, Snow falls\n"));
        assert!(digest.contains("  Characters: Anna (Feeling: Miserable, Goal: Unknown)\n"));
        assert!(digest.contains("SCENE 1:\n  Summary: (no description)\n\n"));
    }

    #[tokio::test]
    async fn empty_manuscript_does_not_call_generator() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mock = Arc::new(MockGenerator::new().with_fallback("should not be used"));
        let engine = TimelineQaEngine::new(store, mock.clone());

        let answer = engine.answer(&ManuscriptId::from("empty"), "Who is Anna?").await;
        assert_eq!(answer.answer, INSUFFICIENT_DATA);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn generator_failure_becomes_apology() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let m = ManuscriptId::from("m1");
        store
            .transaction(&mut |tx| {
                tx.upsert_manuscript(&m)?;
                tx.upsert_scene(&crate::graph::Scene {
                    id: SceneId::compose(&m, "p1", 0),
                    manuscript_id: m.clone(),
                    sequence_index: 0,
                    chapter: None,
                    paragraph_id: "p1".to_string(),
                    chunk_index: 0,
                    raw_text: "text".to_string(),
                    description: None,
                    summary: None,
                    created_at: chrono::Utc::now(),
                })
            })
            .unwrap();

        let mock = Arc::new(MockGenerator::new().with_failure(GenerationError::Request("500".into())));
        let engine = TimelineQaEngine::new(store, mock.clone());
        let answer = engine.answer(&m, "What happens?").await;
        assert_eq!(answer.answer, APOLOGY);
        assert_eq!(mock.calls(), 1);
    }
}
