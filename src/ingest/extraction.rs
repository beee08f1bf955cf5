//! Entity extraction through the text-generation capability

use super::context_memory::ContextMemory;
use super::entities::{EntitySet, Rejections};
use super::lenient_json;
use crate::llm::{GenerationError, Prompt, TextGenerator};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const SYSTEM_PROMPT: &str = r#"You are a literary analyst building a story graph.
Extract the entities of the passage and reply with ONE JSON object and nothing else.
Use double quotes for every key and string. No comments, no trailing commas.

Fields:
- "characters": [{"name", "archetype", "emotion", "goal"}]
- "locations": [{"name", "type"}]
- "events": [{"description"}]
- "relationships": [{"source", "target", "type"}] between characters
- "objects": [names of notable objects]
- "summary": one sentence

Rules:
- Never use a pronoun as a name. Resolve he, she, they, her and similar to the
  character they refer to, using the known characters listed below.
- "emotion" is one adjective from: Miserable, Joyful, Hopeful, Fearful, Sad,
  Angry, Calm, Neutral.
- Cold, hunger, pain or exhaustion means "Miserable".
- Food, warmth, comfort or a happy vision means "Joyful".
- Leave a list empty rather than guessing."#;

/// Result of extracting one chunk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub entities: EntitySet,
    /// Context names with this chunk's characters merged in
    pub context_names: Vec<String>,
    /// The reply could not be parsed; `entities` is empty
    pub parse_failed: bool,
    pub rejected: Rejections,
}

/// Turns a chunk of text into a validated entity set.
///
/// Parse problems never fail a call; only generation errors propagate.
#[derive(Clone)]
pub struct ExtractionClient {
    generator: Arc<dyn TextGenerator>,
    max_prompt_chars: usize,
    context_capacity: usize,
}

impl ExtractionClient {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            max_prompt_chars: 4000,
            context_capacity: 15,
        }
    }

    pub fn with_max_prompt_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars.max(1);
        self
    }

    pub fn with_context_capacity(mut self, capacity: usize) -> Self {
        self.context_capacity = capacity.max(1);
        self
    }

    pub fn build_prompt(&self, chunk: &str, context_names: &[String]) -> Prompt {
        let known = if context_names.is_empty() {
            "(none yet)".to_string()
        } else {
            context_names.join(", ")
        };
        let text: String = chunk.chars().take(self.max_prompt_chars).collect();
        Prompt::new(
            SYSTEM_PROMPT,
            format!(
                "Known characters: {}\n\nPassage:\n{}\n\nRespond with ONLY the JSON object.",
                known, text
            ),
        )
    }

    #[instrument(skip(self, chunk, context_names), fields(chunk_len = chunk.len()))]
    pub async fn extract(
        &self,
        chunk: &str,
        context_names: &[String],
    ) -> Result<Extraction, GenerationError> {
        let prompt = self.build_prompt(chunk, context_names);
        let reply = self.generator.generate(&prompt).await?;
        Ok(self.interpret(&reply, context_names))
    }

    /// Parse and validate a raw reply.
    pub fn interpret(&self, reply: &str, context_names: &[String]) -> Extraction {
        let (entities, rejected, parse_failed) = match lenient_json::parse_object(reply) {
            Ok(obj) => {
                let (entities, rejected) = EntitySet::from_json(&obj);
                (entities, rejected, false)
            }
            Err(e) => {
                warn!(error = %e, reply_len = reply.len(), "Unparseable extraction reply, using empty entity set");
                (EntitySet::default(), Rejections::default(), true)
            }
        };

        if rejected.total() > 0 {
            warn!(
                characters = rejected.characters,
                locations = rejected.locations,
                events = rejected.events,
                relationships = rejected.relationships,
                objects = rejected.objects,
                "Rejected malformed extraction records"
            );
        }

        let context_names = ContextMemory::new(self.context_capacity)
            .merged(context_names, &entities.character_names());

        debug!(
            characters = entities.characters.len(),
            locations = entities.locations.len(),
            events = entities.events.len(),
            "Extraction parsed"
        );

        Extraction {
            entities,
            context_names,
            parse_failed,
            rejected,
        }
    }
}
