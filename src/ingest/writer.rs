//! Writes one chunk's entities into the story graph

use super::entities::EntitySet;
use super::resolver::NameResolver;
use crate::graph::{
    fold_name, Character, Edge, Event, Location, ManuscriptId, NarrativeEntity, Relationship,
    Scene, SceneId,
};
use crate::storage::{GraphStore, StorageError};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("write task failed: {0}")]
    Task(String),
}

/// Where a chunk sits in its manuscript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneMeta {
    pub manuscript_id: ManuscriptId,
    pub chapter: Option<u32>,
    pub paragraph_id: String,
    pub chunk_index: usize,
    pub raw_text: String,
}

impl SceneMeta {
    pub fn scene_id(&self) -> SceneId {
        SceneId::compose(&self.manuscript_id, &self.paragraph_id, self.chunk_index)
    }
}

/// What a write did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub scene_id: SceneId,
    pub sequence_index: i64,
    /// A NEXT_SCENE edge from the predecessor was written
    pub linked_predecessor: bool,
    pub characters: usize,
    /// Character mentions dropped by the resolver
    pub skipped_characters: usize,
    pub locations: usize,
    pub events: usize,
    pub interactions: usize,
}

/// Upserts scenes, entities and their relationships.
///
/// Idempotent per scene: rewriting the same chunk updates nodes and edges
/// in place. One store transaction per write.
#[derive(Clone)]
pub struct GraphWriter {
    store: Arc<dyn GraphStore>,
    resolver: Arc<NameResolver>,
}

impl GraphWriter {
    pub fn new(store: Arc<dyn GraphStore>, resolver: Arc<NameResolver>) -> Self {
        Self { store, resolver }
    }

    /// Write on the blocking pool.
    pub async fn write(&self, entities: EntitySet, meta: SceneMeta) -> Result<WriteSummary, WriteError> {
        let writer = self.clone();
        tokio::task::spawn_blocking(move || writer.write_blocking(&entities, &meta))
            .await
            .map_err(|e| WriteError::Task(e.to_string()))?
    }

    pub fn write_blocking(
        &self,
        entities: &EntitySet,
        meta: &SceneMeta,
    ) -> Result<WriteSummary, WriteError> {
        let manuscript = &meta.manuscript_id;
        let scene_id = meta.scene_id();
        let mut summary: Option<WriteSummary> = None;

        self.store.transaction(&mut |tx| {
            tx.upsert_manuscript(manuscript)?;

            let sequence_index = match tx.scene_sequence(&scene_id)? {
                Some(existing) => existing,
                None => tx.next_sequence_index(manuscript)?,
            };

            tx.upsert_scene(&Scene {
                id: scene_id.clone(),
                manuscript_id: manuscript.clone(),
                sequence_index,
                chapter: meta.chapter,
                paragraph_id: meta.paragraph_id.clone(),
                chunk_index: meta.chunk_index,
                raw_text: meta.raw_text.clone(),
                description: None,
                summary: entities.summary.clone(),
                created_at: Utc::now(),
            })?;
            tx.upsert_edge(
                manuscript,
                &Edge::new(manuscript.node_id(), Relationship::Contains, scene_id.as_str()),
            )?;

            let mut linked_predecessor = false;
            if sequence_index > 0 {
                match tx.scene_at(manuscript, sequence_index - 1) {
                    Ok(Some(prev)) => {
                        let edge = Edge::new(prev.as_str(), Relationship::NextScene, scene_id.as_str());
                        match tx.upsert_edge(manuscript, &edge) {
                            Ok(()) => linked_predecessor = true,
                            Err(e) => warn!(error = %e, scene = %scene_id, "Could not link predecessor scene"),
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, scene = %scene_id, "Predecessor lookup failed"),
                }
            }

            // folded canonical -> node id, for interaction edges
            let mut written: HashMap<String, String> = HashMap::new();
            let mut skipped_characters = 0;
            for mention in &entities.characters {
                let Some(name) = self.resolver.resolve(&mention.name) else {
                    skipped_characters += 1;
                    continue;
                };
                let entity = NarrativeEntity::Character(Character {
                    name,
                    archetype: mention.archetype.clone(),
                    emotion: mention.emotion.clone(),
                    goal: mention.goal.clone(),
                });
                tx.upsert_entity(manuscript, &entity)?;
                tx.upsert_edge(
                    manuscript,
                    &Edge::new(entity.node_id(), Relationship::AppearsIn, scene_id.as_str()),
                )?;
                written.insert(entity.key(), entity.node_id());
            }

            let mut locations = 0;
            for mention in &entities.locations {
                let name = mention.name.trim();
                if name.is_empty() {
                    continue;
                }
                let entity = NarrativeEntity::Location(Location {
                    name: name.to_string(),
                    location_type: mention.location_type.clone(),
                });
                tx.upsert_entity(manuscript, &entity)?;
                tx.upsert_edge(
                    manuscript,
                    &Edge::new(scene_id.as_str(), Relationship::SettingIs, entity.node_id()),
                )?;
                locations += 1;
            }

            let mut events = 0;
            for mention in &entities.events {
                let description = mention.description.trim();
                if description.is_empty() {
                    continue;
                }
                if events == 0 {
                    tx.set_scene_description(&scene_id, description)?;
                }
                let event = Event::new(manuscript, &scene_id, description);
                tx.upsert_event(&event)?;
                tx.upsert_edge(
                    manuscript,
                    &Edge::new(scene_id.as_str(), Relationship::IncludesEvent, event.node_id()),
                )?;
                events += 1;
            }

            let mut interactions = 0;
            for rel in &entities.relationships {
                let (Some(source), Some(target)) = (
                    self.resolver.resolve(&rel.source),
                    self.resolver.resolve(&rel.target),
                ) else {
                    continue;
                };
                let (source, target) = (fold_name(&source), fold_name(&target));
                if source == target {
                    continue;
                }
                if let (Some(from), Some(to)) = (written.get(&source), written.get(&target)) {
                    let kind = rel.kind.clone().unwrap_or_else(|| "interacts".to_string());
                    tx.upsert_edge(
                        manuscript,
                        &Edge::new(from.as_str(), Relationship::InteractsWith, to.as_str())
                            .with_property("kind", kind),
                    )?;
                    interactions += 1;
                }
            }

            summary = Some(WriteSummary {
                scene_id: scene_id.clone(),
                sequence_index,
                linked_predecessor,
                characters: written.len(),
                skipped_characters,
                locations,
                events,
                interactions,
            });
            Ok(())
        })?;

        let summary = summary.ok_or_else(|| {
            WriteError::Storage(StorageError::InvalidValue(
                "transaction committed without a summary".to_string(),
            ))
        })?;

        debug!(manuscript = %manuscript, scene = %summary.scene_id, "Scene transaction committed");
        info!(
            scene = %summary.scene_id,
            sequence_index = summary.sequence_index,
            characters = summary.characters,
            locations = summary.locations,
            events = summary.events,
            linked = summary.linked_predecessor,
            "Scene written"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::entities::{
        CharacterMention, EventMention, LocationMention, RelationshipMention,
    };
    use crate::storage::{OpenStore, SqliteStore};

    fn setup() -> (GraphWriter, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let writer = GraphWriter::new(store.clone(), Arc::new(NameResolver::default()));
        (writer, store)
    }

    fn meta(paragraph: &str, chunk: usize, text: &str) -> SceneMeta {
        SceneMeta {
            manuscript_id: ManuscriptId::from("match-girl"),
            chapter: Some(1),
            paragraph_id: paragraph.to_string(),
            chunk_index: chunk,
            raw_text: text.to_string(),
        }
    }

    fn events(descriptions: &[&str]) -> Vec<EventMention> {
        descriptions
            .iter()
            .map(|d| EventMention {
                description: d.to_string(),
            })
            .collect()
    }

    #[test]
    fn writes_scene_entities_and_edges() {
        let (writer, store) = setup();
        let set = EntitySet {
            characters: vec![
                CharacterMention::named("The girl").with_emotion("Miserable"),
                CharacterMention::named("she"),
            ],
            locations: vec![LocationMention {
                name: "Street corner".to_string(),
                location_type: Some("urban".to_string()),
            }],
            events: events(&["She strikes a match", "  ", "The flame flickers"]),
            ..Default::default()
        };

        let summary = writer.write_blocking(&set, &meta("p1", 0, "She struck a match.")).unwrap();
        assert_eq!(summary.sequence_index, 0);
        assert!(!summary.linked_predecessor);
        assert_eq!(summary.characters, 1);
        assert_eq!(summary.skipped_characters, 1);
        assert_eq!(summary.events, 2);

        let m = ManuscriptId::from("match-girl");
        let scene = store.load_scene(&summary.scene_id).unwrap().unwrap();
        assert_eq!(scene.description.as_deref(), Some("She strikes a match"));

        let girl = store.load_entity(&m, "little match girl").unwrap().unwrap();
        assert_eq!(girl.name(), "Little Match Girl");

        let setting = store.edges_from(&m, summary.scene_id.as_str()).unwrap();
        assert!(setting
            .iter()
            .any(|e| e.relationship == Relationship::SettingIs && e.target == "entity:street corner"));
        assert_eq!(
            setting
                .iter()
                .filter(|e| e.relationship == Relationship::IncludesEvent)
                .count(),
            2
        );
    }

    #[test]
    fn rewriting_a_scene_updates_in_place() {
        let (writer, store) = setup();
        let set = EntitySet {
            characters: vec![CharacterMention::named("Anna").with_emotion("Sad")],
            ..Default::default()
        };
        let first = writer.write_blocking(&set, &meta("p1", 0, "Old text")).unwrap();

        let set = EntitySet {
            characters: vec![CharacterMention::named("anna").with_emotion("Joyful")],
            ..Default::default()
        };
        let second = writer.write_blocking(&set, &meta("p1", 0, "New text")).unwrap();

        assert_eq!(first.scene_id, second.scene_id);
        assert_eq!(first.sequence_index, second.sequence_index);

        let m = ManuscriptId::from("match-girl");
        let stats = store.stats(&m).unwrap();
        assert_eq!(stats.scenes, 1);
        assert_eq!(stats.characters, 1);
        assert_eq!(
            store.load_scene(&second.scene_id).unwrap().unwrap().raw_text,
            "New text"
        );
        match store.load_entity(&m, "Anna").unwrap().unwrap() {
            NarrativeEntity::Character(c) => assert_eq!(c.emotion.as_deref(), Some("Joyful")),
            other => panic!("expected character, got {:?}", other),
        }
    }

    #[test]
    fn consecutive_scenes_are_linked() {
        let (writer, store) = setup();
        let set = EntitySet::default();
        let first = writer.write_blocking(&set, &meta("p1", 0, "one")).unwrap();
        let second = writer.write_blocking(&set, &meta("p2", 0, "two")).unwrap();
        let third = writer.write_blocking(&set, &meta("p2", 1, "three")).unwrap();

        assert_eq!((first.sequence_index, second.sequence_index, third.sequence_index), (0, 1, 2));
        assert!(second.linked_predecessor);
        assert!(third.linked_predecessor);

        let m = ManuscriptId::from("match-girl");
        let next = store.edges_from(&m, first.scene_id.as_str()).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].relationship, Relationship::NextScene);
        assert_eq!(next[0].target, second.scene_id.as_str());
    }

    #[test]
    fn interactions_need_both_characters_in_the_chunk() {
        let (writer, store) = setup();
        let set = EntitySet {
            characters: vec![
                CharacterMention::named("child"),
                CharacterMention::named("granny"),
            ],
            relationships: vec![
                RelationshipMention {
                    source: "The girl".to_string(),
                    target: "Grandmother".to_string(),
                    kind: Some("longs for".to_string()),
                },
                RelationshipMention {
                    source: "child".to_string(),
                    target: "The Baker".to_string(),
                    kind: None,
                },
            ],
            ..Default::default()
        };
        let summary = writer.write_blocking(&set, &meta("p1", 0, "text")).unwrap();
        assert_eq!(summary.interactions, 1);

        let m = ManuscriptId::from("match-girl");
        let edges = store.edges_from(&m, "entity:little match girl").unwrap();
        let interaction = edges
            .iter()
            .find(|e| e.relationship == Relationship::InteractsWith)
            .unwrap();
        assert_eq!(interaction.target, "entity:grandmother");
        assert_eq!(interaction.properties["kind"], "longs for");
    }

    #[test]
    fn identical_events_in_one_scene_are_one_node() {
        let (writer, store) = setup();
        let set = EntitySet {
            events: events(&["She lit a match", "She lit a match"]),
            ..Default::default()
        };
        writer.write_blocking(&set, &meta("p1", 0, "text")).unwrap();
        assert_eq!(store.stats(&ManuscriptId::from("match-girl")).unwrap().events, 1);
    }

    #[tokio::test]
    async fn async_write_runs_on_blocking_pool() {
        let (writer, store) = setup();
        let summary = writer
            .write(EntitySet::default(), meta("p1", 0, "text"))
            .await
            .unwrap();
        assert!(store.load_scene(&summary.scene_id).unwrap().is_some());
    }
}
