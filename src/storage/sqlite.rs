//! SQLite storage backend for the story graph

use super::traits::{
    ArcRow, CharacterState, GraphStats, GraphStore, GraphTx, OpenStore, StorageError,
    StorageResult, TimelineScene,
};
use crate::graph::{
    fold_name, Character, Edge, Event, Location, ManuscriptId, NarrativeEntity, Relationship,
    Scene, SceneId,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed graph store
///
/// One database file holds manuscripts, scenes, entities, events and edges.
/// Thread-safe via internal mutex on the connection; every write batch runs
/// inside one SQLite transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS manuscripts (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scenes (
                id TEXT PRIMARY KEY,
                manuscript_id TEXT NOT NULL,
                sequence_index INTEGER NOT NULL,
                chapter INTEGER,
                paragraph_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                raw_text TEXT NOT NULL,
                description TEXT,
                summary TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (manuscript_id) REFERENCES manuscripts(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_scenes_sequence
                ON scenes(manuscript_id, sequence_index);

            -- One row per (manuscript, folded name); labels accumulate
            CREATE TABLE IF NOT EXISTS entities (
                manuscript_id TEXT NOT NULL,
                name_key TEXT NOT NULL,
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                is_character INTEGER NOT NULL DEFAULT 0,
                is_location INTEGER NOT NULL DEFAULT 0,
                archetype TEXT,
                emotion TEXT,
                goal TEXT,
                location_type TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (manuscript_id, name_key),
                FOREIGN KEY (manuscript_id) REFERENCES manuscripts(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                manuscript_id TEXT NOT NULL,
                scene_id TEXT NOT NULL,
                description TEXT NOT NULL,
                FOREIGN KEY (scene_id) REFERENCES scenes(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_events_scene
                ON events(scene_id);

            CREATE TABLE IF NOT EXISTS edges (
                manuscript_id TEXT NOT NULL,
                source_id TEXT NOT NULL,
                relationship TEXT NOT NULL,
                target_id TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (manuscript_id, source_id, relationship, target_id),
                FOREIGN KEY (manuscript_id) REFERENCES manuscripts(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_edges_target
                ON edges(manuscript_id, target_id, relationship);

            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(raw)
            .map_err(|e| StorageError::DateParse(e.to_string()))?
            .with_timezone(&Utc))
    }

    /// Deserialize a scene from database columns
    #[allow(clippy::too_many_arguments)]
    fn row_to_scene(
        id: String,
        manuscript_id: String,
        sequence_index: i64,
        chapter: Option<i64>,
        paragraph_id: String,
        chunk_index: i64,
        raw_text: String,
        description: Option<String>,
        summary: Option<String>,
        created_at: String,
    ) -> StorageResult<Scene> {
        let chapter = chapter
            .map(|c| {
                u32::try_from(c).map_err(|_| StorageError::InvalidValue(format!("chapter {}", c)))
            })
            .transpose()?;
        let chunk_index = usize::try_from(chunk_index)
            .map_err(|_| StorageError::InvalidValue(format!("chunk index {}", chunk_index)))?;

        Ok(Scene {
            id: SceneId::from_string(id),
            manuscript_id: ManuscriptId::from_string(manuscript_id),
            sequence_index,
            chapter,
            paragraph_id,
            chunk_index,
            raw_text,
            description,
            summary,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    fn scene_events(conn: &Connection, scene: &str) -> StorageResult<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT description FROM events WHERE scene_id = ?1 ORDER BY rowid ASC",
        )?;
        let events = stmt
            .query_map(params![scene], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events.into_iter().filter(|e| !e.trim().is_empty()).collect())
    }

    fn scene_characters(
        conn: &Connection,
        manuscript: &str,
        scene: &str,
    ) -> StorageResult<Vec<CharacterState>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT en.name, en.emotion, en.goal
            FROM edges ed
            JOIN entities en
                ON en.manuscript_id = ed.manuscript_id AND en.id = ed.source_id
            WHERE ed.manuscript_id = ?1
                AND ed.relationship = ?2
                AND ed.target_id = ?3
                AND en.is_character = 1
            ORDER BY en.name ASC
            "#,
        )?;
        let characters = stmt
            .query_map(
                params![manuscript, Relationship::AppearsIn.as_str(), scene],
                |row| {
                    Ok(CharacterState {
                        name: row.get(0)?,
                        emotion: row.get(1)?,
                        goal: row.get(2)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(characters)
    }

    fn count(conn: &Connection, sql: &str, manuscript: &str) -> StorageResult<usize> {
        let n: i64 = conn.query_row(sql, params![manuscript], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Write handle over an open SQLite transaction
struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl GraphTx for SqliteTx<'_> {
    fn upsert_manuscript(&mut self, id: &ManuscriptId) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO manuscripts (id, created_at) VALUES (?1, ?2)
             ON CONFLICT(id) DO NOTHING",
            params![id.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn scene_sequence(&mut self, scene: &SceneId) -> StorageResult<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT sequence_index FROM scenes WHERE id = ?1",
                params![scene.as_str()],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn next_sequence_index(&mut self, manuscript: &ManuscriptId) -> StorageResult<i64> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(sequence_index) FROM scenes WHERE manuscript_id = ?1",
            params![manuscript.as_str()],
            |row| row.get(0),
        )?;
        Ok(max.map_or(0, |m| m + 1))
    }

    fn scene_at(
        &mut self,
        manuscript: &ManuscriptId,
        sequence_index: i64,
    ) -> StorageResult<Option<SceneId>> {
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM scenes WHERE manuscript_id = ?1 AND sequence_index = ?2
                 ORDER BY created_at DESC LIMIT 1",
                params![manuscript.as_str(), sequence_index],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(SceneId::from_string))
    }

    fn upsert_scene(&mut self, scene: &Scene) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO scenes (id, manuscript_id, sequence_index, chapter, paragraph_id,
                                chunk_index, raw_text, description, summary, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                sequence_index = excluded.sequence_index,
                chapter = excluded.chapter,
                raw_text = excluded.raw_text,
                summary = excluded.summary,
                created_at = excluded.created_at
            "#,
            params![
                scene.id.as_str(),
                scene.manuscript_id.as_str(),
                scene.sequence_index,
                scene.chapter.map(i64::from),
                scene.paragraph_id,
                scene.chunk_index as i64,
                scene.raw_text,
                scene.description,
                scene.summary,
                scene.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn set_scene_description(&mut self, scene: &SceneId, description: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE scenes SET description = ?2 WHERE id = ?1 AND description IS NULL",
            params![scene.as_str(), description],
        )?;
        Ok(())
    }

    fn upsert_entity(
        &mut self,
        manuscript: &ManuscriptId,
        entity: &NarrativeEntity,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        match entity {
            NarrativeEntity::Character(c) => {
                self.conn.execute(
                    r#"
                    INSERT INTO entities (manuscript_id, name_key, id, name, is_character,
                                          archetype, emotion, goal, updated_at)
                    VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8)
                    ON CONFLICT(manuscript_id, name_key) DO UPDATE SET
                        name = excluded.name,
                        is_character = 1,
                        archetype = excluded.archetype,
                        emotion = excluded.emotion,
                        goal = excluded.goal,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        manuscript.as_str(),
                        entity.key(),
                        entity.node_id(),
                        c.name.trim(),
                        c.archetype,
                        c.emotion,
                        c.goal,
                        now,
                    ],
                )?;
            }
            NarrativeEntity::Location(l) => {
                self.conn.execute(
                    r#"
                    INSERT INTO entities (manuscript_id, name_key, id, name, is_location,
                                          location_type, updated_at)
                    VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)
                    ON CONFLICT(manuscript_id, name_key) DO UPDATE SET
                        is_location = 1,
                        location_type = excluded.location_type,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        manuscript.as_str(),
                        entity.key(),
                        entity.node_id(),
                        l.name.trim(),
                        l.location_type,
                        now,
                    ],
                )?;
            }
        }
        Ok(())
    }

    fn upsert_event(&mut self, event: &Event) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO events (id, manuscript_id, scene_id, description) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET description = excluded.description",
            params![
                event.node_id(),
                event.manuscript_id.as_str(),
                event.scene_id.as_str(),
                event.description,
            ],
        )?;
        Ok(())
    }

    fn upsert_edge(&mut self, manuscript: &ManuscriptId, edge: &Edge) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO edges (manuscript_id, source_id, relationship, target_id,
                               properties_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(manuscript_id, source_id, relationship, target_id) DO UPDATE SET
                properties_json = excluded.properties_json
            "#,
            params![
                manuscript.as_str(),
                edge.source,
                edge.relationship.as_str(),
                edge.target,
                serde_json::to_string(&edge.properties)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl GraphStore for SqliteStore {
    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn GraphTx) -> StorageResult<()>,
    ) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut handle = SqliteTx { conn: &tx };
            // Dropping `tx` on error rolls back
            work(&mut handle)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_scene(&self, id: &SceneId) -> StorageResult<Option<Scene>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                r#"
                SELECT id, manuscript_id, sequence_index, chapter, paragraph_id, chunk_index,
                       raw_text, description, summary, created_at
                FROM scenes WHERE id = ?1
                "#,
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, Option<String>>(8)?,
                        row.get::<_, String>(9)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, m, seq, chapter, para, chunk, raw, desc, summary, created)) => Ok(Some(
                Self::row_to_scene(id, m, seq, chapter, para, chunk, raw, desc, summary, created)?,
            )),
            None => Ok(None),
        }
    }

    fn load_entity(
        &self,
        manuscript: &ManuscriptId,
        name: &str,
    ) -> StorageResult<Option<NarrativeEntity>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                r#"
                SELECT name, is_character, archetype, emotion, goal, location_type
                FROM entities WHERE manuscript_id = ?1 AND name_key = ?2
                "#,
                params![manuscript.as_str(), fold_name(name)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        // An entity labelled both ways reads back as its character side
        Ok(row.map(|(name, is_character, archetype, emotion, goal, location_type)| {
            if is_character {
                NarrativeEntity::Character(Character {
                    name,
                    archetype,
                    emotion,
                    goal,
                })
            } else {
                NarrativeEntity::Location(Location {
                    name,
                    location_type,
                })
            }
        }))
    }

    fn edges_from(&self, manuscript: &ManuscriptId, source: &str) -> StorageResult<Vec<Edge>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT source_id, relationship, target_id, properties_json
            FROM edges WHERE manuscript_id = ?1 AND source_id = ?2
            ORDER BY relationship ASC, target_id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![manuscript.as_str(), source], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(source, relationship, target, properties_json)| {
                let relationship = relationship
                    .parse::<Relationship>()
                    .map_err(StorageError::InvalidValue)?;
                let properties: BTreeMap<String, String> = serde_json::from_str(&properties_json)?;
                Ok(Edge {
                    source,
                    relationship,
                    target,
                    properties,
                })
            })
            .collect()
    }

    fn character_arc_rows(
        &self,
        manuscript: &ManuscriptId,
        name_query: &str,
    ) -> StorageResult<Vec<ArcRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.sequence_index, s.description, s.raw_text,
                   en.name, en.emotion, en.goal, en.archetype
            FROM entities en
            JOIN edges ed
                ON ed.manuscript_id = en.manuscript_id
                AND ed.source_id = en.id
                AND ed.relationship = ?3
            JOIN scenes s ON s.id = ed.target_id
            WHERE en.manuscript_id = ?1
                AND en.is_character = 1
                AND instr(en.name_key, ?2) > 0
            ORDER BY s.sequence_index ASC, s.created_at ASC
            "#,
        )?;
        let rows = stmt
            .query_map(
                params![
                    manuscript.as_str(),
                    fold_name(name_query),
                    Relationship::AppearsIn.as_str()
                ],
                |row| {
                    Ok(ArcRow {
                        sequence_index: row.get(0)?,
                        scene_description: row.get(1)?,
                        raw_text: row.get(2)?,
                        character: row.get(3)?,
                        emotion: row.get(4)?,
                        goal: row.get(5)?,
                        archetype: row.get(6)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn timeline(&self, manuscript: &ManuscriptId) -> StorageResult<Vec<TimelineScene>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, sequence_index, description, summary
            FROM scenes WHERE manuscript_id = ?1
            ORDER BY sequence_index ASC, created_at ASC
            "#,
        )?;
        let scenes = stmt
            .query_map(params![manuscript.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut timeline = Vec::with_capacity(scenes.len());
        for (id, sequence_index, description, summary) in scenes {
            let events = Self::scene_events(&conn, &id)?;
            let characters = Self::scene_characters(&conn, manuscript.as_str(), &id)?;
            timeline.push(TimelineScene {
                scene_id: SceneId::from_string(id),
                sequence_index,
                description,
                summary,
                events,
                characters,
            });
        }
        Ok(timeline)
    }

    fn stats(&self, manuscript: &ManuscriptId) -> StorageResult<GraphStats> {
        let conn = self.lock()?;
        let m = manuscript.as_str();
        Ok(GraphStats {
            scenes: Self::count(&conn, "SELECT COUNT(*) FROM scenes WHERE manuscript_id = ?1", m)?,
            characters: Self::count(
                &conn,
                "SELECT COUNT(*) FROM entities WHERE manuscript_id = ?1 AND is_character = 1",
                m,
            )?,
            locations: Self::count(
                &conn,
                "SELECT COUNT(*) FROM entities WHERE manuscript_id = ?1 AND is_location = 1",
                m,
            )?,
            events: Self::count(&conn, "SELECT COUNT(*) FROM events WHERE manuscript_id = ?1", m)?,
            edges: Self::count(&conn, "SELECT COUNT(*) FROM edges WHERE manuscript_id = ?1", m)?,
        })
    }
}
