//! Character sentiment arcs

use super::sentiment;
use super::AnalyticsError;
use crate::graph::ManuscriptId;
use crate::storage::{ArcRow, GraphStore};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::{debug, instrument};

const DEFAULT_EMOTION: &str = "Neutral";
const DEFAULT_UNKNOWN: &str = "Unknown";
const DEFAULT_DESCRIPTION: &str = "Scene details unavailable";

/// Trailing smoothing window, current row included
const WINDOW: usize = 3;
/// Minimum first-to-last change for a rise or fall
const SHAPE_THRESHOLD: f64 = 0.4;

/// Overall direction of an arc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcShape {
    Rise,
    Fall,
    Flat,
}

impl ArcShape {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rise => "Redemption / Rise",
            Self::Fall => "Tragedy / Fall",
            Self::Flat => "Steady / Flat",
        }
    }

    /// Classify raw scores by last minus first.
    pub fn classify(scores: &[f64]) -> Self {
        let (Some(first), Some(last)) = (scores.first(), scores.last()) else {
            return Self::Flat;
        };
        let delta = last - first;
        if delta > SHAPE_THRESHOLD {
            Self::Rise
        } else if delta < -SHAPE_THRESHOLD {
            Self::Fall
        } else {
            Self::Flat
        }
    }
}

impl Serialize for ArcShape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// One scene of an arc
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArcPoint {
    pub step: i64,
    pub sentiment_score: f64,
    pub smoothed_score: f64,
    pub emotion: String,
    pub goal: String,
    pub archetype: String,
    pub scene_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterArc {
    pub character: String,
    pub manuscript_id: ManuscriptId,
    pub data_points: Vec<ArcPoint>,
    pub overall_sentiment: ArcShape,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArcOutcome {
    Found(CharacterArc),
    NotFound,
}

/// Trailing mean over the current and up to two preceding scores.
pub fn smooth(scores: &[f64]) -> Vec<f64> {
    (0..scores.len())
        .map(|i| {
            let window = &scores[i.saturating_sub(WINDOW - 1)..=i];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

/// Normalize a character query: trim, drop a leading "The ".
fn clean_query(query: &str) -> &str {
    let query = query.trim_start();
    query.strip_prefix("The ").unwrap_or(query).trim()
}

/// Reported scores carry two decimals.
fn round2(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

fn text_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Computes sentiment arcs from a character's ordered scenes.
#[derive(Clone)]
pub struct ArcAnalyzer {
    store: Arc<dyn GraphStore>,
}

impl ArcAnalyzer {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, manuscript), fields(manuscript = %manuscript))]
    pub fn arc(&self, manuscript: &ManuscriptId, name_query: &str) -> Result<ArcOutcome, AnalyticsError> {
        let query = clean_query(name_query);
        if query.is_empty() {
            return Ok(ArcOutcome::NotFound);
        }

        let rows = self.store.character_arc_rows(manuscript, query)?;
        debug!(rows = rows.len(), "Arc rows loaded");

        Ok(match Self::compute(name_query, manuscript, &rows) {
            Some(arc) => ArcOutcome::Found(arc),
            None => ArcOutcome::NotFound,
        })
    }

    /// Build the arc for already-loaded rows; `None` if there are none.
    pub fn compute(character: &str, manuscript: &ManuscriptId, rows: &[ArcRow]) -> Option<CharacterArc> {
        if rows.is_empty() {
            return None;
        }

        let mut scores = Vec::with_capacity(rows.len());
        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            let emotion = text_or(&row.emotion, DEFAULT_EMOTION);
            let scene_description = text_or(&row.scene_description, DEFAULT_DESCRIPTION);

            let analysis_text = match row.raw_text.as_deref().filter(|t| !t.trim().is_empty()) {
                Some(raw) => raw,
                None if scene_description != DEFAULT_DESCRIPTION => scene_description.as_str(),
                None => emotion.as_str(),
            };
            let score = sentiment::polarity(analysis_text);
            scores.push(score);

            points.push(ArcPoint {
                step: row.sequence_index,
                sentiment_score: round2(score),
                smoothed_score: 0.0,
                emotion,
                goal: text_or(&row.goal, DEFAULT_UNKNOWN),
                archetype: text_or(&row.archetype, DEFAULT_UNKNOWN),
                scene_description,
            });
        }

        for (point, smoothed) in points.iter_mut().zip(smooth(&scores)) {
            point.smoothed_score = round2(smoothed);
        }

        Some(CharacterArc {
            character: character.to_string(),
            manuscript_id: manuscript.clone(),
            data_points: points,
            overall_sentiment: ArcShape::classify(&scores),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(step: i64, raw: Option<&str>, description: Option<&str>, emotion: Option<&str>) -> ArcRow {
        ArcRow {
            sequence_index: step,
            scene_description: description.map(String::from),
            raw_text: raw.map(String::from),
            character: "Anna".to_string(),
            emotion: emotion.map(String::from),
            goal: None,
            archetype: None,
        }
    }

    #[test]
    fn smoothing_is_a_trailing_mean() {
        let smoothed = smooth(&[0.9, -0.3, 0.6, 0.0]);
        assert_eq!(smoothed[0], 0.9);
        assert!((smoothed[1] - 0.3).abs() < 1e-9);
        assert!((smoothed[2] - 0.4).abs() < 1e-9);
        assert!((smoothed[3] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(ArcShape::classify(&[-0.8, 0.8]), ArcShape::Rise);
        assert_eq!(ArcShape::classify(&[0.8, 0.0, -0.8]), ArcShape::Fall);
        assert_eq!(ArcShape::classify(&[0.1, 0.5]), ArcShape::Flat);
        assert_eq!(ArcShape::classify(&[0.3]), ArcShape::Flat);
    }

    #[test]
    fn analysis_text_priority() {
        let m = ManuscriptId::from("m1");
        let rows = [
            // raw text wins
            row(0, Some("freezing"), Some("a warm hearth"), Some("Joyful")),
            // blank raw text falls back to description
            row(1, Some("  "), Some("a warm hearth"), None),
            // then to the emotion label
            row(2, None, None, Some("Sad")),
        ];
        let arc = ArcAnalyzer::compute("Anna", &m, &rows).unwrap();
        let scores: Vec<f64> = arc.data_points.iter().map(|p| p.sentiment_score).collect();
        assert_eq!(scores, vec![-0.8, 0.8, -0.8]);
        assert_eq!(arc.data_points[2].scene_description, "Scene details unavailable");
        assert_eq!(arc.data_points[2].goal, "Unknown");
        assert_eq!(arc.data_points[1].emotion, "Neutral");
    }

    #[test]
    fn reported_scores_are_rounded_but_shape_uses_raw() {
        let m = ManuscriptId::from("m1");
        // lexicon means: 0.65, -0.25, 0.0
        let rows = [
            row(0, Some("good and kind"), None, None),
            row(1, Some("glad yet wretched"), None, None),
            row(2, Some("nothing scores here"), None, None),
        ];
        let arc = ArcAnalyzer::compute("Anna", &m, &rows).unwrap();
        assert_eq!(arc.data_points[0].sentiment_score, 0.65);
        assert_eq!(arc.data_points[1].sentiment_score, -0.25);
        assert_eq!(arc.data_points[1].smoothed_score, 0.2);
        assert_eq!(arc.data_points[2].smoothed_score, 0.13);
        assert_eq!(arc.overall_sentiment, ArcShape::Fall);
    }

    #[test]
    fn no_rows_is_not_found() {
        assert!(ArcAnalyzer::compute("Anna", &ManuscriptId::from("m1"), &[]).is_none());
    }

    #[test]
    fn query_cleaning() {
        assert_eq!(clean_query("  The Little Match Girl "), "Little Match Girl");
        assert_eq!(clean_query("Theodore"), "Theodore");
        assert_eq!(clean_query("The "), "");
    }

    #[test]
    fn shape_serializes_as_label() {
        assert_eq!(
            serde_json::to_value(ArcShape::Rise).unwrap(),
            serde_json::json!("Redemption / Rise")
        );
    }
}
