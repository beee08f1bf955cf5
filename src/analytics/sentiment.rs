//! Polarity scoring for scene text
//!
//! A small word lexicon gives a base estimate in [-1, 1]. Story keywords
//! then override it outright: negative cues first, positive second.

/// Score forced when a negative keyword occurs
pub const NEGATIVE_OVERRIDE: f64 = -0.8;
/// Score forced when a positive keyword (and no negative one) occurs
pub const POSITIVE_OVERRIDE: f64 = 0.8;

pub const NEGATIVE_KEYWORDS: [&str; 21] = [
    "misery", "freezing", "frozen", "cold", "dead", "death", "pain", "sad", "despair", "fear",
    "anxious", "starving", "hungry", "dark", "alone", "weeping", "cry", "suffering", "struggle",
    "striving", "strived",
];

pub const POSITIVE_KEYWORDS: [&str; 16] = [
    "warm", "comfort", "happy", "peace", "love", "beautiful", "bright", "awed", "dream", "vision",
    "hope", "light", "celestial", "glory", "joy", "rejoiced",
];

const LEXICON: &[(&str, f64)] = &[
    ("good", 0.7),
    ("great", 0.8),
    ("wonderful", 1.0),
    ("lovely", 0.5),
    ("glad", 0.5),
    ("kind", 0.6),
    ("gentle", 0.4),
    ("smile", 0.3),
    ("smiled", 0.3),
    ("laugh", 0.3),
    ("laughed", 0.3),
    ("delight", 0.8),
    ("delighted", 0.7),
    ("safe", 0.5),
    ("sweet", 0.35),
    ("merry", 0.5),
    ("pleasant", 0.7),
    ("blessed", 0.5),
    ("shining", 0.4),
    ("festive", 0.5),
    ("bad", -0.7),
    ("terrible", -1.0),
    ("awful", -1.0),
    ("poor", -0.4),
    ("miserable", -1.0),
    ("cruel", -1.0),
    ("angry", -0.5),
    ("afraid", -0.6),
    ("bitter", -0.5),
    ("lonely", -0.5),
    ("lost", -0.3),
    ("tired", -0.4),
    ("hurt", -0.6),
    ("ugly", -0.7),
    ("grim", -0.5),
    ("wretched", -1.0),
    ("harsh", -0.4),
    ("sorrow", -0.6),
    ("empty", -0.1),
    ("bleak", -0.5),
];

const NEGATIONS: [&str; 5] = ["not", "no", "never", "nothing", "without"];
const INTENSIFIERS: [&str; 4] = ["very", "so", "really", "extremely"];

/// Base polarity from the word lexicon, in [-1, 1]. 0.0 when no word scores.
pub fn lexicon_polarity(text: &str) -> f64 {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();

    let mut total = 0.0;
    let mut scored = 0usize;
    for (i, word) in words.iter().enumerate() {
        let Some(&(_, base)) = LEXICON.iter().find(|(w, _)| w == word) else {
            continue;
        };
        let mut score = base;
        let prev = i.checked_sub(1).map(|p| words[p].as_str());
        if prev.is_some_and(|p| INTENSIFIERS.contains(&p)) {
            score *= 1.3;
        }
        let negated = words[i.saturating_sub(2)..i]
            .iter()
            .any(|w| NEGATIONS.contains(&w.as_str()));
        if negated {
            score *= -0.5;
        }
        total += score;
        scored += 1;
    }

    if scored == 0 {
        0.0
    } else {
        (total / scored as f64).clamp(-1.0, 1.0)
    }
}

/// Forced score from story keywords, if any occurs (substring match).
pub fn keyword_override(text: &str) -> Option<f64> {
    let lower = text.to_lowercase();
    if NEGATIVE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Some(NEGATIVE_OVERRIDE)
    } else if POSITIVE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Some(POSITIVE_OVERRIDE)
    } else {
        None
    }
}

/// Polarity of `text`: keyword override if any, else lexicon estimate.
pub fn polarity(text: &str) -> f64 {
    keyword_override(text).unwrap_or_else(|| lexicon_polarity(text))
}
