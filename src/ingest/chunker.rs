//! Splits submitted text into scene-sized chunks

use crate::config::ChunkingConfig;

/// How the input was split, which decides the join separator on merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitMode {
    Paragraph,
    Line,
    Sentence,
}

impl SplitMode {
    fn separator(self) -> &'static str {
        match self {
            Self::Paragraph => "\n\n",
            Self::Line => "\n",
            Self::Sentence => " ",
        }
    }
}

/// Stateless text chunker.
///
/// Pieces are merged until adding the next one would reach `min_chars`.
/// `max_chars_hint` is advisory only.
#[derive(Debug, Clone)]
pub struct Chunker {
    min_chars: usize,
    max_chars_hint: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(&ChunkingConfig::default())
    }
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            min_chars: config.min_chars.max(1),
            max_chars_hint: config.max_chars_hint,
        }
    }

    pub fn max_chars_hint(&self) -> usize {
        self.max_chars_hint
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut mode = SplitMode::Paragraph;
        let mut pieces = split_paragraphs(&text);
        if pieces.len() <= 1 {
            mode = SplitMode::Line;
            pieces = split_lines(&text);
        }
        if pieces.len() <= 1 {
            mode = SplitMode::Sentence;
            pieces = split_sentences(&text);
        }

        self.merge(pieces, mode.separator())
    }

    fn merge(&self, pieces: Vec<String>, separator: &str) -> Vec<String> {
        let sep_len = separator.chars().count();
        let mut chunks = Vec::new();
        let mut acc = String::new();
        let mut acc_len = 0;

        for piece in pieces {
            let piece_len = piece.chars().count();
            let joined_len = if acc.is_empty() {
                piece_len
            } else {
                acc_len + sep_len + piece_len
            };

            if joined_len >= self.min_chars {
                if !acc.is_empty() {
                    chunks.push(std::mem::take(&mut acc));
                }
                acc = piece;
                acc_len = piece_len;
            } else {
                if !acc.is_empty() {
                    acc.push_str(separator);
                }
                acc.push_str(&piece);
                acc_len = joined_len;
            }
        }

        if !acc.is_empty() {
            chunks.push(acc);
        }
        chunks
    }
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for line in text.split('\n') {
        if line.trim().is_empty() {
            push_trimmed(&mut pieces, &current);
            current.clear();
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    push_trimmed(&mut pieces, &current);
    pieces
}

fn split_lines(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    for line in text.split('\n') {
        push_trimmed(&mut pieces, line);
    }
    pieces
}

/// Split after `.`, `!` or `?` when followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') && chars.peek().is_some_and(|c| c.is_whitespace()) {
            push_trimmed(&mut pieces, &current);
            current.clear();
        }
    }
    push_trimmed(&mut pieces, &current);
    pieces
}

fn push_trimmed(pieces: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        pieces.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(min_chars: usize) -> Chunker {
        Chunker::new(&ChunkingConfig {
            min_chars,
            max_chars_hint: 1500,
        })
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        let c = Chunker::default();
        assert!(c.chunk("").is_empty());
        assert!(c.chunk("   \n\n\t  ").is_empty());
    }

    #[test]
    fn plain_text_without_breaks_is_returned_trimmed() {
        let c = Chunker::default();
        assert_eq!(
            c.chunk("   the snow kept falling on the quiet town   "),
            vec!["the snow kept falling on the quiet town".to_string()]
        );
    }

    #[test]
    fn long_paragraph_forces_a_split() {
        let long = "She walked on through the snow. ".repeat(8);
        let text = format!("A short opening line.\n\n{}", long);
        let chunks = Chunker::default().chunk(&text);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert_eq!(chunk, chunk.trim());
        }
        assert_eq!(chunks[0], "A short opening line.");
    }

    #[test]
    fn long_first_paragraph_then_short_one() {
        let long = "x".repeat(250);
        let text = format!("{}\n\nThe end.", long);
        let chunks = Chunker::default().chunk(&text);
        assert_eq!(chunks, vec![long, "The end.".to_string()]);
    }

    #[test]
    fn short_paragraphs_merge_with_blank_line() {
        let chunks = Chunker::default().chunk("One.\n\nTwo.\r\n\r\nThree.");
        assert_eq!(chunks, vec!["One.\n\nTwo.\n\nThree.".to_string()]);
    }

    #[test]
    fn single_newlines_split_when_no_blank_lines() {
        let chunks = chunker(10).chunk("first line here\nsecond line here");
        assert_eq!(
            chunks,
            vec!["first line here".to_string(), "second line here".to_string()]
        );
    }

    #[test]
    fn sentences_split_as_last_resort() {
        let chunks = chunker(30).chunk("Anna walked into the night. She remembered home! Why?");
        assert_eq!(
            chunks,
            vec![
                "Anna walked into the night.".to_string(),
                "She remembered home! Why?".to_string(),
            ]
        );
    }

    #[test]
    fn decimal_points_do_not_split_sentences() {
        let chunks = chunker(5).chunk("It cost 2.50 coins. Too much.");
        assert_eq!(
            chunks,
            vec!["It cost 2.50 coins.".to_string(), "Too much.".to_string()]
        );
    }

    #[test]
    fn lowered_threshold_keeps_two_paragraphs_apart() {
        let text = "Anna walked into the freezing night.\n\nShe remembered the warmth of home.";
        assert_eq!(Chunker::default().chunk(text).len(), 1);
        assert_eq!(chunker(30).chunk(text).len(), 2);
    }
}
