//! Word units that make up a transcript.
//!
//! A transcript entry is either a text word (one or more inference tokens)
//! or a segment marker carrying timing metadata. Both participate in the
//! same occurrence accounting: corroborated entries gain occurrences,
//! contradicted entries lose them and are eventually pruned.

use std::fmt;
use std::time::{Duration, SystemTime};

/// A single inference token with its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleToken {
    pub text: String,
    pub prob: f32,
}

impl SingleToken {
    pub fn new(text: impl Into<String>, prob: f32) -> Self {
        Self {
            text: text.into(),
            prob,
        }
    }
}

/// A spoken word assembled from one or more tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct TextWord {
    tokens: Vec<SingleToken>,
    /// Concatenation of the token texts, cached at construction.
    text: String,
    is_punct: bool,
    occurrences: i32,
}

impl TextWord {
    fn new(tokens: Vec<SingleToken>, is_punct: bool) -> Self {
        debug_assert!(!tokens.is_empty(), "a text word needs at least one token");
        let text = tokens.iter().map(|t| t.text.as_str()).collect();
        Self {
            tokens,
            text,
            is_punct,
            occurrences: 1,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[SingleToken] {
        &self.tokens
    }

    pub fn is_punct(&self) -> bool {
        self.is_punct
    }

    /// Mean probability over the word's tokens.
    pub fn prob(&self) -> f32 {
        self.tokens.iter().map(|t| t.prob).sum::<f32>() / self.tokens.len() as f32
    }

    /// Overwrites this word's content with another's, keeping occurrences.
    pub(crate) fn overwrite_with(&mut self, other: &TextWord) {
        self.tokens = other.tokens.clone();
        self.text = other.text.clone();
        self.is_punct = other.is_punct;
    }
}

/// Timing metadata for a span of words.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentWord {
    /// Last token of the segment, kept as a sentinel.
    end_token: SingleToken,
    duration: Duration,
    start: SystemTime,
    occurrences: i32,
}

impl SegmentWord {
    pub fn new(end_token: SingleToken, duration: Duration, start: SystemTime) -> Self {
        Self {
            end_token,
            duration,
            start,
            occurrences: 1,
        }
    }

    pub fn end_token(&self) -> &SingleToken {
        &self.end_token
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn start(&self) -> SystemTime {
        self.start
    }

    /// Fuses a newer observation of this segment into the stored metadata.
    ///
    /// Adopts the newer start and end token; the duration is extended so the
    /// merged segment covers both observed ranges.
    pub(crate) fn merge_from(&mut self, newer: &SegmentWord) {
        let old_end = self.start + self.duration;
        let new_end = newer.start + newer.duration;
        let end = old_end.max(new_end);

        self.start = newer.start;
        self.duration = end
            .duration_since(self.start)
            .unwrap_or(newer.duration);
        self.end_token = newer.end_token.clone();
    }
}

impl fmt::Display for SegmentWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start_ms = self
            .start
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        write!(
            f,
            "[segment start={}ms duration={}ms end_token='{}']",
            start_ms,
            self.duration.as_millis(),
            self.end_token.text
        )
    }
}

/// A transcript entry: either a spoken word or a segment marker.
///
/// Tagged variant with uniform ordering in the transcript; dispatch on the
/// tag rather than downcasting.
#[derive(Debug, Clone, PartialEq)]
pub enum Word {
    Text(TextWord),
    Segment(SegmentWord),
}

impl Word {
    /// Builds a word from a non-empty work-in-progress token list.
    pub fn from_tokens(tokens: Vec<SingleToken>) -> Self {
        Word::Text(TextWord::new(tokens, false))
    }

    /// Builds a standalone punctuation word from a single token.
    pub fn punct(token: SingleToken) -> Self {
        Word::Text(TextWord::new(vec![token], true))
    }

    /// Builds a segment marker.
    pub fn segment(end_token: SingleToken, duration: Duration, start: SystemTime) -> Self {
        Word::Segment(SegmentWord::new(end_token, duration, start))
    }

    pub fn is_segment(&self) -> bool {
        matches!(self, Word::Segment(_))
    }

    pub fn is_punct(&self) -> bool {
        match self {
            Word::Text(w) => w.is_punct(),
            Word::Segment(_) => false,
        }
    }

    /// The word's textual form; empty for segments.
    pub fn text(&self) -> &str {
        match self {
            Word::Text(w) => w.text(),
            Word::Segment(_) => "",
        }
    }

    /// Form used for alignment: trimmed and lowercased.
    ///
    /// Empty for punctuation and segments, which are skipped by the aligner.
    pub fn comparable(&self) -> String {
        match self {
            Word::Text(w) if !w.is_punct() => w.text().trim().to_lowercase(),
            _ => String::new(),
        }
    }

    pub fn prob(&self) -> f32 {
        match self {
            Word::Text(w) => w.prob(),
            Word::Segment(s) => s.end_token().prob,
        }
    }

    pub fn occurrences(&self) -> i32 {
        match self {
            Word::Text(w) => w.occurrences,
            Word::Segment(s) => s.occurrences,
        }
    }

    pub(crate) fn increment(&mut self) {
        match self {
            Word::Text(w) => w.occurrences += 1,
            Word::Segment(s) => s.occurrences += 1,
        }
    }

    pub(crate) fn decrement(&mut self) {
        match self {
            Word::Text(w) => w.occurrences -= 1,
            Word::Segment(s) => s.occurrences -= 1,
        }
    }

    pub fn as_text(&self) -> Option<&TextWord> {
        match self {
            Word::Text(w) => Some(w),
            Word::Segment(_) => None,
        }
    }

    pub fn as_segment(&self) -> Option<&SegmentWord> {
        match self {
            Word::Segment(s) => Some(s),
            Word::Text(_) => None,
        }
    }

    pub(crate) fn as_text_mut(&mut self) -> Option<&mut TextWord> {
        match self {
            Word::Text(w) => Some(w),
            Word::Segment(_) => None,
        }
    }

    pub(crate) fn as_segment_mut(&mut self) -> Option<&mut SegmentWord> {
        match self {
            Word::Segment(s) => Some(s),
            Word::Text(_) => None,
        }
    }
}
