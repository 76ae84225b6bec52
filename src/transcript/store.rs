//! Ordered transcript entries with a stale-boundary cursor.
//!
//! The store applies batched edit plans built against a snapshot of its
//! active tail, and prunes entries whose occurrence count has collapsed.
//! The stale boundary separates the committed prefix, which future updates
//! never revisit, from the tail still open to revision.

use crate::error::{Result, ScrivenerError};
use crate::transcript::word::Word;
use std::fmt::Write as _;

/// One edit against the transcript's active tail.
///
/// `a` indexes the tail snapshot the plan was built from; `b` indexes the
/// incoming word list. Plans are ordered with non-decreasing `a`, which lets
/// the store translate positions with a running insertion offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// The tail entry was corroborated by the update.
    MatchedWord { a: usize, b: usize },
    /// Insert `new[b]` at tail position `a`, shifting later entries right.
    Insert { a: usize, b: usize },
    /// Subtract one occurrence from the tail entry.
    Decrement { a: usize },
    /// Probabilistic replacement: the update disagrees with the tail entry.
    Conflict { a: usize, b: usize },
    /// Fuse segment timing metadata from the update into the tail entry.
    MergeSegments { a: usize, b: usize },
}

/// The running transcript.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Word>,
    stale_word_id: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Appends a batch of entries at the tail.
    pub fn push_back(&mut self, words: Vec<Word>) {
        self.entries.extend(words);
    }

    /// Entries in order, committed prefix included.
    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.entries.iter()
    }

    /// The active tail: everything from the stale boundary onward.
    ///
    /// Edit plans are built against this snapshot.
    pub fn get_words_splice(&self) -> Vec<Word> {
        self.entries[self.stale_word_id..].to_vec()
    }

    pub fn stale_word_id(&self) -> usize {
        self.stale_word_id
    }

    /// Advances the stale boundary.
    ///
    /// The boundary is monotonic: values below the current one are clamped
    /// up, values past the end are clamped down.
    pub fn set_stale_word_id(&mut self, id: usize) {
        self.stale_word_id = id.max(self.stale_word_id).min(self.entries.len());
    }

    /// Applies an ordered edit plan atomically.
    ///
    /// Operation indices reference the tail snapshot taken when the plan was
    /// built; insertions are accounted for with a running offset, which is
    /// sound because plans carry non-decreasing indices. The stale boundary
    /// is not touched here.
    pub fn run(&mut self, ops: &[EditOp], new_words: &[Word]) -> Result<()> {
        let base = self.stale_word_id;
        let mut inserted = 0usize;

        for op in ops {
            match *op {
                EditOp::MatchedWord { a, b: _ } => {
                    let entry = self.entry_mut(base, a, inserted)?;
                    if entry.is_segment() {
                        return Err(ScrivenerError::PlannerInvariant {
                            message: format!("matched-word op targets a segment at {}", a),
                        });
                    }
                    entry.increment();
                }
                EditOp::Insert { a, b } => {
                    let idx = base + a + inserted;
                    if idx > self.entries.len() {
                        return Err(ScrivenerError::OperationOutOfRange {
                            index: a,
                            len: self.entries.len() - base,
                        });
                    }
                    let word = new_words.get(b).ok_or_else(|| {
                        ScrivenerError::PlannerInvariant {
                            message: format!("insert source {} out of range", b),
                        }
                    })?;
                    self.entries.insert(idx, word.clone());
                    inserted += 1;
                }
                EditOp::Decrement { a } => {
                    self.entry_mut(base, a, inserted)?.decrement();
                }
                EditOp::Conflict { a, b } => {
                    let replacement = new_words
                        .get(b)
                        .and_then(Word::as_text)
                        .ok_or_else(|| ScrivenerError::PlannerInvariant {
                            message: format!("conflict source {} is not a text word", b),
                        })?
                        .clone();
                    let entry = self.entry_mut(base, a, inserted)?;
                    let target =
                        entry
                            .as_text_mut()
                            .ok_or_else(|| ScrivenerError::PlannerInvariant {
                                message: format!("conflict op targets a segment at {}", a),
                            })?;
                    if replacement.prob() > target.prob() {
                        target.overwrite_with(&replacement);
                    }
                }
                EditOp::MergeSegments { a, b } => {
                    let newer = new_words
                        .get(b)
                        .and_then(Word::as_segment)
                        .ok_or_else(|| ScrivenerError::PlannerInvariant {
                            message: format!("segment-merge source {} is not a segment", b),
                        })?
                        .clone();
                    let entry = self.entry_mut(base, a, inserted)?;
                    match entry.as_segment_mut() {
                        Some(segment) => segment.merge_from(&newer),
                        None => {
                            return Err(ScrivenerError::PlannerInvariant {
                                message: format!("segment-merge op targets a word at {}", a),
                            });
                        }
                    }
                    entry.increment();
                }
            }
        }

        Ok(())
    }

    /// Removes entries whose occurrences have fallen to the threshold or
    /// below. The stale boundary shifts left for removals in front of it.
    pub fn clear_mistakes(&mut self, threshold: i32) {
        let mut removed_before_stale = 0;
        let stale = self.stale_word_id;
        let mut index = 0;
        self.entries.retain(|word| {
            let keep = word.occurrences() > threshold;
            if !keep && index < stale {
                removed_before_stale += 1;
            }
            index += 1;
            keep
        });
        self.stale_word_id -= removed_before_stale;
    }

    /// One-line-per-segment dump of the transcript for diagnostics.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut first_in_line = true;
        for word in &self.entries {
            match word {
                Word::Segment(segment) => {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    let _ = write!(out, "{}", segment);
                    first_in_line = true;
                }
                Word::Text(_) => {
                    if !first_in_line {
                        out.push_str("||");
                    }
                    out.push_str(word.text());
                    first_in_line = false;
                }
            }
        }
        out
    }

    fn entry_mut(&mut self, base: usize, a: usize, inserted: usize) -> Result<&mut Word> {
        let idx = base + a + inserted;
        let len = self.entries.len();
        self.entries
            .get_mut(idx)
            .ok_or(ScrivenerError::OperationOutOfRange {
                index: a,
                len: len.saturating_sub(base),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::word::SingleToken;
    use std::time::{Duration, SystemTime};

    fn word(text: &str, prob: f32) -> Word {
        Word::from_tokens(vec![SingleToken::new(text, prob)])
    }

    fn segment(duration_ms: u64) -> Word {
        Word::segment(
            SingleToken::new(".", 0.9),
            Duration::from_millis(duration_ms),
            SystemTime::UNIX_EPOCH + Duration::from_secs(1),
        )
    }

    fn texts(transcript: &Transcript) -> Vec<String> {
        transcript
            .words()
            .filter(|w| !w.is_segment())
            .map(|w| w.text().to_string())
            .collect()
    }

    #[test]
    fn test_push_back_and_iterate() {
        let mut transcript = Transcript::new();
        assert!(transcript.is_empty());

        transcript.push_back(vec![word("hello", 0.9), word("world", 0.8)]);
        assert_eq!(transcript.len(), 2);
        assert_eq!(texts(&transcript), vec!["hello", "world"]);
    }

    #[test]
    fn test_splice_starts_at_stale_boundary() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("a", 0.9), word("b", 0.9), word("c", 0.9)]);
        transcript.set_stale_word_id(1);

        let tail = transcript.get_words_splice();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text(), "b");
    }

    #[test]
    fn test_stale_boundary_is_monotonic() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("a", 0.9), word("b", 0.9)]);

        transcript.set_stale_word_id(2);
        assert_eq!(transcript.stale_word_id(), 2);

        // Attempts to move backwards are clamped.
        transcript.set_stale_word_id(0);
        assert_eq!(transcript.stale_word_id(), 2);

        // As are attempts to move past the end.
        transcript.set_stale_word_id(99);
        assert_eq!(transcript.stale_word_id(), 2);
    }

    #[test]
    fn test_run_matched_word_increments() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("hello", 0.9)]);

        transcript
            .run(&[EditOp::MatchedWord { a: 0, b: 0 }], &[word("hello", 0.9)])
            .unwrap();
        assert_eq!(transcript.words().next().unwrap().occurrences(), 2);
    }

    #[test]
    fn test_run_insert_shifts_following_ops() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("the", 0.9), word("fox", 0.9)]);

        // Plan built against snapshot ["the", "fox"]: match "the", insert
        // "quick" and "brown" before "fox", then match "fox".
        let new_words = vec![word("quick", 0.8), word("brown", 0.8), word("fox", 0.9)];
        let ops = [
            EditOp::MatchedWord { a: 0, b: 0 },
            EditOp::Insert { a: 1, b: 0 },
            EditOp::Insert { a: 1, b: 1 },
            EditOp::MatchedWord { a: 1, b: 2 },
        ];
        transcript.run(&ops, &new_words).unwrap();

        assert_eq!(texts(&transcript), vec!["the", "quick", "brown", "fox"]);
        let occ: Vec<i32> = transcript.words().map(|w| w.occurrences()).collect();
        assert_eq!(occ, vec![2, 1, 1, 2]);
    }

    #[test]
    fn test_run_applies_ops_relative_to_stale_base() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("old", 0.9), word("tail", 0.5)]);
        transcript.set_stale_word_id(1);

        transcript
            .run(&[EditOp::Decrement { a: 0 }], &[])
            .unwrap();

        let occ: Vec<i32> = transcript.words().map(|w| w.occurrences()).collect();
        assert_eq!(occ, vec![1, 0], "decrement must land on the tail entry");
    }

    #[test]
    fn test_run_conflict_respects_probability() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("quik", 0.3)]);

        // Higher-probability replacement wins.
        transcript
            .run(&[EditOp::Conflict { a: 0, b: 0 }], &[word("quick", 0.9)])
            .unwrap();
        assert_eq!(texts(&transcript), vec!["quick"]);

        // Lower-probability replacement is ignored.
        transcript
            .run(&[EditOp::Conflict { a: 0, b: 0 }], &[word("quack", 0.1)])
            .unwrap();
        assert_eq!(texts(&transcript), vec!["quick"]);
    }

    #[test]
    fn test_run_conflict_preserves_occurrences() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("quik", 0.3)]);
        transcript
            .run(&[EditOp::MatchedWord { a: 0, b: 0 }], &[word("quik", 0.3)])
            .unwrap();

        transcript
            .run(&[EditOp::Conflict { a: 0, b: 0 }], &[word("quick", 0.9)])
            .unwrap();

        let entry = transcript.words().next().unwrap();
        assert_eq!(entry.text(), "quick");
        assert_eq!(entry.occurrences(), 2);
    }

    #[test]
    fn test_run_merge_segments() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("a", 0.9), segment(1000)]);

        let newer = Word::segment(
            SingleToken::new("!", 0.95),
            Duration::from_millis(1200),
            SystemTime::UNIX_EPOCH + Duration::from_secs(1),
        );
        transcript
            .run(&[EditOp::MergeSegments { a: 1, b: 0 }], &[newer])
            .unwrap();

        let seg = transcript.words().nth(1).unwrap();
        assert_eq!(seg.as_segment().unwrap().duration(), Duration::from_millis(1200));
        assert_eq!(seg.occurrences(), 2);
    }

    #[test]
    fn test_run_matched_on_segment_is_fatal() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![segment(500)]);

        let err = transcript
            .run(&[EditOp::MatchedWord { a: 0, b: 0 }], &[word("x", 0.5)])
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_run_out_of_range_is_error() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("a", 0.9)]);

        let err = transcript
            .run(&[EditOp::Decrement { a: 5 }], &[])
            .unwrap_err();
        assert!(matches!(err, ScrivenerError::OperationOutOfRange { .. }));
    }

    #[test]
    fn test_clear_mistakes_prunes_at_threshold() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("keep", 0.9), word("drop", 0.2)]);

        // drop: 1 -> -1 via two decrements, keep untouched.
        transcript
            .run(
                &[EditOp::Decrement { a: 1 }, EditOp::Decrement { a: 1 }],
                &[],
            )
            .unwrap();
        transcript.clear_mistakes(-1);

        assert_eq!(texts(&transcript), vec!["keep"]);
    }

    #[test]
    fn test_clear_mistakes_keeps_zero_occurrence_at_default_threshold() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("shaky", 0.4)]);
        transcript.run(&[EditOp::Decrement { a: 0 }], &[]).unwrap();

        transcript.clear_mistakes(-1);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.words().next().unwrap().occurrences(), 0);
    }

    #[test]
    fn test_clear_mistakes_adjusts_stale_boundary() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![word("a", 0.9), word("b", 0.9), word("c", 0.9)]);

        // Decrement "a" to 0 while it is still in the tail, then commit past it.
        transcript.run(&[EditOp::Decrement { a: 0 }], &[]).unwrap();
        transcript.set_stale_word_id(2);

        transcript.clear_mistakes(0);
        assert_eq!(texts(&transcript), vec!["b", "c"]);
        assert_eq!(transcript.stale_word_id(), 1);
    }

    #[test]
    fn test_render_groups_lines_by_segment() {
        let mut transcript = Transcript::new();
        transcript.push_back(vec![
            segment(1000),
            word(" hello", 0.9),
            word(" world", 0.9),
            segment(500),
            word(" again", 0.9),
        ]);

        let rendered = transcript.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" hello|| world"));
        assert!(lines[1].contains(" again"));
    }
}
