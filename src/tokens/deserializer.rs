//! Deserialization of raw token messages into word units.
//!
//! Walks the token stream once, maintaining a work-in-progress token list
//! that is flushed into a word at every boundary: a new segment, a token
//! with leading whitespace, or standalone punctuation. Special inference
//! markers are dropped, and multi-token composites are joined before they
//! enter a word.

use crate::error::{Result, ScrivenerError};
use crate::tokens::joiner;
use crate::tokens::message::TokenMessage;
use crate::transcript::word::{SingleToken, Word};
use std::time::Duration;

/// Segment timestamps arrive in units of 10 ms.
pub const TS_TO_MS_RATIO: i64 = 10;

/// Converts one inference message into an ordered word list.
///
/// Malformed messages are rejected without producing any words; the caller
/// is expected to warn and drop them.
pub fn deserialize_tokens(msg: &TokenMessage) -> Result<Vec<Word>> {
    validate(msg)?;

    let audio_start = msg.audio_start();
    let token_count = msg.token_texts.len();
    let mut words = Vec::new();
    let mut wip: Vec<SingleToken> = Vec::new();
    let mut segment_ptr = 0;

    let mut i = 0;
    while i < token_count {
        if segment_ptr < msg.segment_start_token_idxs.len()
            && i == msg.segment_start_token_idxs[segment_ptr]
        {
            // Complete the previous word before starting a new segment.
            if !wip.is_empty() {
                words.push(Word::from_tokens(std::mem::take(&mut wip)));
            }

            // The segment's end token is the one just before the next
            // segment start, or the last token for the final segment.
            let end_token_id = if segment_ptr == msg.segment_start_token_idxs.len() - 1 {
                token_count - 1
            } else {
                msg.segment_start_token_idxs[segment_ptr + 1] - 1
            };
            let end_token = SingleToken::new(
                msg.token_texts[end_token_id].clone(),
                msg.token_probs[end_token_id],
            );

            let start_ms = msg.start_times[segment_ptr] * TS_TO_MS_RATIO;
            let end_ms = msg.end_times[segment_ptr] * TS_TO_MS_RATIO;
            let duration = Duration::from_millis(end_ms.saturating_sub(start_ms).max(0) as u64);
            let start = audio_start + Duration::from_millis(start_ms.max(0) as u64);
            words.push(Word::segment(end_token, duration, start));
            segment_ptr += 1;
        }

        let text = msg.token_texts[i].as_str();

        // A token that opens with whitespace starts a new word.
        if !wip.is_empty()
            && let Some(first) = text.chars().next()
            && first.is_whitespace()
        {
            words.push(Word::from_tokens(std::mem::take(&mut wip)));
        }

        if is_special_token(text) {
            // Inference markers like [_BEG_] or [_TT_150_] carry no speech.
        } else if is_punct_token(text) {
            if !wip.is_empty() {
                words.push(Word::from_tokens(std::mem::take(&mut wip)));
            }
            words.push(Word::punct(SingleToken::new(
                text.to_string(),
                msg.token_probs[i],
            )));
        } else if let Some(count) = joiner::join_count(&msg.token_texts, i) {
            let combined_text = joiner::combine_text(&msg.token_texts, i, count);
            let combined_prob = joiner::combine_prob(&msg.token_probs, i, count);
            wip.push(SingleToken::new(combined_text, combined_prob));
            i += count - 1;
        } else if !text.is_empty() {
            wip.push(SingleToken::new(text.to_string(), msg.token_probs[i]));
        }

        i += 1;
    }

    if !wip.is_empty() {
        words.push(Word::from_tokens(wip));
    }

    Ok(words)
}

fn validate(msg: &TokenMessage) -> Result<()> {
    if msg.token_texts.len() != msg.token_probs.len() {
        return Err(ScrivenerError::TokenArrayMismatch {
            texts: msg.token_texts.len(),
            probs: msg.token_probs.len(),
        });
    }

    let segments = msg.segment_start_token_idxs.len();
    if msg.start_times.len() != segments || msg.end_times.len() != segments {
        return Err(ScrivenerError::SegmentTimesMismatch {
            segments,
            starts: msg.start_times.len(),
            ends: msg.end_times.len(),
        });
    }

    let mut previous = None;
    for (position, &index) in msg.segment_start_token_idxs.iter().enumerate() {
        if index >= msg.token_texts.len() {
            return Err(ScrivenerError::SegmentIndexOutOfRange {
                index,
                token_count: msg.token_texts.len(),
            });
        }
        if let Some(previous) = previous
            && index <= previous
        {
            return Err(ScrivenerError::SegmentIndexNotAscending { position, index });
        }
        previous = Some(index);
    }

    Ok(())
}

/// Inference marker tokens have the shape `[_XXX_]`.
fn is_special_token(text: &str) -> bool {
    text.starts_with("[_") && text.ends_with("_]")
}

/// A standalone punctuation token: a single punctuation character after
/// trimming. Currency symbols are excluded so they can join with a
/// following number instead.
fn is_punct_token(text: &str) -> bool {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_ascii_punctuation() && !matches!(c, '$'),
        _ => false,
    }
}
