//! Wire messages at the manager boundary.
//!
//! `TokenMessage` is what the inference engine emits for each audio window;
//! `AudioTranscript` is the serialized transcript published after every
//! non-empty merge cycle.

use crate::transcript::store::Transcript;
use crate::transcript::word::Word;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Raw inference output for one audio window.
///
/// `token_texts` and `token_probs` are parallel. Segment timestamps are in
/// units of 10 ms relative to the window start; `stamp_ms` is the
/// wall-clock start of the window in epoch milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenMessage {
    pub stamp_ms: i64,
    #[serde(default)]
    pub inference_duration_ms: i64,
    pub token_texts: Vec<String>,
    pub token_probs: Vec<f32>,
    pub segment_start_token_idxs: Vec<usize>,
    pub start_times: Vec<i64>,
    pub end_times: Vec<i64>,
}

impl TokenMessage {
    /// Wall-clock start of the audio window.
    pub fn audio_start(&self) -> SystemTime {
        if self.stamp_ms >= 0 {
            SystemTime::UNIX_EPOCH + Duration::from_millis(self.stamp_ms as u64)
        } else {
            SystemTime::UNIX_EPOCH
        }
    }
}

/// Serialized transcript snapshot.
///
/// One `words`/`probs`/`occ` triple per text word, in transcript order;
/// segments are carried separately as `(seg_start_words_id, seg_start_time,
/// seg_duration_ms)` triples, where `seg_start_words_id` is the index into
/// `words` at which the segment begins. `active_index` is the stale
/// boundary translated into word-index space.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioTranscript {
    pub words: Vec<String>,
    pub probs: Vec<f32>,
    pub occ: Vec<i32>,
    pub seg_start_words_id: Vec<usize>,
    /// Segment start times in epoch milliseconds.
    pub seg_start_time: Vec<i64>,
    pub seg_duration_ms: Vec<u64>,
    pub active_index: i64,
}

impl AudioTranscript {
    /// Serializes the full transcript, committed prefix included.
    pub fn from_transcript(transcript: &Transcript) -> Self {
        let mut msg = AudioTranscript::default();
        let mut segments_before_stale = 0usize;

        for (index, word) in transcript.words().enumerate() {
            match word {
                Word::Segment(segment) => {
                    msg.seg_start_words_id.push(msg.words.len());
                    msg.seg_start_time.push(epoch_ms(segment.start()));
                    msg.seg_duration_ms.push(segment.duration().as_millis() as u64);
                    if index < transcript.stale_word_id() {
                        segments_before_stale += 1;
                    }
                }
                Word::Text(_) => {
                    msg.words.push(word.text().to_string());
                    msg.probs.push(word.prob());
                    msg.occ.push(word.occurrences());
                }
            }
        }

        msg.active_index = transcript.stale_word_id() as i64 - segments_before_stale as i64;
        msg
    }
}

fn epoch_ms(time: SystemTime) -> i64 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}
