//! Long-running inference sessions.
//!
//! An alternative consumer of the ingress ring: instead of merging, a
//! session streams back the raw concatenation of each drained batch as
//! numbered feedback until its deadline passes or it is cancelled. Exactly
//! one ring consumer may be active at a time, so a session never co-runs
//! with the merge driver.

use crate::stream::ring::UpdateRing;
use crate::transcript::word::Word;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Default ring polling interval while waiting for data.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(15);

/// Request parameters for a session.
#[derive(Debug, Clone, Copy)]
pub struct InferenceGoal {
    /// Hard deadline measured from session start.
    pub max_duration: Duration,
}

/// One feedback batch streamed to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceFeedback {
    pub batch_idx: u32,
    pub transcription: String,
}

/// Why a session ended. Every reason is a successful terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    TimedOut,
    Cancelled,
    ShutDown,
}

impl SessionEnd {
    fn info(self) -> &'static str {
        match self {
            SessionEnd::TimedOut => "Inference timed out.",
            SessionEnd::Cancelled => "Inference cancelled.",
            SessionEnd::ShutDown => "Inference shut down.",
        }
    }
}

/// Terminal result: everything streamed, plus the end reason.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutcome {
    pub transcriptions: Vec<String>,
    pub end: SessionEnd,
    pub info: String,
}

/// Deadline-bounded feedback consumer over the ingress ring.
#[derive(Clone)]
pub struct InferenceSession {
    ring: Arc<UpdateRing<Vec<Word>>>,
    poll_interval: Duration,
}

impl InferenceSession {
    pub fn new(ring: Arc<UpdateRing<Vec<Word>>>) -> Self {
        Self {
            ring,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs the session to completion.
    ///
    /// Deadline, cancellation, and shutdown are all checked at least once
    /// per polling iteration. Feedback already streamed is retained in the
    /// outcome whatever the end reason.
    pub async fn run(
        self,
        goal: InferenceGoal,
        feedback: mpsc::Sender<InferenceFeedback>,
        cancel: Arc<AtomicBool>,
        shutdown: Arc<AtomicBool>,
    ) -> InferenceOutcome {
        let deadline = Instant::now() + goal.max_duration;
        let mut transcriptions = Vec::new();
        let mut batch_idx = 0u32;

        loop {
            // Wait for data, re-checking every exit condition per poll.
            let end = loop {
                if Instant::now() >= deadline {
                    break Some(SessionEnd::TimedOut);
                }
                if cancel.load(Ordering::SeqCst) {
                    break Some(SessionEnd::Cancelled);
                }
                if shutdown.load(Ordering::SeqCst) {
                    break Some(SessionEnd::ShutDown);
                }
                if !self.ring.is_empty() {
                    break None;
                }
                tokio::time::sleep(self.poll_interval).await;
            };

            if let Some(end) = end {
                return InferenceOutcome {
                    transcriptions,
                    end,
                    info: end.info().to_string(),
                };
            }

            let mut message = String::new();
            while let Some(words) = self.ring.dequeue() {
                for word in &words {
                    if !word.is_segment() {
                        message.push_str(word.text());
                    }
                }
            }

            let _ = feedback
                .send(InferenceFeedback {
                    batch_idx,
                    transcription: message.clone(),
                })
                .await;
            transcriptions.push(message);
            batch_idx += 1;
        }
    }
}
