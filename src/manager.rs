//! Transcript manager facade.
//!
//! Ties the ingest path (deserialize, enqueue, saturation warning) to the
//! merge driver and inference sessions, and arbitrates the ring's
//! single-consumer rule: the driver and a session never run at once.

use crate::config::Config;
use crate::error::{Result, ScrivenerError};
use crate::stream::driver::{DriverHandle, MergeDriver};
use crate::stream::report::{ErrorReporter, LogReporter, MergeEvent, WarnThrottle};
use crate::stream::ring::UpdateRing;
use crate::stream::session::{InferenceFeedback, InferenceGoal, InferenceOutcome, InferenceSession};
use crate::tokens::deserializer::deserialize_tokens;
use crate::tokens::message::{AudioTranscript, TokenMessage};
use crate::transcript::merge::MergeConfig;
use crate::transcript::store::Transcript;
use crate::transcript::word::Word;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Producer-facing front of the merge pipeline.
pub struct TranscriptManager {
    ring: Arc<UpdateRing<Vec<Word>>>,
    publisher: broadcast::Sender<AudioTranscript>,
    reporter: Arc<dyn ErrorReporter>,
    throttle: WarnThrottle,
    merge_config: MergeConfig,
    driver_interval: Duration,
    session_poll: Duration,
    driver: Mutex<Option<DriverHandle>>,
    /// The ring has exactly one consumer at a time: the driver or a session.
    consumer_active: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl TranscriptManager {
    pub fn new(config: &Config) -> Self {
        let (publisher, _) = broadcast::channel(16);
        Self {
            ring: Arc::new(UpdateRing::new(config.ring.capacity)),
            publisher,
            reporter: Arc::new(LogReporter),
            throttle: WarnThrottle::new(Duration::from_secs(config.ring.warn_interval_secs)),
            merge_config: MergeConfig {
                allowed_gaps: config.merge.allowed_gaps,
                prune_threshold: config.merge.prune_threshold,
                decrement_on_conflict: config.merge.decrement_on_conflict,
                revise_leading_gap: config.merge.revise_leading_gap,
            },
            driver_interval: Duration::from_millis(config.driver.interval_ms),
            session_poll: Duration::from_millis(config.session.poll_interval_ms),
            driver: Mutex::new(None),
            consumer_active: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets a custom error reporter. Call before starting the driver.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Ingests one raw token message.
    ///
    /// Never fails and never blocks on merge work: malformed messages are
    /// reported and dropped, and ring saturation only costs the oldest
    /// pending batch plus a throttled warning.
    pub fn handle_tokens(&self, msg: &TokenMessage) {
        let words = match deserialize_tokens(msg) {
            Ok(words) => words,
            Err(e) => {
                self.reporter.report(
                    "ingest",
                    &MergeEvent::Recoverable(format!("dropping malformed update: {}", e)),
                );
                return;
            }
        };
        if words.is_empty() {
            return;
        }

        self.ring.enqueue(words);
        if self.ring.almost_full() && self.throttle.should_warn() {
            self.reporter.report(
                "ingest",
                &MergeEvent::Recoverable(
                    "transcription buffer full, dropping oldest data".to_string(),
                ),
            );
        }
    }

    /// Subscribes to transcript snapshots published after merge cycles.
    pub fn subscribe(&self) -> broadcast::Receiver<AudioTranscript> {
        self.publisher.subscribe()
    }

    /// Starts the periodic merge driver.
    pub fn start(&self) -> Result<()> {
        if self.consumer_active.swap(true, Ordering::SeqCst) {
            return Err(ScrivenerError::Other(
                "a ring consumer is already active".to_string(),
            ));
        }

        let driver = MergeDriver::new(self.ring.clone(), self.publisher.clone())
            .with_merge_config(self.merge_config.clone())
            .with_reporter(self.reporter.clone())
            .with_interval(self.driver_interval);
        *self.driver.lock().unwrap() = Some(driver.spawn());
        Ok(())
    }

    /// Stops the driver and returns the final transcript.
    ///
    /// Returns an empty transcript if the driver was never started.
    pub async fn stop(&self) -> Transcript {
        self.shutdown.store(true, Ordering::SeqCst);
        let handle = self.driver.lock().unwrap().take();
        match handle {
            Some(handle) => {
                let transcript = handle.stop().await;
                self.consumer_active.store(false, Ordering::SeqCst);
                transcript
            }
            None => Transcript::new(),
        }
    }

    /// Runs a long-running inference session as the sole ring consumer.
    ///
    /// Fails if the driver (or another session) is active.
    pub async fn run_inference(
        &self,
        goal: InferenceGoal,
        feedback: mpsc::Sender<InferenceFeedback>,
        cancel: Arc<AtomicBool>,
    ) -> Result<InferenceOutcome> {
        if self.consumer_active.swap(true, Ordering::SeqCst) {
            return Err(ScrivenerError::Other(
                "a ring consumer is already active".to_string(),
            ));
        }

        let session =
            InferenceSession::new(self.ring.clone()).with_poll_interval(self.session_poll);
        let outcome = session
            .run(goal, feedback, cancel, self.shutdown.clone())
            .await;
        self.consumer_active.store(false, Ordering::SeqCst);
        Ok(outcome)
    }

    /// Number of updates waiting in the ring.
    pub fn pending_updates(&self) -> usize {
        self.ring.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::time::timeout;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.driver.interval_ms = 10;
        config
    }

    fn tokens(texts: &[&str], stamp_ms: i64) -> TokenMessage {
        TokenMessage {
            stamp_ms,
            inference_duration_ms: 40,
            token_texts: texts.iter().map(|s| s.to_string()).collect(),
            token_probs: vec![0.9; texts.len()],
            segment_start_token_idxs: vec![],
            start_times: vec![],
            end_times: vec![],
        }
    }

    #[derive(Default)]
    struct CollectingReporter {
        events: StdMutex<Vec<(String, String)>>,
    }

    impl ErrorReporter for CollectingReporter {
        fn report(&self, component: &str, event: &MergeEvent) {
            self.events
                .lock()
                .unwrap()
                .push((component.to_string(), event.to_string()));
        }
    }

    #[test]
    fn test_handle_tokens_enqueues() {
        let manager = TranscriptManager::new(&test_config());
        manager.handle_tokens(&tokens(&[" hello", " world"], 0));
        assert_eq!(manager.pending_updates(), 1);
    }

    #[test]
    fn test_malformed_message_dropped_with_warning() {
        let reporter = Arc::new(CollectingReporter::default());
        let manager = TranscriptManager::new(&test_config()).with_reporter(reporter.clone());

        let mut msg = tokens(&[" hello"], 0);
        msg.token_probs.clear();
        manager.handle_tokens(&msg);

        assert_eq!(manager.pending_updates(), 0);
        let events = reporter.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "ingest");
        assert!(events[0].1.contains("malformed"));
    }

    #[test]
    fn test_saturation_warning_is_throttled() {
        let reporter = Arc::new(CollectingReporter::default());
        let manager = TranscriptManager::new(&test_config()).with_reporter(reporter.clone());

        for i in 0..20 {
            manager.handle_tokens(&tokens(&[" word"], i));
        }

        // The ring saturates but the producer path never fails; one
        // throttled warning covers the burst.
        let events = reporter.events.lock().unwrap();
        let saturation: Vec<_> = events.iter().filter(|e| e.1.contains("buffer full")).collect();
        assert_eq!(saturation.len(), 1);
    }

    #[tokio::test]
    async fn test_start_merge_publish_stop() {
        let manager = TranscriptManager::new(&test_config());
        let mut rx = manager.subscribe();

        manager.handle_tokens(&tokens(&[" the", " quick"], 0));
        manager.start().unwrap();

        let snapshot = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("driver must publish")
            .unwrap();
        assert_eq!(snapshot.words, vec![" the", " quick"]);

        manager.handle_tokens(&tokens(&[" the", " quick", " brown"], 100));
        let snapshot = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("second cycle must publish")
            .unwrap();
        assert_eq!(snapshot.words, vec![" the", " quick", " brown"]);
        assert_eq!(snapshot.occ, vec![2, 2, 1]);

        let transcript = manager.stop().await;
        assert_eq!(transcript.len(), 3);
    }

    #[tokio::test]
    async fn test_second_consumer_rejected() {
        let manager = TranscriptManager::new(&test_config());
        manager.start().unwrap();

        assert!(manager.start().is_err());

        let (tx, _rx) = mpsc::channel(4);
        let result = manager
            .run_inference(
                InferenceGoal {
                    max_duration: Duration::from_millis(10),
                },
                tx,
                Arc::new(AtomicBool::new(false)),
            )
            .await;
        assert!(result.is_err());

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_inference_session_via_manager() {
        let manager = TranscriptManager::new(&test_config());
        manager.handle_tokens(&tokens(&[" streamed", " words"], 0));

        let (tx, mut rx) = mpsc::channel(4);
        let outcome = manager
            .run_inference(
                InferenceGoal {
                    max_duration: Duration::from_millis(50),
                },
                tx,
                Arc::new(AtomicBool::new(false)),
            )
            .await
            .unwrap();

        assert_eq!(outcome.transcriptions, vec![" streamed words"]);
        assert_eq!(rx.recv().await.unwrap().transcription, " streamed words");

        // The session released the ring; the driver can start now.
        manager.start().unwrap();
        manager.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_start_returns_empty() {
        let manager = TranscriptManager::new(&test_config());
        let transcript = manager.stop().await;
        assert!(transcript.is_empty());
    }
}
