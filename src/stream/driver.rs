//! Periodic merge driver: the single consumer of the ingress ring.
//!
//! Each cycle drains the ring in FIFO order, merges every batch into the
//! transcript, and publishes a serialized snapshot if anything was merged.
//! Merging runs to completion between ticks; the transcript is owned by the
//! driver task and never shared with producers.

use crate::error::Result;
use crate::stream::report::{ErrorReporter, LogReporter, MergeEvent};
use crate::stream::ring::UpdateRing;
use crate::tokens::message::AudioTranscript;
use crate::transcript::merge::{MergeConfig, merge_update};
use crate::transcript::store::Transcript;
use crate::transcript::word::Word;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Default time between merge cycles.
pub const DEFAULT_DRIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Consumes update batches from the ring and maintains the transcript.
pub struct MergeDriver {
    ring: Arc<UpdateRing<Vec<Word>>>,
    publisher: broadcast::Sender<AudioTranscript>,
    transcript: Transcript,
    merge_config: MergeConfig,
    reporter: Arc<dyn ErrorReporter>,
    interval: Duration,
}

impl MergeDriver {
    /// Creates a driver consuming `ring` and publishing on `publisher`.
    pub fn new(
        ring: Arc<UpdateRing<Vec<Word>>>,
        publisher: broadcast::Sender<AudioTranscript>,
    ) -> Self {
        Self {
            ring,
            publisher,
            transcript: Transcript::new(),
            merge_config: MergeConfig::default(),
            reporter: Arc::new(LogReporter),
            interval: DEFAULT_DRIVE_INTERVAL,
        }
    }

    /// Sets the merge configuration.
    pub fn with_merge_config(mut self, config: MergeConfig) -> Self {
        self.merge_config = config;
        self
    }

    /// Sets a custom error reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Sets the interval between merge cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs one merge cycle: drain, merge, serialize.
    ///
    /// Returns a snapshot when at least one batch was merged.
    pub fn cycle(&mut self) -> Result<Option<AudioTranscript>> {
        let mut merged = false;
        while let Some(words) = self.ring.dequeue() {
            merge_update(&mut self.transcript, words, &self.merge_config)?;
            merged = true;
        }

        if merged {
            Ok(Some(AudioTranscript::from_transcript(&self.transcript)))
        } else {
            Ok(None)
        }
    }

    /// Spawns the periodic consumer task.
    pub fn spawn(mut self) -> DriverHandle {
        let running = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(tokio::sync::Notify::new());
        let flag = running.clone();
        let stopped = stop.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            let mut healthy = true;
            while healthy && flag.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = ticker.tick() => {
                        healthy = self.drive_once();
                    }
                    _ = stopped.notified() => break,
                }
            }

            // Final drain so a graceful stop does not strand pending batches.
            if healthy {
                self.drive_once();
            }
            self.transcript
        });

        DriverHandle {
            running,
            stop,
            handle,
        }
    }

    /// Returns false when the driver must stop.
    fn drive_once(&mut self) -> bool {
        match self.cycle() {
            Ok(Some(snapshot)) => {
                // Send fails only when nobody is subscribed; that is fine.
                let _ = self.publisher.send(snapshot);
                true
            }
            Ok(None) => true,
            Err(e) if e.is_fatal() => {
                self.reporter
                    .report("merge-driver", &MergeEvent::Fatal(e.to_string()));
                false
            }
            Err(e) => {
                self.reporter
                    .report("merge-driver", &MergeEvent::Recoverable(e.to_string()));
                true
            }
        }
    }
}

/// Handle to a running merge driver.
pub struct DriverHandle {
    running: Arc<AtomicBool>,
    stop: Arc<tokio::sync::Notify>,
    handle: JoinHandle<Transcript>,
}

impl DriverHandle {
    /// Stops the driver after its current cycle and returns the final
    /// transcript, pending batches included.
    pub async fn stop(self) -> Transcript {
        self.running.store(false, Ordering::SeqCst);
        self.stop.notify_one();
        self.handle.await.unwrap_or_default()
    }

    /// Returns true if the driver has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
