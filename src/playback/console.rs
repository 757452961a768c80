//! Device-free playback backend for the demo binary.
//!
//! [`ConsolePlayback`] "speaks" by printing the reply and sleeping for a
//! duration proportional to its word count, so the coordinator observes the
//! same started → (pause) → ended rhythm a real synthesis engine produces.
//! Cancellation works the way it does on real devices: a superseded
//! utterance simply never reports `Ended`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::PlaybackConfig;

use super::{PlaybackError, PlaybackEvent, SpeechPlayback};

/// Simulated speaking rate, per word, at rate 1.0.
const MS_PER_WORD: u64 = 120;
/// Upper bound on simulated playback time.
const MAX_UTTERANCE_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// ConsolePlayback
// ---------------------------------------------------------------------------

/// Console-printing [`SpeechPlayback`] implementation.
pub struct ConsolePlayback {
    /// Identifier of the most recent utterance.  Bumping it (via `speak` or
    /// `cancel`) orphans the sleeping task of any earlier utterance, which
    /// then exits without emitting `Ended`.
    current: Arc<AtomicU64>,
    /// When muted the reply is neither printed nor paced; the utterance
    /// completes immediately.
    enabled: bool,
    /// Speaking-rate multiplier; higher is faster.
    rate: f32,
}

impl ConsolePlayback {
    pub fn new() -> Self {
        Self {
            current: Arc::new(AtomicU64::new(0)),
            enabled: true,
            rate: 1.0,
        }
    }

    /// Build from application config.  A non-positive rate falls back to
    /// normal speed.
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            current: Arc::new(AtomicU64::new(0)),
            enabled: config.enabled,
            rate: if config.rate > 0.0 { config.rate } else { 1.0 },
        }
    }

    fn utterance_duration(&self, text: &str) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let words = text.split_whitespace().count() as u64;
        let ms = ((words * MS_PER_WORD) as f32 / self.rate) as u64;
        Duration::from_millis(ms.min(MAX_UTTERANCE_MS))
    }
}

impl Default for ConsolePlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechPlayback for ConsolePlayback {
    fn speak(
        &self,
        text: &str,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Result<(), PlaybackError> {
        let utterance = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let duration = self.utterance_duration(text);

        if self.enabled {
            println!("🗣️  {text}");
        }

        let current = Arc::clone(&self.current);
        let _ = events.send(PlaybackEvent::Started);

        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // Only the utterance that is still current gets to finish.
            if current.load(Ordering::SeqCst) == utterance {
                let _ = events.send(PlaybackEvent::Ended);
            } else {
                log::debug!("console-playback: utterance {utterance} superseded, no Ended");
            }
        });

        Ok(())
    }

    fn cancel(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
