//! Serialized playback queue over a process-wide speech engine.
//!
//! The engine itself is a single shared resource, so all call sites go
//! through one queue instead of invoking it ad hoc. Playback is FIFO and
//! never overlaps: an utterance enqueued while another is speaking waits
//! its turn. `cancel_all` clears everything queued and stops the
//! utterance currently playing.
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Seam over the actual speech engine.
#[async_trait]
pub trait Synthesizer: Send + Sync + 'static {
    /// Speak `text` aloud, returning once playback has finished.
    async fn speak(&self, text: &str, language: &str) -> Result<()>;
}

struct Utterance {
    text: String,
    language: String,
    generation: u64,
}

struct Inner {
    tx: mpsc::UnboundedSender<Utterance>,
    generation: watch::Sender<u64>,
    worker: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Handle to the playback worker. Cheap to clone; the worker stops when
/// the last handle is dropped.
#[derive(Clone)]
pub struct SpeechQueue {
    inner: Arc<Inner>,
}

impl SpeechQueue {
    pub fn new(synthesizer: Arc<dyn Synthesizer>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (generation, generation_rx) = watch::channel(0u64);
        let worker = tokio::spawn(playback_loop(synthesizer, rx, generation_rx));

        Self {
            inner: Arc::new(Inner {
                tx,
                generation,
                worker,
            }),
        }
    }

    /// Queue one utterance for playback after everything already queued.
    pub fn enqueue(&self, text: &str, language: &str) {
        let utterance = Utterance {
            text: text.to_string(),
            language: language.to_string(),
            generation: *self.inner.generation.borrow(),
        };
        let _ = self.inner.tx.send(utterance);
    }

    /// Drop every queued utterance and stop the one currently playing.
    pub fn cancel_all(&self) {
        self.inner.generation.send_modify(|g| *g += 1);
    }
}

async fn playback_loop(
    synthesizer: Arc<dyn Synthesizer>,
    mut rx: mpsc::UnboundedReceiver<Utterance>,
    mut generation: watch::Receiver<u64>,
) {
    while let Some(utterance) = rx.recv().await {
        // Utterances queued before the last cancel_all are skipped
        if utterance.generation < *generation.borrow_and_update() {
            continue;
        }
        tokio::select! {
            result = synthesizer.speak(&utterance.text, &utterance.language) => {
                if let Err(e) = result {
                    tracing::warn!("Speech synthesis failed: {:#}", e);
                }
            }
            // cancel_all while speaking stops the current utterance
            _ = generation.changed() => {}
        }
    }
}
