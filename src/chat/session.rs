//! Session lifecycle around one streaming exchange with the backend.
//!
//! `send` opens an exchange and spawns a read loop that decodes the
//! reply stream and folds it into the transcript. Callers observe the
//! transcript and the session state reactively through `watch`
//! channels. A second send while a reply is still streaming cancels the
//! first exchange and replaces it; the transcript's session keying makes
//! sure a cancelled loop can never corrupt the newer exchange.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::{Backend, Frame, FrameDecoder, SendMeta};
use crate::chat::models::{Message, Transcript};
use crate::speech::SpeechQueue;

/// Where the session is in its lifecycle, for rendering a typing
/// indicator. `Sending` covers the window before the first byte
/// arrives; `Streaming` starts at the first delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    Streaming,
    Error,
}

struct Shared {
    transcript: Mutex<Transcript>,
    transcript_tx: watch::Sender<Vec<Message>>,
    state_tx: watch::Sender<SessionState>,
}

impl Shared {
    async fn publish(&self) {
        let snapshot = self.transcript.lock().await.messages();
        let _ = self.transcript_tx.send_replace(snapshot);
    }
}

/// A stateful chat with the companion backend.
///
/// Use `ChatSession::builder()` to construct one.
pub struct ChatSession {
    backend: Backend,
    meta: SendMeta,
    speech: Option<SpeechQueue>,
    shared: Arc<Shared>,
    current: Option<(Uuid, JoinHandle<()>)>,
}

impl ChatSession {
    pub fn builder(backend_url: &str, child_name: &str, language: &str) -> ChatSessionBuilder {
        ChatSessionBuilder::new(backend_url, child_name, language)
    }

    /// Read-only reactive view of the message log, notified on every
    /// mutation.
    pub fn transcript(&self) -> watch::Receiver<Vec<Message>> {
        self.shared.transcript_tx.subscribe()
    }

    /// Read-only reactive view of the session state.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Current transcript snapshot.
    pub async fn messages(&self) -> Vec<Message> {
        self.shared.transcript.lock().await.messages()
    }

    /// Send one message to the backend and start streaming the reply
    /// into the transcript, using the metadata the session was built
    /// with. Empty input (after trimming) is a no-op. A send while a
    /// prior exchange is in flight cancels and replaces it.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        let meta = self.meta.clone();
        self.send_with_meta(text, meta).await
    }

    /// Like [`send`](Self::send) but with explicit participant metadata
    /// for this message.
    pub async fn send_with_meta(&mut self, text: &str, meta: SendMeta) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        self.cancel().await;

        let session = Uuid::new_v4();
        self.shared
            .transcript
            .lock()
            .await
            .begin_exchange(session, text);
        self.shared.publish().await;
        let _ = self.shared.state_tx.send_replace(SessionState::Sending);

        let handle = tokio::spawn(run_exchange(
            self.shared.clone(),
            self.backend.clone(),
            meta,
            self.speech.clone(),
            session,
            text.to_string(),
        ));
        self.current = Some((session, handle));
        Ok(())
    }

    /// Stop the in-flight exchange, if any. The pending reply is
    /// removed from the transcript, not finalized, and the state
    /// returns to `Idle`.
    pub async fn cancel(&mut self) {
        let Some((session, handle)) = self.current.take() else {
            return;
        };
        handle.abort();

        let dropped = self.shared.transcript.lock().await.drop_slot(session);
        if dropped {
            self.shared.publish().await;
        }
        let _ = self.shared.state_tx.send_replace(SessionState::Idle);
    }
}

async fn run_exchange(
    shared: Arc<Shared>,
    backend: Backend,
    meta: SendMeta,
    speech: Option<SpeechQueue>,
    session: Uuid,
    text: String,
) {
    let response = match backend.open(&text, &meta).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Chat request failed: {:#}", e);
            finalize_failure(&shared, session).await;
            return;
        }
    };

    let mut stream = response.bytes_stream();
    let mut decoder = FrameDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("Chat stream interrupted: {:#}", e);
                finalize_failure(&shared, session).await;
                return;
            }
        };
        let chunk = match std::str::from_utf8(&chunk) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("Chat stream sent invalid UTF-8: {}", e);
                finalize_failure(&shared, session).await;
                return;
            }
        };

        for frame in decoder.push_chunk(chunk) {
            match frame {
                Frame::Delta(_) => apply_delta(&shared, session, &frame).await,
                Frame::Error(reason) => {
                    tracing::warn!("Chat backend reported an error: {}", reason);
                    finalize_failure(&shared, session).await;
                    return;
                }
                Frame::End => {
                    finalize_reply(&shared, speech.as_ref(), &meta, session).await;
                    return;
                }
            }
        }
    }

    // The wire has no terminator sentinel; body closure is the end
    for frame in decoder.finish() {
        match frame {
            Frame::Delta(_) => apply_delta(&shared, session, &frame).await,
            Frame::Error(reason) => {
                tracing::warn!("Chat backend reported an error: {}", reason);
                finalize_failure(&shared, session).await;
                return;
            }
            Frame::End => {
                finalize_reply(&shared, speech.as_ref(), &meta, session).await;
                return;
            }
        }
    }
}

async fn apply_delta(shared: &Shared, session: Uuid, frame: &Frame) {
    let applied = shared.transcript.lock().await.apply(session, frame);
    if !applied {
        return;
    }
    shared.publish().await;

    // First delta moves the indicator from "working" to "receiving"
    if *shared.state_tx.borrow() == SessionState::Sending {
        let _ = shared.state_tx.send_replace(SessionState::Streaming);
    }
}

async fn finalize_failure(shared: &Shared, session: Uuid) {
    let applied = shared
        .transcript
        .lock()
        .await
        .apply(session, &Frame::Error("request failed".to_string()));
    if !applied {
        return;
    }
    shared.publish().await;
    let _ = shared.state_tx.send_replace(SessionState::Error);
    let _ = shared.state_tx.send_replace(SessionState::Idle);
}

async fn finalize_reply(
    shared: &Shared,
    speech: Option<&SpeechQueue>,
    meta: &SendMeta,
    session: Uuid,
) {
    let reply = {
        let mut transcript = shared.transcript.lock().await;
        if !transcript.apply(session, &Frame::End) {
            return;
        }
        transcript.messages().last().cloned()
    };
    shared.publish().await;
    let _ = shared.state_tx.send_replace(SessionState::Idle);

    if let (Some(queue), Some(reply)) = (speech, reply) {
        if !reply.text.is_empty() {
            queue.enqueue(&reply.text, &meta.language);
        }
    }
}

pub struct ChatSessionBuilder {
    backend_url: String,
    child_name: String,
    language: String,
    timeout: Option<Duration>,
    speech: Option<SpeechQueue>,
}

impl ChatSessionBuilder {
    pub fn new(backend_url: &str, child_name: &str, language: &str) -> Self {
        Self {
            backend_url: backend_url.to_string(),
            child_name: child_name.to_string(),
            language: language.to_string(),
            timeout: None,
            speech: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Speak each finalized reply through the given queue.
    pub fn speech(mut self, queue: SpeechQueue) -> Self {
        self.speech = Some(queue);
        self
    }

    pub fn build(self) -> ChatSession {
        let mut backend = Backend::new(&self.backend_url);
        if let Some(timeout) = self.timeout {
            backend = backend.with_timeout(timeout);
        }
        let (transcript_tx, _) = watch::channel(Vec::new());
        let (state_tx, _) = watch::channel(SessionState::Idle);

        ChatSession {
            backend,
            meta: SendMeta {
                child_name: self.child_name,
                language: self.language,
            },
            speech: self.speech,
            shared: Arc::new(Shared {
                transcript: Mutex::new(Transcript::new()),
                transcript_tx,
                state_tx,
            }),
            current: None,
        }
    }
}
