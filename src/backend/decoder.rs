//! Decodes the backend's chunked reply stream into typed frames.
//!
//! The body is newline-delimited UTF-8 text. Each meaningful line starts
//! with the `data:` marker followed by a JSON payload carrying either a
//! `content` delta or a terminal `error`. Stream end has no sentinel on
//! the wire, so `finish` synthesizes an explicit [`Frame::End`] when the
//! body closes.
use serde::Deserialize;

const EVENT_MARKER: &str = "data:";

/// One decoded unit of the reply stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// An incremental fragment of assistant reply text.
    Delta(String),
    /// A terminal error reported by the backend.
    Error(String),
    /// End of the reply stream.
    End,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventPayload {
    Delta { content: String },
    Error { error: String },
}

/// Incremental line decoder for the reply stream.
///
/// A single event line may be split across two chunks and one chunk may
/// carry zero, one, or many lines. The decoder keeps the unterminated
/// trailing line of each chunk and prepends it to the next chunk before
/// splitting, so only fully terminated lines are ever parsed.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every complete line in `chunk`, in order. Partial trailing
    /// data is retained for the next call.
    pub fn push_chunk(&mut self, chunk: &str) -> Vec<Frame> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].to_string();
            self.buffer.drain(..=line_end);
            if let Some(frame) = Self::decode_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Consume the decoder once the body has closed. Decodes any final
    /// unterminated line and appends the synthesized [`Frame::End`].
    pub fn finish(mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        if let Some(frame) = Self::decode_line(&rest) {
            frames.push(frame);
        }
        frames.push(Frame::End);
        frames
    }

    fn decode_line(line: &str) -> Option<Frame> {
        // Blank lines and lines without the event marker are ignored
        let line = line.trim_end_matches('\r');
        let payload = line.strip_prefix(EVENT_MARKER)?.trim();
        if payload.is_empty() {
            return None;
        }

        match serde_json::from_str::<EventPayload>(payload) {
            Ok(EventPayload::Delta { content }) => Some(Frame::Delta(content)),
            Ok(EventPayload::Error { error }) => Some(Frame::Error(error)),
            Err(e) => {
                // A malformed line is dropped; it does not abort the stream
                tracing::warn!("Skipping malformed event line {:?}: {}", payload, e);
                None
            }
        }
    }
}
