//! The core models for an in-progress chat with the companion backend.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::Frame;

/// Child-safe text shown in place of a reply that failed to arrive.
pub const FALLBACK_REPLY: &str =
    "Oops! I got a little mixed up. Can you ask me that again?";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(role: Role, text: &str) -> Self {
        Self {
            role,
            text: text.to_string(),
        }
    }
}

/// Ordered, append-only message log plus the single mutable tail slot an
/// in-flight reply streams into.
///
/// While a reply is streaming, the last message is an assistant message
/// owned by exactly one session. Frames from any other session are
/// discarded, which is what makes cancellation safe: an aborted read loop
/// that limps on for a few more frames can no longer touch the log.
#[derive(Default)]
pub struct Transcript {
    messages: Vec<Message>,
    open_slot: Option<Uuid>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn open_slot(&self) -> Option<Uuid> {
        self.open_slot
    }

    /// Append the user's message and open an empty assistant slot owned
    /// by `session`. A slot left open by a superseded session is dropped
    /// first.
    pub fn begin_exchange(&mut self, session: Uuid, user_text: &str) {
        if let Some(stale) = self.open_slot {
            self.drop_slot(stale);
        }
        self.messages.push(Message::new(Role::User, user_text));
        self.messages.push(Message::new(Role::Assistant, ""));
        self.open_slot = Some(session);
    }

    /// Apply one decoded frame for `session`. Returns whether the
    /// transcript changed; frames for a session that does not own the
    /// open slot (stale, cancelled, or already closed) are no-ops.
    pub fn apply(&mut self, session: Uuid, frame: &Frame) -> bool {
        if self.open_slot != Some(session) {
            return false;
        }
        let slot = self
            .messages
            .last_mut()
            .expect("an open slot is always the last message");

        match frame {
            // Replace the tail text with prior text + delta
            Frame::Delta(content) => slot.text.push_str(content),
            Frame::Error(_) => {
                slot.text = FALLBACK_REPLY.to_string();
                self.open_slot = None;
            }
            Frame::End => self.open_slot = None,
        }
        true
    }

    /// Remove the open slot for a cancelled `session` without finalizing
    /// it. Returns whether anything was removed.
    pub fn drop_slot(&mut self, session: Uuid) -> bool {
        if self.open_slot != Some(session) {
            return false;
        }
        self.open_slot = None;
        self.messages.pop();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_slot_invariant(transcript: &Transcript) {
        // At most one open slot, and it is always the last message
        if transcript.open_slot().is_some() {
            let last = transcript.messages.last().expect("slot but no messages");
            assert_eq!(last.role, Role::Assistant);
        }
    }

    #[test]
    fn test_begin_exchange_opens_empty_slot() {
        let mut transcript = Transcript::new();
        let session = Uuid::new_v4();
        transcript.begin_exchange(session, "Hi");

        let messages = transcript.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::new(Role::User, "Hi"));
        assert_eq!(messages[1], Message::new(Role::Assistant, ""));
        assert_eq!(transcript.open_slot(), Some(session));
        assert_slot_invariant(&transcript);
    }

    #[test]
    fn test_deltas_concatenate_in_place() {
        let mut transcript = Transcript::new();
        let session = Uuid::new_v4();
        transcript.begin_exchange(session, "Say hello");

        for delta in ["Hel", "lo ", "world"] {
            assert!(transcript.apply(session, &Frame::Delta(delta.to_string())));
            assert_slot_invariant(&transcript);
        }
        assert!(transcript.apply(session, &Frame::End));

        let messages = transcript.messages();
        // Replaced in place, not appended as new messages
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "Hello world");
        assert_eq!(transcript.open_slot(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut transcript = Transcript::new();
        let session = Uuid::new_v4();
        transcript.begin_exchange(session, "Hi");
        transcript.apply(session, &Frame::Delta("done".to_string()));
        assert!(transcript.apply(session, &Frame::End));

        let before = transcript.messages();
        // A duplicate end frame must not mutate anything further
        assert!(!transcript.apply(session, &Frame::End));
        assert!(!transcript.apply(session, &Frame::Delta("late".to_string())));
        assert_eq!(transcript.messages(), before);
    }

    #[test]
    fn test_error_frame_replaces_reply_with_fallback() {
        let mut transcript = Transcript::new();
        let session = Uuid::new_v4();
        transcript.begin_exchange(session, "Hi");
        transcript.apply(session, &Frame::Delta("partial".to_string()));
        assert!(transcript.apply(session, &Frame::Error("boom".to_string())));

        let messages = transcript.messages();
        assert_eq!(messages[1].text, FALLBACK_REPLY);
        assert_eq!(transcript.open_slot(), None);
    }

    #[test]
    fn test_stale_session_frames_are_discarded() {
        let mut transcript = Transcript::new();
        let old_session = Uuid::new_v4();
        let new_session = Uuid::new_v4();
        transcript.begin_exchange(old_session, "A");
        transcript.begin_exchange(new_session, "B");

        // The old session's slot was dropped when the new one opened
        assert!(!transcript.apply(old_session, &Frame::Delta("stale".to_string())));
        assert!(transcript.apply(new_session, &Frame::Delta("fresh".to_string())));

        let messages = transcript.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::new(Role::User, "A"));
        assert_eq!(messages[1], Message::new(Role::User, "B"));
        assert_eq!(messages[2].text, "fresh");
        assert_slot_invariant(&transcript);
    }

    #[test]
    fn test_drop_slot_removes_pending_reply_only() {
        let mut transcript = Transcript::new();
        let session = Uuid::new_v4();
        transcript.begin_exchange(session, "Hi");
        transcript.apply(session, &Frame::Delta("part".to_string()));

        assert!(transcript.drop_slot(session));
        let messages = transcript.messages();
        assert_eq!(messages, vec![Message::new(Role::User, "Hi")]);
        assert_eq!(transcript.open_slot(), None);

        // Dropping again is a no-op
        assert!(!transcript.drop_slot(session));
        assert_eq!(transcript.messages().len(), 1);
    }

    #[test]
    fn test_end_with_no_deltas_keeps_empty_message() {
        let mut transcript = Transcript::new();
        let session = Uuid::new_v4();
        transcript.begin_exchange(session, "Hi");
        assert!(transcript.apply(session, &Frame::End));

        // The accumulator never silently deletes a finalized message
        let messages = transcript.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "");
    }
}
