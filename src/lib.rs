//! Streaming chat core for a preschool learning companion.
//!
//! Sends a child's message to the conversational backend, consumes the
//! chunked reply stream, assembles it into a live-updating transcript,
//! and drives the typing indicator and optional speech playback.
pub mod backend;
pub mod chat;
pub mod cli;
pub mod core;
pub mod speech;
