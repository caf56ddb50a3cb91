pub mod models;
pub mod session;

pub use crate::backend::SendMeta;
pub use models::{FALLBACK_REPLY, Message, Role, Transcript};
pub use session::{ChatSession, ChatSessionBuilder, SessionState};
