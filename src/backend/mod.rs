pub mod decoder;
pub mod transport;

pub use decoder::{Frame, FrameDecoder};
pub use transport::{Backend, SendMeta};
