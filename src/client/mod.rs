pub mod consumer;
pub use consumer::{Reconstruction, consume, join, stream_chat};
