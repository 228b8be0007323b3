pub mod core;
pub use self::core::{
    CompletionRequest, Message, Role, completion_stream, latest_user_message, with_system_context,
};

pub mod relay;
pub use relay::{FrameDecoder, RelayState, relay_response, relay_stream};
