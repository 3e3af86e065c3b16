//! rill-ai: streaming chat-completions client
//!
//! This crate turns a chunked server-sent-event response from an
//! OpenAI-compatible endpoint into a sequence of text deltas, and provides the
//! gateway that opens such a response.

pub mod error;
pub mod models;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use providers::{Gateway, GatewayStream};
pub use stream::{
    ByteStream, DecoderConfig, DeltaEvent, DeltaStream, FragmentExtractor, OpenAiDeltaExtractor,
    PointerExtractor, StreamDecoder, decode_stream,
};
pub use types::*;
