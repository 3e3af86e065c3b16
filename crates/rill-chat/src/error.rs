//! Error types for rill-chat

use thiserror::Error;

/// Result type alias using rill-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a conversation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An error from the request/stream layer
    #[error(transparent)]
    Ai(#[from] rill_ai::Error),

    /// A turn is already in flight
    #[error("a reply is still being generated")]
    TurnInFlight,
}
