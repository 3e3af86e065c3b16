//! rill-chat: conversation runtime for rill
//!
//! This crate owns the transcript and the turn state machine. A [`Controller`]
//! accepts user input, opens a completion stream through a
//! [`rill_ai::Gateway`], folds the decoded deltas into the pending assistant
//! turn and publishes every change as a transcript snapshot.

pub mod accumulator;
pub mod controller;
pub mod error;
pub mod events;
pub mod handle;
pub mod transcript;

pub use accumulator::{Accumulator, Progress};
pub use controller::{CANCELLED_MARKER, Controller, ControllerConfig, RejectReason, Submission};
pub use error::{Error, Result};
pub use events::ChatEvent;
pub use handle::{ChatHandle, Phase};
pub use transcript::{Transcript, TranscriptStore, Turn, TurnStatus};
