//! Chat event types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transcript::Turn;

/// Events emitted while a turn runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// User input accepted, placeholder created
    TurnStart { turn_id: Uuid },

    /// Request handed to the gateway
    RequestSent { turn_id: Uuid, model: String },

    /// Gateway returned a readable stream; the turn is now streaming
    StreamOpened { turn_id: Uuid, status: u16 },

    /// Text appended to the pending turn
    TurnUpdate {
        turn_id: Uuid,
        delta: String,
        content_len: usize,
    },

    /// Turn settled (complete or errored)
    TurnEnd { turn: Turn },

    /// Transcript was cleared
    Cleared,
}

impl ChatEvent {
    /// Check if this is a terminal event for a turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::TurnEnd { .. })
    }
}
