//! A cloneable handle for poking the controller from external code.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Where the controller is in the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingResponse,
    Streaming,
}

#[derive(Debug)]
pub(crate) struct ActiveTurn {
    pub(crate) id: Uuid,
    pub(crate) cancel: CancellationToken,
}

#[derive(Debug, Default)]
pub(crate) struct TurnState {
    pub(crate) phase: Phase,
    pub(crate) active: Option<ActiveTurn>,
}

/// A cloneable handle for poking the controller from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone, Default)]
pub struct ChatHandle {
    pub(crate) state: Arc<Mutex<TurnState>>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
}

impl ChatHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cancel the in-flight turn. Returns false if nothing was running.
    pub fn cancel(&self) -> bool {
        match self.state.lock().active.as_ref() {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Whether a turn is awaiting a response or streaming.
    pub fn is_busy(&self) -> bool {
        self.phase() != Phase::Idle
    }

    /// Wait until the controller becomes idle.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_busy() {
            return;
        }
        notified.await;
    }

    /// Wait until the controller becomes idle, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: std::time::Duration) -> bool {
        if !self.is_busy() {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }

    /// Mark the turn `id` settled, if it is still the active one.
    pub(crate) fn settle(&self, id: Uuid) {
        let mut state = self.state.lock();
        if state.active.as_ref().is_some_and(|a| a.id == id) {
            state.active = None;
            state.phase = Phase::Idle;
            drop(state);
            self.idle_notify.notify_waiters();
        }
    }

    /// Advance the active turn `id` to `phase`. Returns false if `id` is no
    /// longer active.
    pub(crate) fn advance(&self, id: Uuid, phase: Phase) -> bool {
        let mut state = self.state.lock();
        if state.active.as_ref().is_some_and(|a| a.id == id) {
            state.phase = phase;
            true
        } else {
            false
        }
    }
}
