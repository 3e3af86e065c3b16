//! Transcript store: ordered conversation turns published as immutable snapshots.

use std::sync::Arc;

use rill_ai::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Lifecycle of a single turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Assistant reply still being generated
    Pending,
    Complete,
    Errored,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub status: TurnStatus,
    /// Creation time, epoch milliseconds
    pub timestamp: i64,
}

impl Turn {
    /// Create a finished user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            status: TurnStatus::Complete,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create an empty assistant placeholder
    pub fn pending_assistant() -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: String::new(),
            status: TurnStatus::Pending,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TurnStatus::Pending
    }

    /// The `{role, content}` pair sent upstream for this turn
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Ordered sequence of turns. Insertion order is conversation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Find a turn by id
    pub fn get(&self, id: Uuid) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    /// The in-flight assistant turn, if any
    pub fn pending(&self) -> Option<&Turn> {
        self.turns.iter().find(|t| t.is_pending())
    }

    /// Messages to send upstream: every settled turn, in order
    pub fn history(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .filter(|t| !t.is_pending())
            .map(Turn::to_message)
            .collect()
    }

    /// Indices of turns that break user/assistant alternation.
    ///
    /// The first turn must be a user turn and roles must alternate after it.
    pub fn alternation_violations(&self) -> Vec<usize> {
        let mut expected = Role::User;
        let mut violations = Vec::new();
        for (index, turn) in self.turns.iter().enumerate() {
            if turn.role != expected {
                violations.push(index);
            }
            expected = match turn.role {
                Role::User => Role::Assistant,
                Role::Assistant => Role::User,
            };
        }
        violations
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut Turn> {
        self.turns.iter_mut().find(|t| t.id == id)
    }
}

/// Holds the transcript and publishes a fresh snapshot after every change.
///
/// Writers copy-on-write the shared `Arc<Transcript>`, so a reader holding a
/// snapshot never sees it change underneath it. Readers may miss intermediate
/// snapshots but always see the latest one.
#[derive(Debug)]
pub struct TranscriptStore {
    tx: watch::Sender<Arc<Transcript>>,
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Transcript::default()));
        Self { tx }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Transcript> {
        self.tx.borrow().clone()
    }

    /// Subscribe to snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<Arc<Transcript>> {
        self.tx.subscribe()
    }

    /// Append a user turn and an empty pending assistant turn in one step.
    ///
    /// Returns the id of the assistant placeholder. Fails if another turn is
    /// still pending.
    pub fn begin_turn(&self, user_text: &str) -> Result<Uuid> {
        let mut outcome = Err(Error::TurnInFlight);
        self.tx.send_if_modified(|shared| {
            if shared.pending().is_some() {
                return false;
            }
            let transcript = Arc::make_mut(shared);
            let placeholder = Turn::pending_assistant();
            outcome = Ok(placeholder.id);
            transcript.turns.push(Turn::user(user_text));
            transcript.turns.push(placeholder);
            true
        });
        outcome
    }

    /// Append text to a pending turn. Returns false if the turn is gone or settled.
    pub fn append(&self, id: Uuid, fragment: &str) -> bool {
        if fragment.is_empty() {
            return self.snapshot().get(id).is_some_and(Turn::is_pending);
        }
        self.tx.send_if_modified(|shared| {
            if !shared.get(id).is_some_and(Turn::is_pending) {
                return false;
            }
            if let Some(turn) = Arc::make_mut(shared).get_mut(id) {
                turn.content.push_str(fragment);
            }
            true
        })
    }

    /// Mark a pending turn complete
    pub fn complete(&self, id: Uuid) -> bool {
        self.tx.send_if_modified(|shared| {
            if !shared.get(id).is_some_and(Turn::is_pending) {
                return false;
            }
            if let Some(turn) = Arc::make_mut(shared).get_mut(id) {
                turn.status = TurnStatus::Complete;
            }
            true
        })
    }

    /// Mark a pending turn errored.
    ///
    /// With `keep_content` the notice is appended after any accumulated text,
    /// otherwise it replaces the content. An errored turn is never left blank.
    pub fn fail(&self, id: Uuid, notice: &str, keep_content: bool) -> bool {
        self.tx.send_if_modified(|shared| {
            if !shared.get(id).is_some_and(Turn::is_pending) {
                return false;
            }
            if let Some(turn) = Arc::make_mut(shared).get_mut(id) {
                if keep_content && !turn.content.is_empty() {
                    turn.content.push_str("\n\n");
                    turn.content.push_str(notice);
                } else {
                    turn.content = notice.to_string();
                }
                turn.status = TurnStatus::Errored;
            }
            true
        })
    }

    /// Discard every turn at once
    pub fn clear(&self) {
        self.tx.send_if_modified(|shared| {
            if shared.is_empty() {
                return false;
            }
            *shared = Arc::new(Transcript::default());
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_turn_appends_user_and_placeholder() {
        let store = TranscriptStore::new();
        let id = store.begin_turn("hello").unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.turns()[0].role, Role::User);
        assert_eq!(snap.turns()[0].content, "hello");
        assert_eq!(snap.turns()[0].status, TurnStatus::Complete);
        assert_eq!(snap.turns()[1].id, id);
        assert_eq!(snap.turns()[1].status, TurnStatus::Pending);
        assert!(snap.turns()[1].content.is_empty());
    }

    #[test]
    fn test_only_one_pending_turn() {
        let store = TranscriptStore::new();
        store.begin_turn("a").unwrap();
        assert!(matches!(store.begin_turn("b"), Err(Error::TurnInFlight)));
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_snapshots_are_immutable() {
        let store = TranscriptStore::new();
        let id = store.begin_turn("q").unwrap();
        store.append(id, "par");
        let before = store.snapshot();
        store.append(id, "tial");

        assert_eq!(before.get(id).unwrap().content, "par");
        assert_eq!(store.snapshot().get(id).unwrap().content, "partial");
    }

    #[test]
    fn test_settled_turn_is_not_appended() {
        let store = TranscriptStore::new();
        let id = store.begin_turn("q").unwrap();
        store.append(id, "done");
        assert!(store.complete(id));
        assert!(!store.append(id, " more"));
        assert!(!store.complete(id));
        assert!(!store.fail(id, "late", true));
        assert_eq!(store.snapshot().get(id).unwrap().content, "done");
    }

    #[test]
    fn test_fail_keeps_partial_content() {
        let store = TranscriptStore::new();
        let id = store.begin_turn("q").unwrap();
        store.append(id, "partial");
        store.fail(id, "[error: reset]", true);

        let snap = store.snapshot();
        let turn = snap.get(id).unwrap();
        assert_eq!(turn.status, TurnStatus::Errored);
        assert_eq!(turn.content, "partial\n\n[error: reset]");
    }

    #[test]
    fn test_fail_on_empty_turn_is_never_blank() {
        let store = TranscriptStore::new();
        let id = store.begin_turn("q").unwrap();
        store.fail(id, "[cancelled]", true);
        assert_eq!(store.snapshot().get(id).unwrap().content, "[cancelled]");
    }

    #[test]
    fn test_history_excludes_pending() {
        let store = TranscriptStore::new();
        let first = store.begin_turn("one").unwrap();
        store.append(first, "reply");
        store.complete(first);
        store.begin_turn("two").unwrap();

        let history = store.snapshot().history();
        assert_eq!(
            history,
            vec![
                ChatMessage::user("one"),
                ChatMessage::assistant("reply"),
                ChatMessage::user("two")
            ]
        );
    }

    #[test]
    fn test_clear_is_atomic_and_unblocks() {
        let store = TranscriptStore::new();
        let id = store.begin_turn("q").unwrap();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.clear();
        assert!(rx.has_changed().unwrap());
        assert!(store.snapshot().is_empty());
        assert!(!store.append(id, "orphan"));
        assert!(store.begin_turn("again").is_ok());
    }

    #[test]
    fn test_alternation_violations() {
        let mut transcript = Transcript::default();
        assert!(transcript.alternation_violations().is_empty());

        transcript.turns.push(Turn::user("a"));
        transcript.turns.push(Turn::pending_assistant());
        transcript.turns.push(Turn::user("b"));
        assert!(transcript.alternation_violations().is_empty());

        transcript.turns.push(Turn::user("c"));
        assert_eq!(transcript.alternation_violations(), vec![3]);

        let mut starts_wrong = Transcript::default();
        starts_wrong.turns.push(Turn::pending_assistant());
        assert_eq!(starts_wrong.alternation_violations(), vec![0]);
    }
}
