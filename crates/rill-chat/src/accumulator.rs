//! Folds delta events into one growing assistant turn.

use std::sync::Arc;

use rill_ai::DeltaEvent;
use uuid::Uuid;

use crate::transcript::TranscriptStore;

/// Whether the accumulator still expects events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Complete,
}

/// Accumulates the reply for exactly one pending turn.
///
/// Every fragment is published to the store as soon as it is applied, so the
/// turn's content only ever grows until the terminal event marks it complete.
/// The text itself lives only in the store.
#[derive(Debug)]
pub struct Accumulator {
    store: Arc<TranscriptStore>,
    turn_id: Uuid,
    content_len: usize,
    fragments: usize,
    complete: bool,
}

impl Accumulator {
    pub fn new(store: Arc<TranscriptStore>, turn_id: Uuid) -> Self {
        Self {
            store,
            turn_id,
            content_len: 0,
            fragments: 0,
            complete: false,
        }
    }

    /// Apply one event. Events after completion are ignored.
    pub fn apply(&mut self, event: DeltaEvent) -> Progress {
        if self.complete {
            return Progress::Complete;
        }

        if let Some(fragment) = event.fragment {
            self.content_len += fragment.len();
            self.fragments += 1;
            if !self.store.append(self.turn_id, &fragment) {
                tracing::debug!(turn = %self.turn_id, "turn no longer pending, fragment not published");
            }
        }

        if event.terminal {
            self.complete = true;
            self.store.complete(self.turn_id);
            tracing::debug!(turn = %self.turn_id, fragments = self.fragments, "turn complete");
            return Progress::Complete;
        }

        Progress::Continue
    }

    /// Text accumulated so far, read back from the store.
    ///
    /// Empty once the turn has been cleared away.
    pub fn content(&self) -> String {
        self.store
            .snapshot()
            .get(self.turn_id)
            .map(|turn| turn.content.clone())
            .unwrap_or_default()
    }

    /// Length in bytes of every fragment applied
    pub fn content_len(&self) -> usize {
        self.content_len
    }

    /// Number of text fragments applied
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::TurnStatus;

    fn setup() -> (Arc<TranscriptStore>, Accumulator) {
        let store = Arc::new(TranscriptStore::new());
        let id = store.begin_turn("question").unwrap();
        let acc = Accumulator::new(store.clone(), id);
        (store, acc)
    }

    #[test]
    fn test_concatenates_in_arrival_order() {
        let (store, mut acc) = setup();
        for piece in ["The ", "quick ", "fox"] {
            assert_eq!(acc.apply(DeltaEvent::text(piece)), Progress::Continue);
        }
        assert_eq!(acc.apply(DeltaEvent::terminal()), Progress::Complete);

        let snap = store.snapshot();
        let turn = snap.get(acc.turn_id()).unwrap();
        assert_eq!(turn.content, "The quick fox");
        assert_eq!(turn.status, TurnStatus::Complete);
        assert_eq!(acc.content(), "The quick fox");
        assert_eq!(acc.content_len(), "The quick fox".len());
        assert_eq!(acc.fragments(), 3);
    }

    #[test]
    fn test_absent_fragments_contribute_nothing() {
        let (store, mut acc) = setup();
        acc.apply(DeltaEvent::text("a"));
        acc.apply(DeltaEvent::default());
        acc.apply(DeltaEvent::text("b"));
        assert_eq!(store.snapshot().get(acc.turn_id()).unwrap().content, "ab");
        assert_eq!(acc.fragments(), 2);
    }

    #[test]
    fn test_each_fragment_is_visible_immediately() {
        let (store, mut acc) = setup();
        let mut rx = store.subscribe();
        let mut seen = Vec::new();

        for piece in ["x", "y", "z"] {
            acc.apply(DeltaEvent::text(piece));
            assert!(rx.has_changed().unwrap());
            let snap = rx.borrow_and_update().clone();
            seen.push(snap.get(acc.turn_id()).unwrap().content.clone());
        }
        assert_eq!(seen, vec!["x", "xy", "xyz"]);
    }

    #[test]
    fn test_events_after_terminal_are_ignored() {
        let (store, mut acc) = setup();
        acc.apply(DeltaEvent::text("done"));
        acc.apply(DeltaEvent::terminal());
        assert_eq!(acc.apply(DeltaEvent::text(" extra")), Progress::Complete);
        assert_eq!(acc.content(), "done");
        assert_eq!(acc.content_len(), 4);
        assert_eq!(store.snapshot().get(acc.turn_id()).unwrap().content, "done");
    }

    #[test]
    fn test_fragment_on_terminal_event_is_kept() {
        let (store, mut acc) = setup();
        let last = DeltaEvent {
            fragment: Some("end".into()),
            terminal: true,
        };
        assert_eq!(acc.apply(last), Progress::Complete);
        assert_eq!(store.snapshot().get(acc.turn_id()).unwrap().content, "end");
    }

    #[test]
    fn test_cleared_turn_does_not_resurrect() {
        let (store, mut acc) = setup();
        acc.apply(DeltaEvent::text("a"));
        store.clear();
        acc.apply(DeltaEvent::text("b"));
        acc.apply(DeltaEvent::terminal());
        assert!(store.snapshot().is_empty());
        assert_eq!(acc.content(), "");
        assert_eq!(acc.content_len(), 2);
    }
}
