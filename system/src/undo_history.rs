use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{EventId, UserId};

/// One entry per undoable event an author produced. The `undone` flag is
/// only ever toggled through the stack discipline below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoEntry {
    pub event_id: EventId,
    pub undone: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HistoryError {
    EmptyUndoStack,
    NothingToRedo,
}

#[derive(Default)]
struct AuthorHistory {
    /// Entries in append order; the tail is the most recent action.
    entries: Vec<UndoEntry>,
    /// Event ids in the order they were undone. Cleared whenever the
    /// author records a fresh action, so entries below the new top can
    /// never be resurrected.
    redo: Vec<EventId>,
}

/// Per-author undo/redo stacks for one room. An author's stack only ever
/// contains that author's events; nothing here touches anyone else's.
#[derive(Default)]
pub struct UndoHistory {
    authors: HashMap<UserId, AuthorHistory>,
}

impl UndoHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, author_id: UserId, event_id: EventId) {
        let history = self.authors.entry(author_id).or_default();
        history.entries.push(UndoEntry {
            event_id,
            undone: false,
        });
        history.redo.clear();
    }

    /// Marks the author's most recent still-active entry as undone and
    /// returns its event id.
    pub fn undo(&mut self, author_id: &UserId) -> Result<EventId, HistoryError> {
        let history = self
            .authors
            .get_mut(author_id)
            .ok_or(HistoryError::EmptyUndoStack)?;
        let entry = history
            .entries
            .iter_mut()
            .rev()
            .find(|entry| !entry.undone)
            .ok_or(HistoryError::EmptyUndoStack)?;
        entry.undone = true;
        let event_id = entry.event_id;
        history.redo.push(event_id);
        Ok(event_id)
    }

    /// Re-activates the author's most recently undone entry and returns
    /// its event id.
    pub fn redo(&mut self, author_id: &UserId) -> Result<EventId, HistoryError> {
        let history = self
            .authors
            .get_mut(author_id)
            .ok_or(HistoryError::NothingToRedo)?;
        let event_id = history.redo.pop().ok_or(HistoryError::NothingToRedo)?;
        let entry = history
            .entries
            .iter_mut()
            .rev()
            .find(|entry| entry.event_id == event_id)
            .expect("redo list only holds recorded entries");
        entry.undone = false;
        Ok(event_id)
    }

    /// Whether the event should render right now. Events without an entry
    /// (synthetic ones, or pre-clear leftovers) count as active.
    pub fn is_active(&self, author_id: &UserId, event_id: EventId) -> bool {
        self.authors
            .get(author_id)
            .and_then(|history| {
                history
                    .entries
                    .iter()
                    .find(|entry| entry.event_id == event_id)
            })
            .map_or(true, |entry| !entry.undone)
    }

    pub fn can_undo(&self, author_id: &UserId) -> bool {
        self.authors
            .get(author_id)
            .map_or(false, |history| history.entries.iter().any(|e| !e.undone))
    }

    pub fn can_redo(&self, author_id: &UserId) -> bool {
        self.authors
            .get(author_id)
            .map_or(false, |history| !history.redo.is_empty())
    }

    /// A clear wipes every author's history; nothing can be undone across
    /// a clear.
    pub fn clear_all(&mut self) {
        self.authors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> UserId {
        uuid::Uuid::new_v4()
    }

    #[test]
    fn it_undoes_in_lifo_order() {
        let mut history = UndoHistory::new();
        let a = author();
        history.record(a, 1);
        history.record(a, 2);
        history.record(a, 3);

        assert_eq!(history.undo(&a), Ok(3));
        assert_eq!(history.undo(&a), Ok(2));
        assert_eq!(history.undo(&a), Ok(1));
        assert_eq!(history.undo(&a), Err(HistoryError::EmptyUndoStack));
    }

    #[test]
    fn it_redoes_most_recently_undone_first() {
        let mut history = UndoHistory::new();
        let a = author();
        history.record(a, 1);
        history.record(a, 2);
        history.record(a, 3);

        history.undo(&a).unwrap(); // 3
        history.undo(&a).unwrap(); // 2

        assert_eq!(history.redo(&a), Ok(2));
        assert_eq!(history.redo(&a), Ok(3));
        assert_eq!(history.redo(&a), Err(HistoryError::NothingToRedo));
        assert!(history.is_active(&a, 2));
        assert!(history.is_active(&a, 3));
    }

    #[test]
    fn fresh_action_clears_redo_availability() {
        let mut history = UndoHistory::new();
        let a = author();
        history.record(a, 1);
        history.record(a, 2);
        history.undo(&a).unwrap(); // 2 undone

        history.record(a, 3);
        assert_eq!(history.redo(&a), Err(HistoryError::NothingToRedo));
        // entry 2 stays where it is, still undone
        assert!(!history.is_active(&a, 2));

        // undoing the fresh action only ever brings back the fresh action
        assert_eq!(history.undo(&a), Ok(3));
        assert_eq!(history.redo(&a), Ok(3));
        assert_eq!(history.redo(&a), Err(HistoryError::NothingToRedo));
    }

    #[test]
    fn authors_are_isolated() {
        let mut history = UndoHistory::new();
        let a = author();
        let b = author();
        history.record(a, 1);
        history.record(b, 2);
        history.record(a, 3);

        assert_eq!(history.undo(&b), Ok(2));
        // a's stack is untouched
        assert_eq!(history.undo(&a), Ok(3));
        assert_eq!(history.undo(&a), Ok(1));
        assert_eq!(history.undo(&a), Err(HistoryError::EmptyUndoStack));
        assert_eq!(history.redo(&b), Ok(2));
    }

    #[test]
    fn unknown_author_has_nothing_to_undo() {
        let mut history = UndoHistory::new();
        assert_eq!(history.undo(&author()), Err(HistoryError::EmptyUndoStack));
        assert_eq!(history.redo(&author()), Err(HistoryError::NothingToRedo));
        assert!(!history.can_undo(&author()));
    }

    #[test]
    fn clear_wipes_every_author() {
        let mut history = UndoHistory::new();
        let a = author();
        let b = author();
        history.record(a, 1);
        history.record(b, 2);
        history.undo(&a).unwrap();

        history.clear_all();
        assert_eq!(history.undo(&a), Err(HistoryError::EmptyUndoStack));
        assert_eq!(history.redo(&a), Err(HistoryError::NothingToRedo));
        assert_eq!(history.undo(&b), Err(HistoryError::EmptyUndoStack));
    }
}
