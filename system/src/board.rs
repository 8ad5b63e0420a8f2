use crate::event_log::{DrawEvent, EventKind, EventLog, StrokePayload};
use crate::message::BoardSnapshot;
use crate::types::{CommandId, EventId, RoomId, UserId};
use crate::undo_history::{HistoryError, UndoHistory};

/// The replayable core of one room: the append-only event log plus every
/// author's undo state. Owned by exactly one room session, which is the
/// serialization point for all mutations — nothing here is shared.
pub struct Board {
    log: EventLog,
    history: UndoHistory,
    last_clear: Option<EventId>,
}

impl Board {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            log: EventLog::new(room_id),
            history: UndoHistory::new(),
            last_clear: None,
        }
    }

    /// Appends a fresh stroke, recording it on the author's undo stack.
    pub fn apply_stroke(
        &mut self,
        author_id: UserId,
        stroke: StrokePayload,
        causal_seq: CommandId,
    ) -> DrawEvent {
        let event = self
            .log
            .append(author_id, EventKind::StrokeAdd { stroke }, causal_seq)
            .clone();
        self.history.record(author_id, event.event_id);
        event
    }

    /// Wipes the canvas. Sequenced like any other mutation; undo cannot
    /// reach across it, for any author.
    pub fn clear(&mut self, author_id: UserId, causal_seq: CommandId) -> DrawEvent {
        let event = self
            .log
            .append(author_id, EventKind::Clear, causal_seq)
            .clone();
        self.history.clear_all();
        self.last_clear = Some(event.event_id);
        event
    }

    /// Undo is just another sequenced event: the author's latest active
    /// stroke is flagged undone and a synthetic removal referencing it is
    /// appended and returned for broadcast.
    pub fn undo(
        &mut self,
        author_id: UserId,
        causal_seq: CommandId,
    ) -> Result<DrawEvent, HistoryError> {
        let target = self.history.undo(&author_id)?;
        Ok(self
            .log
            .append(author_id, EventKind::StrokeRemove { target }, causal_seq)
            .clone())
    }

    pub fn redo(
        &mut self,
        author_id: UserId,
        causal_seq: CommandId,
    ) -> Result<DrawEvent, HistoryError> {
        let target = self.history.redo(&author_id)?;
        Ok(self
            .log
            .append(author_id, EventKind::StrokeRestore { target }, causal_seq)
            .clone())
    }

    /// Replay for a late joiner: strokes whose authors have not undone
    /// them at this moment, in event-id order. Synthetic remove/restore
    /// events and anything behind the last clear are already folded into
    /// that view.
    pub fn snapshot(&self) -> BoardSnapshot {
        let cutoff = self.last_clear.unwrap_or(0);
        let events = self
            .log
            .iter()
            .filter(|event| event.event_id > cutoff)
            .filter(|event| match event.kind {
                EventKind::StrokeAdd { .. } => {
                    self.history.is_active(&event.author_id, event.event_id)
                }
                _ => false,
            })
            .cloned()
            .collect();
        BoardSnapshot { events }
    }

    pub fn can_undo(&self, author_id: &UserId) -> bool {
        self.history.can_undo(author_id)
    }

    pub fn can_redo(&self, author_id: &UserId) -> bool {
        self.history.can_redo(author_id)
    }

    pub fn event_count(&self) -> usize {
        self.log.len()
    }

    pub fn last_event_id(&self) -> EventId {
        self.log.last_event_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Point};
    use crate::ToolKind;

    fn stroke() -> StrokePayload {
        StrokePayload {
            tool: ToolKind::Pen,
            color: Color::default(),
            stroke_width: 2.0,
            points: vec![Point { x: 1.0, y: 2.0 }],
        }
    }

    fn visible_ids(board: &Board) -> Vec<EventId> {
        board.snapshot().events.iter().map(|e| e.event_id).collect()
    }

    #[test]
    fn undo_then_redo_restores_rendered_state() {
        let mut board = Board::new("room".into());
        let a = uuid::Uuid::new_v4();
        board.apply_stroke(a, stroke(), 1);
        board.apply_stroke(a, stroke(), 2);
        let before = visible_ids(&board);

        let removal = board.undo(a, 3).unwrap();
        assert!(matches!(removal.kind, EventKind::StrokeRemove { target: 2 }));
        assert_eq!(visible_ids(&board), vec![1]);

        let restore = board.redo(a, 4).unwrap();
        assert!(matches!(restore.kind, EventKind::StrokeRestore { target: 2 }));
        assert_eq!(visible_ids(&board), before);
    }

    #[test]
    fn synthetic_events_are_sequenced_like_any_other() {
        let mut board = Board::new("room".into());
        let a = uuid::Uuid::new_v4();
        assert_eq!(board.apply_stroke(a, stroke(), 1).event_id, 1);
        assert_eq!(board.undo(a, 2).unwrap().event_id, 2);
        assert_eq!(board.redo(a, 3).unwrap().event_id, 3);
        assert_eq!(board.last_event_id(), 3);
    }

    #[test]
    fn replay_never_shows_another_users_undone_stroke() {
        let mut board = Board::new("room".into());
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        board.apply_stroke(a, stroke(), 1); // 1
        board.apply_stroke(b, stroke(), 1); // 2
        board.apply_stroke(a, stroke(), 2); // 3

        board.undo(a, 3).unwrap(); // removes 3
        assert_eq!(visible_ids(&board), vec![1, 2]);

        // b's history is untouched by a's undo
        assert!(board.can_undo(&b));
        assert!(!board.can_redo(&b));

        board.redo(a, 4).unwrap();
        assert_eq!(visible_ids(&board), vec![1, 2, 3]);
    }

    #[test]
    fn clear_hides_history_and_blocks_undo_across_it() {
        let mut board = Board::new("room".into());
        let a = uuid::Uuid::new_v4();
        board.apply_stroke(a, stroke(), 1);
        board.apply_stroke(a, stroke(), 2);

        let clear = board.clear(a, 3);
        assert!(matches!(clear.kind, EventKind::Clear));
        assert!(visible_ids(&board).is_empty());
        assert!(board.undo(a, 4).is_err());

        // drawing continues with the room-wide sequence intact
        let event = board.apply_stroke(a, stroke(), 5);
        assert_eq!(event.event_id, 4);
        assert_eq!(visible_ids(&board), vec![4]);
    }

    #[test]
    fn empty_stack_reports_errors_without_state_change() {
        let mut board = Board::new("room".into());
        let a = uuid::Uuid::new_v4();
        assert_eq!(board.undo(a, 1).unwrap_err(), HistoryError::EmptyUndoStack);
        assert_eq!(board.redo(a, 2).unwrap_err(), HistoryError::NothingToRedo);
        assert_eq!(board.event_count(), 0);
    }
}
