use serde::{Deserialize, Serialize};

use crate::types::{Color, CommandId, EventId, Point, RoomId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ToolKind {
    Pen,
    Eraser,
    Rectangle,
    Oval,
    Text,
}

/// Geometry produced by a client. The engine never interprets it beyond
/// carrying it to other participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrokePayload {
    pub tool: ToolKind,
    pub color: Color,
    pub stroke_width: f32,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
    StrokeAdd { stroke: StrokePayload },
    StrokeRemove { target: EventId },
    StrokeRestore { target: EventId },
    Clear,
}

impl EventKind {
    /// Only freshly drawn strokes enter the author's undo stack. Undo and
    /// redo are themselves sequenced events but cannot be undone again,
    /// and a clear wipes the stacks outright.
    pub fn is_undoable(&self) -> bool {
        matches!(self, EventKind::StrokeAdd { .. })
    }
}

/// One atomic, ordered mutation of a room's canvas. Immutable once
/// appended; `event_id` is the room-wide ordering for broadcast and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawEvent {
    pub event_id: EventId,
    pub room_id: RoomId,
    pub author_id: UserId,
    pub kind: EventKind,
    pub causal_seq: CommandId,
}

/// Append-only event sequence for one room. Ids are assigned here, at the
/// single point all room mutations funnel through, so they come out
/// gap-free and strictly increasing from 1.
pub struct EventLog {
    room_id: RoomId,
    events: Vec<DrawEvent>,
    next_event_id: EventId,
}

impl EventLog {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            events: Vec::new(),
            next_event_id: 1,
        }
    }

    pub fn append(&mut self, author_id: UserId, kind: EventKind, causal_seq: CommandId) -> &DrawEvent {
        let event = DrawEvent {
            event_id: self.next_event_id,
            room_id: self.room_id.clone(),
            author_id,
            kind,
            causal_seq,
        };
        self.next_event_id += 1;
        self.events.push(event);
        self.events.last().unwrap()
    }

    pub fn get(&self, event_id: EventId) -> Option<&DrawEvent> {
        // ids are dense and start at 1
        self.events.get((event_id as usize).checked_sub(1)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_event_id(&self) -> EventId {
        self.next_event_id - 1
    }
}
