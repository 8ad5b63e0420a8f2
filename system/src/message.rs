use serde::{Deserialize, Serialize};

use crate::event_log::{DrawEvent, StrokePayload};
use crate::types::{CommandId, ConnectionId, Role, RoomId, UserId};

/// FatalError makes the connection be closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FatalError {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvalidActionKind {
    MalformedMessage,
    EmptyUndoStack,
    NothingToRedo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionError {
    PermissionDenied,
    RoomNotFound,
    InvalidAction(InvalidActionKind),
    FatalError(FatalError),
}

/// What a client may ask of its room. Join and leave are the socket
/// lifecycle, not commands; ping is a WebSocket control frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoomCommand {
    Draw(StrokePayload),
    Clear,
    Undo,
    Redo,
    LivePointer(LivePointerCommand),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifiableCommand {
    pub command_id: CommandId,
    pub command: RoomCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivePointerCommand {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivePointerEvent {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
}

/// The visible canvas at one moment: events whose authors have not undone
/// them, in event-id order. Sent to late joiners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub events: Vec<DrawEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoomEvent {
    Init {
        room_id: RoomId,
        connection_id: ConnectionId,
        your_role: Role,
        participants: Vec<ParticipantInfo>,
        board: BoardSnapshot,
        can_undo: bool,
        can_redo: bool,
    },
    Event(DrawEvent),
    LivePointer(LivePointerEvent),
    SomeoneJoined(ParticipantInfo),
    SomeoneLeft {
        connection_id: ConnectionId,
        user_id: UserId,
    },
    HistoryStatus {
        can_undo: bool,
        can_redo: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandResult {
    RoomEvent(RoomEvent),
    Error(SessionError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IdentifiableEvent {
    ByMyself {
        command_id: CommandId,
        result: CommandResult,
    },
    BySystem {
        event: RoomEvent,
    },
    /// An error that cannot be correlated to a command id: a frame that
    /// did not decode, or a join that was turned away.
    Rejected {
        error: SessionError,
    },
}

impl From<crate::undo_history::HistoryError> for SessionError {
    fn from(err: crate::undo_history::HistoryError) -> Self {
        match err {
            crate::undo_history::HistoryError::EmptyUndoStack => {
                SessionError::InvalidAction(InvalidActionKind::EmptyUndoStack)
            }
            crate::undo_history::HistoryError::NothingToRedo => {
                SessionError::InvalidAction(InvalidActionKind::NothingToRedo)
            }
        }
    }
}
