use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{channel, Sender};
use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};

use system::{
    CommandId, CommandResult, ConnectionId, IdentifiableCommand, IdentifiableEvent,
    LivePointerEvent, Role, RoomCommand, RoomEvent, RoomId, SessionError, UserId, UserProfile,
};

use crate::config::SessionConfig;
use crate::directory::{RoleMap, RoomDirectory, RoomMeta};
use crate::participant_tx_storage::{ParticipantTx, ParticipantTxStorage};
use crate::permission;
use crate::registry::{RetireOutcome, SessionRegistry};
use crate::room_state::RoomState;

pub type RoomTx = Sender<RoomMessage>;

/// Everything that can reach a room session. The inbox is the room's
/// serialization point: messages are handled strictly one at a time.
#[derive(Debug)]
pub enum RoomMessage {
    Join {
        profile: UserProfile,
        tx: ParticipantTx,
        reply: oneshot::Sender<Result<ConnectionId, SessionError>>,
    },
    Leave {
        from: ConnectionId,
    },
    Command {
        from: ConnectionId,
        command: IdentifiableCommand,
    },
    RolesChanged,
    Describe {
        reply: oneshot::Sender<RoomStatus>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomStatus {
    pub room_id: RoomId,
    pub participants: usize,
    pub events: u64,
    pub draining: bool,
    pub idle_secs: u64,
}

struct Room {
    state: RoomState,
    txs: ParticipantTxStorage,
    directory: Arc<dyn RoomDirectory>,
    roles: Option<(RoomMeta, RoleMap)>,
    roles_fetched_at: std::time::Instant,
    role_refresh: Duration,
}

impl Room {
    fn new(room_id: RoomId, directory: Arc<dyn RoomDirectory>, role_refresh: Duration) -> Self {
        Self {
            state: RoomState::new(room_id),
            txs: ParticipantTxStorage::new(),
            directory,
            roles: None,
            roles_fetched_at: std::time::Instant::now(),
            role_refresh,
        }
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join { profile, tx, reply } => self.handle_join(profile, tx, reply),
            RoomMessage::Leave { from } => self.handle_leave(from),
            RoomMessage::Command { from, command } => self.handle_command(from, command),
            RoomMessage::RolesChanged => {
                // drop the cache so the next action re-resolves
                self.roles = None;
            }
            RoomMessage::Describe { reply } => {
                let _ = reply.send(self.describe());
            }
        }
    }

    fn handle_join(
        &mut self,
        profile: UserProfile,
        tx: ParticipantTx,
        reply: oneshot::Sender<Result<ConnectionId, SessionError>>,
    ) {
        let role = match self.resolve_role(&profile.user_id, true) {
            Ok(role) => role,
            Err(err) => {
                let _ = reply.send(Err(err));
                return;
            }
        };
        if role == Role::None {
            let _ = reply.send(Err(SessionError::PermissionDenied));
            return;
        }

        let connection_id = self.state.admit(profile.clone(), role);
        self.txs.insert(connection_id, tx);
        if reply.send(Ok(connection_id)).is_err() {
            // the gateway gave up while we were admitting; nothing was
            // announced yet, so quietly take it back
            self.state.remove(&connection_id);
            self.txs.remove(&connection_id);
            return;
        }

        let init = RoomEvent::Init {
            room_id: self.state.room_id.clone(),
            connection_id,
            your_role: role,
            participants: self.state.participants_info(),
            board: self.state.board.snapshot(),
            can_undo: self.state.board.can_undo(&profile.user_id),
            can_redo: self.state.board.can_redo(&profile.user_id),
        };
        self.send_to(connection_id, IdentifiableEvent::BySystem { event: init });
        self.broadcast(
            RoomEvent::SomeoneJoined(system::ParticipantInfo {
                connection_id,
                user_id: profile.user_id,
                username: profile.username,
                role,
            }),
            Some(connection_id),
        );
    }

    fn handle_leave(&mut self, from: ConnectionId) {
        if let Some(participant) = self.state.remove(&from) {
            self.txs.remove(&from);
            log::info!(
                "{} left room {} (connection {})",
                participant.profile.username,
                self.state.room_id,
                from
            );
            self.broadcast(
                RoomEvent::SomeoneLeft {
                    connection_id: from,
                    user_id: participant.profile.user_id,
                },
                None,
            );
        }
    }

    fn handle_command(&mut self, from: ConnectionId, command: IdentifiableCommand) {
        let IdentifiableCommand {
            command_id,
            command,
        } = command;
        let author_id = match self.state.participant(&from) {
            Some(participant) => participant.profile.user_id,
            None => {
                log::warn!(
                    "room {}: command from unknown connection {}",
                    self.state.room_id,
                    from
                );
                return;
            }
        };
        self.state.touch();

        let result = match self.execute(from, author_id, command_id, command) {
            Ok(ack) => CommandResult::RoomEvent(ack),
            Err(err) => CommandResult::Error(err),
        };
        self.send_to(from, IdentifiableEvent::ByMyself { command_id, result });
    }

    fn execute(
        &mut self,
        from: ConnectionId,
        author_id: UserId,
        command_id: CommandId,
        command: RoomCommand,
    ) -> Result<RoomEvent, SessionError> {
        match command {
            RoomCommand::Draw(stroke) => {
                self.require_edit(&author_id)?;
                let event = self.state.board.apply_stroke(author_id, stroke, command_id);
                self.broadcast(RoomEvent::Event(event), None);
                Ok(self.history_status(&author_id))
            }
            RoomCommand::Clear => {
                self.require_edit(&author_id)?;
                let event = self.state.board.clear(author_id, command_id);
                self.broadcast(RoomEvent::Event(event), None);
                Ok(self.history_status(&author_id))
            }
            RoomCommand::Undo => {
                self.require_edit(&author_id)?;
                let event = self.state.board.undo(author_id, command_id)?;
                self.broadcast(RoomEvent::Event(event), None);
                Ok(self.history_status(&author_id))
            }
            RoomCommand::Redo => {
                self.require_edit(&author_id)?;
                let event = self.state.board.redo(author_id, command_id)?;
                self.broadcast(RoomEvent::Event(event), None);
                Ok(self.history_status(&author_id))
            }
            RoomCommand::LivePointer(pointer) => {
                // presence, not a mutation: any admitted participant may point
                let event = LivePointerEvent {
                    connection_id: from,
                    user_id: author_id,
                    x: pointer.x,
                    y: pointer.y,
                };
                self.broadcast(RoomEvent::LivePointer(event.clone()), Some(from));
                Ok(RoomEvent::LivePointer(event))
            }
        }
    }

    fn history_status(&self, author_id: &UserId) -> RoomEvent {
        RoomEvent::HistoryStatus {
            can_undo: self.state.board.can_undo(author_id),
            can_redo: self.state.board.can_redo(author_id),
        }
    }

    fn require_edit(&mut self, author_id: &UserId) -> Result<(), SessionError> {
        let role = self.resolve_role(author_id, false)?;
        if role.can_edit() {
            Ok(())
        } else {
            Err(SessionError::PermissionDenied)
        }
    }

    /// Resolves against the cached role map, re-fetching on join, after a
    /// roles-changed notification, or once the cache has gone stale. Any
    /// directory failure fails the operation closed.
    fn resolve_role(&mut self, user_id: &UserId, force: bool) -> Result<Role, SessionError> {
        self.refresh_roles(force)?;
        let (meta, map) = self.roles.as_ref().expect("roles were just refreshed");
        Ok(permission::resolve(user_id, meta, map))
    }

    fn refresh_roles(&mut self, force: bool) -> Result<(), SessionError> {
        if !force && self.roles.is_some() && self.roles_fetched_at.elapsed() < self.role_refresh {
            return Ok(());
        }
        let meta = match self.directory.room_meta(&self.state.room_id) {
            Some(meta) => meta,
            None => {
                self.roles = None;
                return Err(SessionError::RoomNotFound);
            }
        };
        let map = match self.directory.role_map(&self.state.room_id) {
            Ok(map) => map,
            Err(err) => {
                log::warn!(
                    "room {}: role lookup failed, failing closed: {}",
                    self.state.room_id,
                    err
                );
                self.roles = None;
                return Err(SessionError::PermissionDenied);
            }
        };
        self.roles_fetched_at = std::time::Instant::now();

        // revocations reach connected participants here
        let resolved: Vec<(ConnectionId, Role)> = self
            .state
            .participants
            .iter()
            .map(|(connection_id, participant)| {
                (
                    *connection_id,
                    permission::resolve(&participant.profile.user_id, &meta, &map),
                )
            })
            .collect();
        for (connection_id, role) in resolved {
            if let Some(participant) = self.state.participants.get_mut(&connection_id) {
                participant.role = role;
            }
        }
        self.roles = Some((meta, map));
        Ok(())
    }

    /// Delivers to every participant (minus `without`), in event order.
    /// Participants whose buffer overflowed or whose connection is gone
    /// are force-removed so one slow client never stalls the room.
    fn broadcast(&mut self, event: RoomEvent, without: Option<ConnectionId>) {
        let mut targets: Vec<ConnectionId> = self
            .state
            .participants
            .keys()
            .copied()
            .filter(|connection_id| without != Some(*connection_id))
            .collect();
        targets.sort_unstable();

        let mut dropped = Vec::new();
        for connection_id in targets {
            let delivered = self.txs.try_send(
                &connection_id,
                crate::connection::ConnectionEvent::Event(IdentifiableEvent::BySystem {
                    event: event.clone(),
                }),
            );
            if !delivered {
                dropped.push(connection_id);
            }
        }
        for connection_id in dropped {
            self.force_leave(connection_id);
        }
    }

    fn send_to(&mut self, connection_id: ConnectionId, event: IdentifiableEvent) {
        if !self.txs.try_send(
            &connection_id,
            crate::connection::ConnectionEvent::Event(event),
        ) {
            self.force_leave(connection_id);
        }
    }

    fn force_leave(&mut self, connection_id: ConnectionId) {
        if let Some(participant) = self.state.remove(&connection_id) {
            self.txs.remove(&connection_id);
            log::warn!(
                "dropping {} from room {} (connection {}): outbound channel unusable",
                participant.profile.username,
                self.state.room_id,
                connection_id
            );
            self.broadcast(
                RoomEvent::SomeoneLeft {
                    connection_id,
                    user_id: participant.profile.user_id,
                },
                None,
            );
        }
    }

    fn describe(&self) -> RoomStatus {
        RoomStatus {
            room_id: self.state.room_id.clone(),
            participants: self.state.participants.len(),
            events: self.state.board.last_event_id(),
            draining: self.state.is_empty(),
            idle_secs: self.state.last_activity.elapsed().as_secs(),
        }
    }
}

/// Spawns the sequential task owning one room. All room state lives on
/// this task; the returned sender is the only way in.
pub(crate) fn spawn_room(
    room_id: RoomId,
    epoch: u64,
    registry: SessionRegistry,
    config: SessionConfig,
) -> RoomTx {
    let (tx, mut rx) = channel::<RoomMessage>(config.inbox_buffer);

    tokio::spawn(async move {
        log::info!("room {} session started", room_id);
        let mut room = Room::new(room_id.clone(), registry.directory(), config.role_refresh);
        let mut drain_deadline = Some(Instant::now() + config.drain_grace);

        loop {
            let message = match drain_deadline {
                Some(deadline) => match timeout_at(deadline, rx.recv()).await {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    // grace elapsed with nobody here; retire unless a
                    // message snuck in while we were deciding
                    Err(_) => match registry.retire(&room_id, epoch, &mut rx) {
                        RetireOutcome::Retired => break,
                        RetireOutcome::Revived(message) => message,
                    },
                },
                None => match rx.recv().await {
                    Some(message) => message,
                    None => break,
                },
            };
            room.handle_message(message);
            drain_deadline = if room.state.is_empty() {
                Some(Instant::now() + config.drain_grace)
            } else {
                None
            };
        }

        // Stragglers that raced the retirement: dropping a Join's reply
        // channel makes its gateway retry against a fresh session.
        rx.close();
        while rx.try_recv().is_ok() {}
        log::info!(
            "room {} session closed, discarding {} cached events",
            room_id,
            room.state.board.event_count()
        );
    });

    tx
}
