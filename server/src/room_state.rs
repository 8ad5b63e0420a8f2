use std::collections::HashMap;
use std::num::Wrapping;
use std::time::Instant;

use system::{Board, ConnectionId, ParticipantInfo, Role, RoomId, UserProfile};

pub struct Participant {
    pub profile: UserProfile,
    pub role: Role,
}

/// Everything one room session owns, minus the IO around it. Kept apart
/// from the task loop so the bookkeeping can be tested directly.
pub struct RoomState {
    pub room_id: RoomId,
    pub board: Board,
    pub participants: HashMap<ConnectionId, Participant>,
    pub last_activity: Instant,

    connection_id_source: Wrapping<ConnectionId>,
}

impl RoomState {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            board: Board::new(room_id.clone()),
            room_id,
            participants: HashMap::new(),
            last_activity: Instant::now(),
            connection_id_source: Wrapping(0),
        }
    }

    pub fn admit(&mut self, profile: UserProfile, role: Role) -> ConnectionId {
        let connection_id = self.new_connection_id();
        log::info!(
            "{} joined room {} as {:?} (connection {})",
            profile.username,
            self.room_id,
            role,
            connection_id
        );
        self.participants
            .insert(connection_id, Participant { profile, role });
        self.touch();
        connection_id
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<Participant> {
        let participant = self.participants.remove(connection_id);
        if participant.is_some() {
            self.touch();
        }
        participant
    }

    pub fn participant(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        self.participants.get(connection_id)
    }

    pub fn participants_info(&self) -> Vec<ParticipantInfo> {
        let mut infos: Vec<ParticipantInfo> = self
            .participants
            .iter()
            .map(|(connection_id, participant)| ParticipantInfo {
                connection_id: *connection_id,
                user_id: participant.profile.user_id,
                username: participant.profile.username.clone(),
                role: participant.role,
            })
            .collect();
        infos.sort_by_key(|info| info.connection_id);
        infos
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        self.connection_id_source += Wrapping(1);
        self.connection_id_source.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_hands_out_increasing_connection_ids() {
        let mut state = RoomState::new("R".into());
        let a = state.admit(UserProfile::anonymous(), Role::Edit);
        let b = state.admit(UserProfile::anonymous(), Role::View);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(state.participants_info().len(), 2);
    }

    #[test]
    fn it_is_empty_after_everyone_leaves() {
        let mut state = RoomState::new("R".into());
        let a = state.admit(UserProfile::anonymous(), Role::Edit);
        assert!(!state.is_empty());
        assert!(state.remove(&a).is_some());
        assert!(state.remove(&a).is_none());
        assert!(state.is_empty());
    }
}
