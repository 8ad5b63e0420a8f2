use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;

use system::ConnectionId;

use crate::connection::ConnectionEvent;

pub type ParticipantTx = tokio::sync::mpsc::Sender<ConnectionEvent>;

pub struct ParticipantTxStorage {
    participant_txs: HashMap<ConnectionId, ParticipantTx>,
}

impl ParticipantTxStorage {
    pub fn new() -> Self {
        Self {
            participant_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ParticipantTx) {
        self.participant_txs.insert(connection_id, tx);
    }

    /// Queues an event without ever blocking the room. Returns false when
    /// the participant's buffer is full or its connection is gone — the
    /// caller is expected to drop that participant.
    pub fn try_send(&self, to: &ConnectionId, event: ConnectionEvent) -> bool {
        match self.participant_txs.get(to) {
            Some(tx) => match tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    log::warn!("connection {} outbound buffer overflowed", to);
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            },
            None => {
                log::warn!("no outbound channel for connection {}", to);
                true
            }
        }
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ParticipantTx> {
        self.participant_txs.remove(connection_id)
    }
}
