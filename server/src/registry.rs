use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::Receiver;

use system::RoomId;

use crate::config::SessionConfig;
use crate::directory::RoomDirectory;
use crate::room::{spawn_room, RoomMessage, RoomTx};

struct RoomHandle {
    tx: RoomTx,
    epoch: u64,
}

struct Inner {
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    epoch_source: AtomicU64,
    directory: Arc<dyn RoomDirectory>,
    config: SessionConfig,
}

/// Process-wide directory of live room sessions. The map is the authority
/// on session existence: at most one live session per room id, created
/// atomically under the lock and removed only by its own task's
/// retirement. The lock is short-held and never crosses an await.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

pub(crate) enum RetireOutcome {
    Retired,
    Revived(RoomMessage),
}

impl SessionRegistry {
    pub fn new(directory: Arc<dyn RoomDirectory>, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                rooms: Mutex::new(HashMap::new()),
                epoch_source: AtomicU64::new(0),
                directory,
                config,
            }),
        }
    }

    /// Returns the live session for the room, spawning one if there is
    /// none. Two callers racing for an absent room both get the same
    /// session. An entry whose task died (closed channel) is replaced.
    pub fn get_or_create(&self, room_id: &RoomId) -> RoomTx {
        let mut rooms = self.inner.rooms.lock().expect("registry lock poisoned");
        if let Some(handle) = rooms.get(room_id) {
            if !handle.tx.is_closed() {
                return handle.tx.clone();
            }
        }
        let epoch = self.inner.epoch_source.fetch_add(1, Ordering::Relaxed) + 1;
        let tx = spawn_room(
            room_id.clone(),
            epoch,
            self.clone(),
            self.inner.config.clone(),
        );
        rooms.insert(
            room_id.clone(),
            RoomHandle {
                tx: tx.clone(),
                epoch,
            },
        );
        tx
    }

    /// Called by a room task whose drain grace elapsed. Under the same
    /// lock that guards creation, the inbox gets one last look: a queued
    /// message revives the session instead of losing a join to the race.
    /// The epoch check keeps a task from ever retiring a successor's entry.
    pub(crate) fn retire(
        &self,
        room_id: &RoomId,
        epoch: u64,
        rx: &mut Receiver<RoomMessage>,
    ) -> RetireOutcome {
        let mut rooms = self.inner.rooms.lock().expect("registry lock poisoned");
        match rx.try_recv() {
            Ok(message) => RetireOutcome::Revived(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                if rooms.get(room_id).map_or(false, |handle| handle.epoch == epoch) {
                    rooms.remove(room_id);
                }
                RetireOutcome::Retired
            }
        }
    }

    /// Forwarded from the directory's change notification; a room that is
    /// gone or saturated will re-resolve on its refresh interval anyway.
    pub fn notify_roles_changed(&self, room_id: &RoomId) {
        let rooms = self.inner.rooms.lock().expect("registry lock poisoned");
        if let Some(handle) = rooms.get(room_id) {
            let _ = handle.tx.try_send(RoomMessage::RolesChanged);
        }
    }

    pub fn live_rooms(&self) -> Vec<(RoomId, RoomTx)> {
        let rooms = self.inner.rooms.lock().expect("registry lock poisoned");
        rooms
            .iter()
            .filter(|(_, handle)| !handle.tx.is_closed())
            .map(|(room_id, handle)| (room_id.clone(), handle.tx.clone()))
            .collect()
    }

    pub fn directory(&self) -> Arc<dyn RoomDirectory> {
        self.inner.directory.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}
