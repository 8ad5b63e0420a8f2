use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use system::uuid::Uuid;
use system::{Role, RoomId, UserId, UserProfile};

pub type RoleMap = HashMap<UserId, Role>;

/// Room metadata as the external persistence service hands it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMeta {
    pub room_id: RoomId,
    pub name: String,
    pub is_public: bool,
    pub owner: Option<UserId>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("room {0} is not registered")]
    UnknownRoom(RoomId),
    #[error("failed to read rooms file: {0}")]
    Io(#[from] std::io::Error),
    #[error("rooms file is malformed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Account service face: token in, identity out.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<UserProfile>;
}

/// Room/role persistence face. Room sessions re-query this instead of
/// trusting a stale cache, so revocations reach a live room.
pub trait RoomDirectory: Send + Sync {
    fn room_meta(&self, room_id: &RoomId) -> Option<RoomMeta>;
    fn role_map(&self, room_id: &RoomId) -> Result<RoleMap, DirectoryError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room_id: RoomId,
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub roles: RoleMap,
}

impl RoomRecord {
    fn meta(&self) -> RoomMeta {
        RoomMeta {
            room_id: self.room_id.clone(),
            name: self.name.clone(),
            is_public: self.is_public,
            owner: self.owner,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    rooms: Vec<RoomRecord>,
    #[serde(default)]
    tokens: HashMap<String, UserProfile>,
}

#[derive(Default)]
struct DirectoryState {
    rooms: HashMap<RoomId, RoomRecord>,
    tokens: HashMap<String, UserProfile>,
}

type RolesChangedHook = Box<dyn Fn(&RoomId) + Send + Sync>;

/// The in-process stand-in for the external room/account services. Real
/// deployments put a database behind these traits; the engine only ever
/// sees the narrow interface.
#[derive(Default)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
    roles_changed: RwLock<Option<RolesChangedHook>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, DirectoryError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, DirectoryError> {
        let file: DirectoryFile = serde_json::from_str(text)?;
        let directory = Self::new();
        {
            let mut state = directory.state.write().expect("directory lock poisoned");
            for record in file.rooms {
                state.rooms.insert(record.room_id.clone(), record);
            }
            state.tokens = file.tokens;
        }
        Ok(directory)
    }

    /// A newly created room gets a short shareable code, the way the
    /// upstream service generates them.
    pub fn create_demo_room(&self) -> RoomId {
        let code: RoomId = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(6)
            .collect::<String>()
            .to_uppercase();
        self.insert_room(RoomRecord {
            room_id: code.clone(),
            name: "Demo board".into(),
            is_public: true,
            owner: None,
            roles: RoleMap::new(),
        });
        code
    }

    pub fn insert_room(&self, record: RoomRecord) {
        let mut state = self.state.write().expect("directory lock poisoned");
        state.rooms.insert(record.room_id.clone(), record);
    }

    pub fn register_token(&self, token: &str, profile: UserProfile) {
        let mut state = self.state.write().expect("directory lock poisoned");
        state.tokens.insert(token.to_owned(), profile);
    }

    pub fn set_role(&self, room_id: &RoomId, user_id: UserId, role: Role) {
        {
            let mut state = self.state.write().expect("directory lock poisoned");
            if let Some(record) = state.rooms.get_mut(room_id) {
                record.roles.insert(user_id, role);
            }
        }
        self.notify_roles_changed(room_id);
    }

    pub fn revoke_role(&self, room_id: &RoomId, user_id: &UserId) {
        {
            let mut state = self.state.write().expect("directory lock poisoned");
            if let Some(record) = state.rooms.get_mut(room_id) {
                record.roles.remove(user_id);
            }
        }
        self.notify_roles_changed(room_id);
    }

    pub fn set_roles_changed_hook<F>(&self, hook: F)
    where
        F: Fn(&RoomId) + Send + Sync + 'static,
    {
        *self.roles_changed.write().expect("directory lock poisoned") = Some(Box::new(hook));
    }

    fn notify_roles_changed(&self, room_id: &RoomId) {
        if let Some(hook) = self
            .roles_changed
            .read()
            .expect("directory lock poisoned")
            .as_ref()
        {
            hook(room_id);
        }
    }
}

impl Authenticator for InMemoryDirectory {
    fn authenticate(&self, token: &str) -> Option<UserProfile> {
        let state = self.state.read().expect("directory lock poisoned");
        state.tokens.get(token).cloned()
    }
}

impl RoomDirectory for InMemoryDirectory {
    fn room_meta(&self, room_id: &RoomId) -> Option<RoomMeta> {
        let state = self.state.read().expect("directory lock poisoned");
        state.rooms.get(room_id).map(RoomRecord::meta)
    }

    fn role_map(&self, room_id: &RoomId) -> Result<RoleMap, DirectoryError> {
        let state = self.state.read().expect("directory lock poisoned");
        state
            .rooms
            .get(room_id)
            .map(|record| record.roles.clone())
            .ok_or_else(|| DirectoryError::UnknownRoom(room_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_loads_rooms_and_tokens_from_json() {
        let owner = Uuid::new_v4();
        let editor = Uuid::new_v4();
        let text = format!(
            r#"{{
                "rooms": [
                    {{
                        "room_id": "ABC123",
                        "name": "Planning",
                        "is_public": false,
                        "owner": "{owner}",
                        "roles": {{ "{editor}": "Edit" }}
                    }}
                ],
                "tokens": {{
                    "secret": {{ "user_id": "{editor}", "username": "eve" }}
                }}
            }}"#
        );
        let directory = InMemoryDirectory::from_json(&text).unwrap();

        let meta = directory.room_meta(&"ABC123".to_string()).unwrap();
        assert!(!meta.is_public);
        assert_eq!(meta.owner, Some(owner));
        let roles = directory.role_map(&"ABC123".to_string()).unwrap();
        assert_eq!(roles.get(&editor), Some(&Role::Edit));

        let profile = directory.authenticate("secret").unwrap();
        assert_eq!(profile.user_id, editor);
        assert_eq!(profile.username, "eve");
        assert!(directory.authenticate("wrong").is_none());
    }

    #[test]
    fn unknown_room_fails_role_lookup() {
        let directory = InMemoryDirectory::new();
        assert!(directory.room_meta(&"nope".to_string()).is_none());
        assert!(matches!(
            directory.role_map(&"nope".to_string()),
            Err(DirectoryError::UnknownRoom(_))
        ));
    }

    #[test]
    fn role_changes_fire_the_notification_hook() {
        let directory = InMemoryDirectory::new();
        let room = directory.create_demo_room();
        let hits = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = hits.clone();
        directory.set_roles_changed_hook(move |_| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let user = Uuid::new_v4();
        directory.set_role(&room, user, Role::Edit);
        directory.revoke_role(&room, &user);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
