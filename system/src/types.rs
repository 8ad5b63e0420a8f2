use serde::{Deserialize, Serialize};

pub type RoomId = String;
pub type UserId = uuid::Uuid;
pub type ConnectionId = u64;
pub type EventId = u64;
pub type CommandId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    None,
    View,
    Edit,
    Admin,
}

impl Role {
    pub fn can_edit(&self) -> bool {
        matches!(self, Role::Edit | Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl std::default::Default for Color {
    fn default() -> Self {
        Self { r: 0, g: 0, b: 0 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
}

impl UserProfile {
    /// Guest identity for connections without a valid account token.
    pub fn anonymous() -> Self {
        Self {
            user_id: uuid::Uuid::new_v4(),
            username: "Anonymous".into(),
        }
    }
}
