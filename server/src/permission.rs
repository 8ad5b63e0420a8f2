use system::{Role, UserId};

use crate::directory::{RoleMap, RoomMeta};

/// Effective role of a user in a room, as a pure function of what the
/// external service reported: the owner is admin, an explicit grant wins
/// over the defaults, and public rooms admit everyone else as viewers.
pub fn resolve(user_id: &UserId, meta: &RoomMeta, roles: &RoleMap) -> Role {
    if meta.owner.as_ref() == Some(user_id) {
        return Role::Admin;
    }
    if let Some(role) = roles.get(user_id) {
        return *role;
    }
    if meta.is_public {
        Role::View
    } else {
        Role::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use system::uuid::Uuid;

    fn meta(is_public: bool, owner: Option<UserId>) -> RoomMeta {
        RoomMeta {
            room_id: "R".into(),
            name: "room".into(),
            is_public,
            owner,
        }
    }

    #[test]
    fn owner_is_admin_regardless_of_role_map() {
        let owner = Uuid::new_v4();
        let mut roles = RoleMap::new();
        roles.insert(owner, Role::View);
        assert_eq!(resolve(&owner, &meta(false, Some(owner)), &roles), Role::Admin);
    }

    #[test]
    fn explicit_grant_wins_over_public_default() {
        let user = Uuid::new_v4();
        let mut roles = RoleMap::new();
        roles.insert(user, Role::Edit);
        assert_eq!(resolve(&user, &meta(true, None), &roles), Role::Edit);
    }

    #[test]
    fn public_rooms_admit_strangers_as_viewers() {
        let user = Uuid::new_v4();
        assert_eq!(resolve(&user, &meta(true, None), &RoleMap::new()), Role::View);
    }

    #[test]
    fn private_rooms_reject_strangers() {
        let user = Uuid::new_v4();
        assert_eq!(resolve(&user, &meta(false, None), &RoleMap::new()), Role::None);
    }
}
