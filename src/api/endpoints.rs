//! Endpoint paths consumed from the greenhouse backend, relative to the base URL.

pub mod auth {
    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER: &str = "/auth/register";
    pub const LOGOUT: &str = "/auth/logout";
    pub const PROFILE: &str = "/auth/profile";
    pub const PROFILE_PHOTO: &str = "/auth/profile-photo";

    /// Profile endpoint scoped to a user, used for fetch, update and password change.
    pub fn profile_for(user_id: &str) -> String {
        format!("{PROFILE}?user_id={}", urlencoding::encode(user_id))
    }
}

pub mod rooms {
    pub const LIST: &str = "/api/rooms";
    pub const DASHBOARD: &str = "/api/dashboard";
}

pub mod sensor {
    pub fn latest(room_id: u32) -> String {
        format!("/api/sensor?action=sensor&room_id={room_id}")
    }

    pub fn history(room_id: u32, limit: usize) -> String {
        format!("/api/sensor?action=history&room_id={room_id}&limit={limit}")
    }

    pub fn actuators(room_id: u32) -> String {
        format!("/api/sensor?action=fan&room_id={room_id}")
    }

    pub fn control(room_id: u32) -> String {
        format!("/api/sensor?action=control&room_id={room_id}")
    }
}

pub mod settings {
    pub fn for_room(room_id: u32) -> String {
        format!("/api/settings?room_id={room_id}")
    }
}

pub const HEALTH: &str = "/api/test";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_paths_carry_room_id() {
        assert_eq!(sensor::latest(3), "/api/sensor?action=sensor&room_id=3");
        assert_eq!(sensor::actuators(1), "/api/sensor?action=fan&room_id=1");
        assert_eq!(sensor::history(2, 10), "/api/sensor?action=history&room_id=2&limit=10");
    }

    #[test]
    fn profile_user_id_is_encoded() {
        assert_eq!(auth::profile_for("a b"), "/auth/profile?user_id=a%20b");
    }
}
