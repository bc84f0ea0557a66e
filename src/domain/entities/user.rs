//! User identity and presence status.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::envelope::{SYSTEM_SENDER_ID, SYSTEM_SENDER_NAME};

/// An already-authenticated identity, as handed to the relay by the
/// HTTP, socket and RPC front doors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }

    pub fn system() -> Self {
        Self::new(SYSTEM_SENDER_ID, SYSTEM_SENDER_NAME)
    }
}

/// User presence status, matching the `users.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    #[default]
    Offline,
    Away,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Away => "away",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
