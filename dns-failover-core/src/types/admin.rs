//! 管理员类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role written for users registered through `/id`.
pub const ROLE_ADMIN: &str = "admin";

/// A chat user known to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    /// Telegram user id.
    pub uid: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub remark: String,
    /// Who approved or added this user (0 = self-registered).
    #[serde(default)]
    pub added_by: i64,
    /// Banned admins get no commands and no notifications.
    #[serde(default)]
    pub is_ban: bool,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::utils::datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Admin {
    /// Display name: `@username`, else first and last name, else the uid.
    #[must_use]
    pub fn display_name(&self) -> String {
        if !self.username.is_empty() {
            return format!("@{}", self.username);
        }
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.uid.to_string()
        } else {
            full.to_string()
        }
    }
}

/// Profile fields reported by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatUser {
    pub uid: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Configured owner: always active, manages admins.
    SuperAdmin,
    Admin,
    /// Known but banned (or awaiting approval).
    Banned,
    Unknown,
}

impl Access {
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

/// Outcome of `/id` self-registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    SuperAdmin,
    /// New row written as a banned admin pending approval.
    Pending(Admin),
    /// Row already present; left untouched.
    Existing(Admin),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(username: &str, first: &str, last: &str) -> Admin {
        Admin {
            uid: 42,
            username: username.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            role: ROLE_ADMIN.to_string(),
            remark: String::new(),
            added_by: 0,
            is_ban: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn display_name_prefers_username() {
        assert_eq!(admin("ops", "A", "B").display_name(), "@ops");
        assert_eq!(admin("", "Ada", "").display_name(), "Ada");
        assert_eq!(admin("", "", "").display_name(), "42");
    }
}
