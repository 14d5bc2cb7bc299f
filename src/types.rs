// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Canonical types shared across the security manager.

use serde::{Deserialize, Serialize};

/// Capability level attached to a user and to the sessions issued for them.
/// Ordered by capability: Reader < ReadWriter < Administrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May read platform data
    Reader,
    /// May read and write platform data
    ReadWriter,
    /// Full control, including user management
    Administrator,
}

impl Role {
    /// Every defined role, lowest capability first.
    pub const ALL: [Role; 3] = [Role::Reader, Role::ReadWriter, Role::Administrator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::ReadWriter => "readwriter",
            Self::Administrator => "administrator",
        }
    }

    /// Parse a role name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "reader" => Some(Self::Reader),
            "readwriter" | "read-writer" | "read_writer" => Some(Self::ReadWriter),
            "administrator" | "admin" => Some(Self::Administrator),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("unknown role '{}' (expected reader, readwriter or administrator)", s)
        })
    }
}

/// Lifecycle state of a manager.
///
/// `Initialized -> Starting -> Running -> Stopping -> Stopped`, and
/// `Stopped -> Starting` on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Initialized,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Initialized => write!(f, "INITIALIZED"),
            State::Starting => write!(f, "STARTING"),
            State::Running => write!(f, "RUNNING"),
            State::Stopping => write!(f, "STOPPING"),
            State::Stopped => write!(f, "STOPPED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("Reader"), Some(Role::Reader));
        assert_eq!(Role::parse("read-writer"), Some(Role::ReadWriter));
        assert_eq!(Role::parse("admin"), Some(Role::Administrator));
        assert_eq!(Role::parse("root"), None);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Reader < Role::ReadWriter);
        assert!(Role::ReadWriter < Role::Administrator);
        assert_eq!(Role::ALL.len(), 3);
    }

    #[test]
    fn test_role_serializes_as_variant_name() {
        let json = serde_json::to_string(&Role::ReadWriter).unwrap();
        assert_eq!(json, "\"ReadWriter\"");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", State::Initialized), "INITIALIZED");
        assert_eq!(format!("{}", State::Running), "RUNNING");
        assert_eq!(format!("{}", State::Stopped), "STOPPED");
    }
}
