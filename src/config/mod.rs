// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Security manager configuration.
//!
//! [`SecurityManagerConfiguration`] is the one persisted object: session
//! policy plus the durable user list. It is loaded from a
//! [`ConfigurationProvider`] at start and written back after every user
//! mutation. [`configuration_definition`] describes it to the platform's
//! configuration UI.
//!
//! ## Defaults
//!
//! | Setting                | Default   |
//! |------------------------|-----------|
//! | `SessionLength`        | 900 s     |
//! | `SessionPurgeInterval` | 900000 ms |
//! | `SlidingSessions`      | true      |
//! | `Users`                | `admin` / `admin`, Administrator |

pub mod file;
pub mod provider;

pub use file::FileConfigurationProvider;
pub use provider::{
    ApplicationContext, ConfigurationProvider, MemoryConfigurationProvider, StaticApplicationContext,
};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::outcome::Outcome;
use crate::security::credentials::User;
use crate::security::hash::compute_sha512_hash;
use crate::types::Role;

/// Key under which the configuration is stored in a [`ConfigurationProvider`]
pub const CONFIGURATION_OWNER: &str = "SecurityManager";

/// Default session lifetime in seconds (15 minutes)
pub const DEFAULT_SESSION_LENGTH_SECS: u64 = 900;

/// Default purge interval in milliseconds (15 minutes)
pub const DEFAULT_SESSION_PURGE_INTERVAL_MS: u64 = 900_000;

/// Name of the seeded administrative account
pub const DEFAULT_ADMIN_NAME: &str = "admin";

/// Persisted security manager configuration.
///
/// Field names serialize in PascalCase to match the platform's stored
/// configuration documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityManagerConfiguration {
    /// Lifetime granted by each session issuance or extension, in seconds
    pub session_length: u64,

    /// Period between expired-session sweeps, in milliseconds
    pub session_purge_interval: u64,

    /// Whether extending a live session is permitted
    #[serde(default = "default_sliding_sessions")]
    pub sliding_sessions: bool,

    /// The durable user list
    #[serde(default)]
    pub users: Vec<User>,
}

fn default_sliding_sessions() -> bool {
    true
}

impl Default for SecurityManagerConfiguration {
    fn default() -> Self {
        Self {
            session_length: DEFAULT_SESSION_LENGTH_SECS,
            session_purge_interval: DEFAULT_SESSION_PURGE_INTERVAL_MS,
            sliding_sessions: true,
            users: vec![User::new(
                DEFAULT_ADMIN_NAME,
                "Administrator",
                "admin@localhost",
                compute_sha512_hash("admin"),
                Role::Administrator,
            )],
        }
    }
}

impl SecurityManagerConfiguration {
    /// Session lifetime as a chrono duration, for timestamp arithmetic.
    pub fn session_length(&self) -> chrono::Duration {
        let secs = i64::try_from(self.session_length).unwrap_or(i64::MAX);
        chrono::Duration::seconds(secs.min(i64::MAX / 1000))
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_millis(self.session_purge_interval)
    }

    /// Check the invariants an adopted configuration must hold.
    pub fn validate(&self) -> Result<(), String> {
        if self.session_length == 0 {
            return Err("SessionLength must be positive".to_string());
        }
        if self.session_purge_interval == 0 {
            return Err("SessionPurgeInterval must be positive".to_string());
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            if !seen.insert(user.name.as_str()) {
                return Err(format!("duplicate user name '{}'", user.name));
            }
        }
        Ok(())
    }
}

/// Write `config` back through `provider` under [`CONFIGURATION_OWNER`].
pub fn persist_configuration(
    provider: &dyn ConfigurationProvider,
    config: &SecurityManagerConfiguration,
) -> Outcome<()> {
    match serde_json::to_value(config) {
        Ok(value) => provider.update_instance(CONFIGURATION_OWNER, value),
        Err(e) => Outcome::failure(format!("failed to serialize configuration: {}", e)),
    }
}

/// Static metadata consumed by the platform's configuration UI.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationDefinition {
    /// UI form layout (JSON)
    pub form: String,
    /// UI schema (JSON)
    pub schema: String,
    /// Name of the configuration model type
    pub model: String,
    pub default_configuration: SecurityManagerConfiguration,
}

/// Describe the security manager configuration for the configuration UI.
pub fn configuration_definition() -> ConfigurationDefinition {
    let form = serde_json::json!([
        "SessionLength",
        "SessionPurgeInterval",
        "SlidingSessions",
        {
            "key": "Users",
            "type": "array",
            "items": ["Users[].Name", "Users[].DisplayName", "Users[].Email", "Users[].Role"]
        }
    ]);

    let schema = serde_json::json!({
        "type": "object",
        "title": "SecurityManagerConfiguration",
        "properties": {
            "SessionLength": {
                "title": "Session Length (seconds)",
                "type": "integer",
                "minimum": 1
            },
            "SessionPurgeInterval": {
                "title": "Session Purge Interval (milliseconds)",
                "type": "integer",
                "minimum": 1
            },
            "SlidingSessions": {
                "title": "Sliding Sessions",
                "type": "boolean"
            },
            "Users": {
                "title": "Users",
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "Name": { "title": "Name", "type": "string" },
                        "DisplayName": { "title": "Display Name", "type": "string" },
                        "Email": { "title": "Email", "type": "string" },
                        "PasswordHash": { "title": "Password Hash", "type": "string" },
                        "Role": {
                            "title": "Role",
                            "type": "string",
                            "enum": ["Reader", "ReadWriter", "Administrator"]
                        }
                    },
                    "required": ["Name", "DisplayName", "Email", "PasswordHash", "Role"]
                }
            }
        },
        "required": ["SessionLength", "SessionPurgeInterval"]
    });

    ConfigurationDefinition {
        form: serde_json::to_string_pretty(&form).unwrap_or_else(|_| form.to_string()),
        schema: serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string()),
        model: "SecurityManagerConfiguration".to_string(),
        default_configuration: SecurityManagerConfiguration::default(),
    }
}
