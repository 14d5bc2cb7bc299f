// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Audit events for credential and session changes.
//!
//! Every mutation of the user list or session map emits one of these
//! through `tracing`. Tokens are masked; passwords and digests never
//! appear in an event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Role;
use crate::utils::mask_sensitive;

/// Characters of a session token kept when logging.
const TOKEN_LOG_PREFIX: usize = 8;

/// Security events for audit logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SecurityEvent {
    UserCreated {
        user: String,
        role: Role,
        timestamp: DateTime<Utc>,
    },
    UserUpdated {
        user: String,
        fields: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    UserDeleted {
        user: String,
        sessions_ended: usize,
        timestamp: DateTime<Utc>,
    },
    /// A new session was issued
    SessionStarted {
        token: String,
        user: String,
        expires: DateTime<Utc>,
    },
    /// A login returned the user's existing live session
    SessionResumed {
        token: String,
        user: String,
    },
    SessionEnded {
        token: String,
        user: String,
    },
    SessionExtended {
        token: String,
        expires: DateTime<Utc>,
    },
    /// The purge sweep removed expired sessions
    SessionsPurged {
        removed: usize,
        remaining: usize,
    },
    /// A login attempt was refused
    LoginRejected {
        user: String,
        reason: String,
    },
}

impl SecurityEvent {
    /// Format event for audit log
    pub fn to_audit_string(&self) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        match self {
            Self::UserCreated { user, role, .. } => {
                format!("{} | USER_CREATED | user={} role={}", timestamp, user, role)
            }
            Self::UserUpdated { user, fields, .. } => {
                format!("{} | USER_UPDATED | user={} fields={}", timestamp, user, fields.join(","))
            }
            Self::UserDeleted { user, sessions_ended, .. } => {
                format!("{} | USER_DELETED | user={} sessions_ended={}", timestamp, user, sessions_ended)
            }
            Self::SessionStarted { token, user, expires } => {
                format!(
                    "{} | SESSION_STARTED | session={} user={} expires={}",
                    timestamp,
                    mask_sensitive(token, TOKEN_LOG_PREFIX),
                    user,
                    expires.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
            Self::SessionResumed { token, user } => {
                format!(
                    "{} | SESSION_RESUMED | session={} user={}",
                    timestamp,
                    mask_sensitive(token, TOKEN_LOG_PREFIX),
                    user
                )
            }
            Self::SessionEnded { token, user } => {
                format!(
                    "{} | SESSION_ENDED | session={} user={}",
                    timestamp,
                    mask_sensitive(token, TOKEN_LOG_PREFIX),
                    user
                )
            }
            Self::SessionExtended { token, expires } => {
                format!(
                    "{} | SESSION_EXTENDED | session={} expires={}",
                    timestamp,
                    mask_sensitive(token, TOKEN_LOG_PREFIX),
                    expires.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
            Self::SessionsPurged { removed, remaining } => {
                format!("{} | SESSIONS_PURGED | removed={} remaining={}", timestamp, removed, remaining)
            }
            Self::LoginRejected { user, reason } => {
                format!("{} | LOGIN_REJECTED | user={} reason={}", timestamp, user, reason)
            }
        }
    }

    /// Emit the event at the level matching its severity.
    pub fn emit(&self) {
        match self {
            Self::LoginRejected { .. } => {
                tracing::warn!(target: "security::audit", "{}", self.to_audit_string())
            }
            Self::SessionsPurged { removed: 0, .. } => {
                tracing::debug!(target: "security::audit", "{}", self.to_audit_string())
            }
            _ => tracing::info!(target: "security::audit", "{}", self.to_audit_string()),
        }
    }
}
