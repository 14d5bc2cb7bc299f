// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Live login sessions.
//!
//! Sessions are keyed by an opaque random token and refer to their user
//! by name only. The store holds at most one live session per user:
//! issuing a session for a user who already has one returns the existing
//! session. Expiry is judged against the time passed in by the caller so
//! the manager's [`Clock`](crate::clock::Clock) is the only time source.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use super::credentials::User;
use super::locks::{resilient_read, resilient_write};
use crate::outcome::Outcome;
use crate::types::Role;

/// Random bytes per session token (hex-encoded to 64 characters)
const TOKEN_BYTES: usize = 32;

/// Who a session was issued to, captured at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub role: Role,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// A login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl Session {
    /// True once `expires` lies before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }
}

/// Result of [`SessionStore::issue_or_resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issued {
    /// A new session was created
    New(Session),
    /// The user's existing live session was returned
    Resumed(Session),
}

impl Issued {
    pub fn session(&self) -> &Session {
        match self {
            Issued::New(session) | Issued::Resumed(session) => session,
        }
    }

    pub fn into_session(self) -> Session {
        match self {
            Issued::New(session) | Issued::Resumed(session) => session,
        }
    }
}

/// `start + length`, saturating at the latest representable instant.
pub(crate) fn expiry_after(start: DateTime<Utc>, length: Duration) -> DateTime<Utc> {
    start
        .checked_add_signed(length)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Concurrency-safe session map, keyed by token.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `user`'s live session, or issue a new one expiring at `now + length`.
    ///
    /// The lookup and the insert happen under one write lock, so concurrent
    /// logins for the same user always yield the same token.
    pub fn issue_or_resume(&self, user: &User, now: DateTime<Utc>, length: Duration) -> Issued {
        let mut sessions = resilient_write(&self.sessions);

        if let Some(existing) = sessions
            .values()
            .find(|s| s.identity.name == user.name && !s.is_expired_at(now))
        {
            return Issued::Resumed(existing.clone());
        }

        let mut token = generate_token();
        while sessions.contains_key(&token) {
            token = generate_token();
        }

        let session = Session {
            token: token.clone(),
            identity: Identity::from(user),
            created: now,
            expires: expiry_after(now, length),
        };
        sessions.insert(token, session.clone());
        Issued::New(session)
    }

    pub fn find(&self, token: &str) -> Option<Session> {
        resilient_read(&self.sessions).get(token).cloned()
    }

    /// The live session held by `name`, if any.
    pub fn find_by_user(&self, name: &str, now: DateTime<Utc>) -> Option<Session> {
        resilient_read(&self.sessions)
            .values()
            .find(|s| s.identity.name == name && !s.is_expired_at(now))
            .cloned()
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        resilient_write(&self.sessions).remove(token)
    }

    /// Remove every session, live or expired, held by `name`.
    pub fn remove_user_sessions(&self, name: &str) -> usize {
        let mut sessions = resilient_write(&self.sessions);
        let before = sessions.len();
        sessions.retain(|_, s| s.identity.name != name);
        before - sessions.len()
    }

    /// Push the stored session's expiry to `now + length`.
    ///
    /// Fails if the token is unknown or the stored session has already
    /// expired. With `sliding` off the session is left unchanged and a
    /// warning is returned instead.
    pub fn extend(&self, token: &str, now: DateTime<Utc>, length: Duration, sliding: bool) -> Outcome<Session> {
        let mut sessions = resilient_write(&self.sessions);
        let Some(session) = sessions.get_mut(token) else {
            return Outcome::failure("session not found");
        };

        if session.is_expired_at(now) {
            return Outcome::failure("session has expired");
        }
        if !sliding {
            return Outcome::warning(session.clone(), "sliding sessions are disabled");
        }

        session.expires = expiry_after(now, length);
        Outcome::success(session.clone())
    }

    /// Remove every session expired at `now`. Returns the number removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = resilient_write(&self.sessions);
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        before - sessions.len()
    }

    /// Drop every session. Returns the number dropped.
    pub fn clear(&self) -> usize {
        let mut sessions = resilient_write(&self.sessions);
        let count = sessions.len();
        sessions.clear();
        count
    }

    /// All sessions, oldest first.
    pub fn snapshot(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = resilient_read(&self.sessions).values().cloned().collect();
        sessions.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.token.cmp(&b.token)));
        sessions
    }

    pub fn len(&self) -> usize {
        resilient_read(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
