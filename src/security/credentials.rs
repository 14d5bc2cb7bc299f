// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Credential store.
//!
//! Owns the user list inside the shared [`SecurityManagerConfiguration`].
//! Each mutation is applied to a copy of the configuration, persisted
//! through the [`ConfigurationProvider`], and only then committed, so a
//! persistence failure leaves the in-memory user list untouched.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use super::events::SecurityEvent;
use super::hash::compute_sha512_hash;
use super::locks::{resilient_read, resilient_write};
use super::validation::{validate_display_name, validate_email, validate_name, validate_password};
use crate::clock::Clock;
use crate::config::{persist_configuration, ConfigurationProvider, SecurityManagerConfiguration};
use crate::outcome::Outcome;
use crate::types::Role;

/// Configuration shared between the credential store and the manager.
/// `None` until the manager has been started once.
pub type SharedConfiguration = Arc<RwLock<Option<SecurityManagerConfiguration>>>;

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    /// Unique, case-sensitive, immutable once created
    pub name: String,
    pub display_name: String,
    pub email: String,
    /// SHA-512 digest of the password, never the password itself
    pub password_hash: String,
    pub role: Role,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role,
        }
    }
}

/// Fields to change in [`CredentialStore::update_user`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none() && self.password.is_none() && self.role.is_none()
    }

    /// Names of the supplied fields, for audit logging.
    fn field_names(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.display_name.is_some() {
            fields.push("display_name".to_string());
        }
        if self.email.is_some() {
            fields.push("email".to_string());
        }
        if self.password.is_some() {
            fields.push("password".to_string());
        }
        if self.role.is_some() {
            fields.push("role".to_string());
        }
        fields
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(display_name) = &self.display_name {
            validate_display_name(display_name).map_err(|e| e.to_string())?;
        }
        if let Some(email) = &self.email {
            validate_email(email).map_err(|e| e.to_string())?;
        }
        if let Some(password) = &self.password {
            validate_password(password).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

/// User CRUD over the shared configuration.
pub struct CredentialStore {
    configuration: SharedConfiguration,
    provider: Arc<dyn ConfigurationProvider>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(
        configuration: SharedConfiguration,
        provider: Arc<dyn ConfigurationProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            configuration,
            provider,
            clock,
        }
    }

    /// Create a user. The password is stored as its digest.
    pub fn create_user(
        &self,
        name: &str,
        display_name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Outcome<User> {
        let validation = validate_name(name)
            .and_then(|_| validate_display_name(display_name))
            .and_then(|_| validate_email(email))
            .and_then(|_| validate_password(password));
        if let Err(e) = validation {
            return Outcome::failure(e.to_string());
        }

        let user = User::new(name, display_name, email, compute_sha512_hash(password), role);

        let outcome = self.mutate(|config| {
            if config.users.iter().any(|u| u.name == name) {
                return Err(format!("user '{}' already exists", name));
            }
            config.users.push(user.clone());
            Ok(user.clone())
        });

        if outcome.is_success() {
            SecurityEvent::UserCreated {
                user: name.to_string(),
                role,
                timestamp: self.clock.now(),
            }
            .emit();
        }
        outcome
    }

    /// Overwrite the supplied fields of an existing user.
    pub fn update_user(&self, name: &str, update: UserUpdate) -> Outcome<User> {
        if update.is_empty() {
            return Outcome::failure("nothing to update");
        }
        if let Err(message) = update.validate() {
            return Outcome::failure(message);
        }

        let fields = update.field_names();
        let outcome = self.mutate(|config| {
            let user = config
                .users
                .iter_mut()
                .find(|u| u.name == name)
                .ok_or_else(|| format!("user '{}' not found", name))?;

            if let Some(display_name) = &update.display_name {
                user.display_name = display_name.clone();
            }
            if let Some(email) = &update.email {
                user.email = email.clone();
            }
            if let Some(password) = &update.password {
                user.password_hash = compute_sha512_hash(password);
            }
            if let Some(role) = update.role {
                user.role = role;
            }
            Ok(user.clone())
        });

        if outcome.is_success() {
            SecurityEvent::UserUpdated {
                user: name.to_string(),
                fields,
                timestamp: self.clock.now(),
            }
            .emit();
        }
        outcome
    }

    /// Remove a user. Session cleanup is the caller's concern.
    pub fn delete_user(&self, name: &str) -> Outcome<()> {
        self.mutate(|config| {
            let before = config.users.len();
            config.users.retain(|u| u.name != name);
            if config.users.len() == before {
                return Err(format!("user '{}' not found", name));
            }
            Ok(())
        })
    }

    pub fn find_user(&self, name: &str) -> Option<User> {
        resilient_read(&self.configuration)
            .as_ref()
            .and_then(|config| config.users.iter().find(|u| u.name == name).cloned())
    }

    /// Run `f` on user `name` and the adopted configuration under the
    /// configuration read lock. `None` if the user does not exist.
    ///
    /// No mutation commits while `f` runs, so a `delete_user` racing with
    /// `f` is ordered after it.
    pub fn with_user<R>(
        &self,
        name: &str,
        f: impl FnOnce(&User, &SecurityManagerConfiguration) -> R,
    ) -> Option<R> {
        let guard = resilient_read(&self.configuration);
        let config = guard.as_ref()?;
        let user = config.users.iter().find(|u| u.name == name)?;
        Some(f(user, config))
    }

    /// Snapshot of the user list, `None` if no configuration has been adopted yet.
    pub fn users(&self) -> Option<Vec<User>> {
        resilient_read(&self.configuration)
            .as_ref()
            .map(|config| config.users.clone())
    }

    /// Apply `f` to a copy of the configuration, persist it, then commit.
    ///
    /// The write lock is held across persistence so concurrent mutations
    /// cannot interleave between the check and the commit.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut SecurityManagerConfiguration) -> Result<T, String>,
    ) -> Outcome<T> {
        let mut guard = resilient_write(&self.configuration);
        let Some(current) = guard.as_ref() else {
            return Outcome::failure("configuration has not been loaded");
        };

        let mut next = current.clone();
        let value = match f(&mut next) {
            Ok(value) => value,
            Err(message) => return Outcome::failure(message),
        };

        let persisted = persist_configuration(self.provider.as_ref(), &next);
        if let Outcome::Failure(mut messages) = persisted {
            messages.insert(0, "failed to persist configuration".to_string());
            return Outcome::Failure(messages);
        }

        *guard = Some(next);
        Outcome::success(value)
    }
}
