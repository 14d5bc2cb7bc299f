// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Collaborator interfaces consumed by the security manager.
//!
//! The platform owns configuration persistence and the application-wide
//! lifecycle; the security manager only sees them through these traits.
//! Instances are stored as JSON documents keyed by owner so one provider
//! can serve every manager on the platform.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::outcome::Outcome;
use crate::security::locks::{resilient_read, resilient_write};
use crate::types::State;

/// Read-only view of the hosting application.
pub trait ApplicationContext: Send + Sync {
    /// Current platform lifecycle state.
    fn state(&self) -> State;

    /// Ambient platform settings.
    fn settings(&self) -> HashMap<String, String>;
}

/// Configuration persistence, keyed by owner.
pub trait ConfigurationProvider: Send + Sync {
    /// Retrieve the stored instance for `owner`.
    fn get_instance(&self, owner: &str) -> Outcome<Value>;

    /// Store a new instance for `owner`, returning what was stored.
    fn add_instance(&self, owner: &str, value: Value) -> Outcome<Value>;

    /// Replace the stored instance for `owner`.
    fn update_instance(&self, owner: &str, value: Value) -> Outcome<()>;
}

/// An [`ApplicationContext`] with a fixed state and settings.
#[derive(Debug, Clone)]
pub struct StaticApplicationContext {
    state: State,
    settings: HashMap<String, String>,
}

impl StaticApplicationContext {
    pub fn new(state: State) -> Self {
        Self {
            state,
            settings: HashMap::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

impl Default for StaticApplicationContext {
    fn default() -> Self {
        Self::new(State::Running)
    }
}

impl ApplicationContext for StaticApplicationContext {
    fn state(&self) -> State {
        self.state
    }

    fn settings(&self) -> HashMap<String, String> {
        self.settings.clone()
    }
}

/// Process-local configuration storage.
#[derive(Debug, Default)]
pub struct MemoryConfigurationProvider {
    instances: RwLock<HashMap<String, Value>>,
}

impl MemoryConfigurationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the instance for `owner`.
    pub fn with_instance(self, owner: impl Into<String>, value: Value) -> Self {
        resilient_write(&self.instances).insert(owner.into(), value);
        self
    }
}

impl ConfigurationProvider for MemoryConfigurationProvider {
    fn get_instance(&self, owner: &str) -> Outcome<Value> {
        match resilient_read(&self.instances).get(owner) {
            Some(value) => Outcome::success(value.clone()),
            None => Outcome::failure(format!("no configuration stored for '{}'", owner)),
        }
    }

    fn add_instance(&self, owner: &str, value: Value) -> Outcome<Value> {
        let mut instances = resilient_write(&self.instances);
        if instances.contains_key(owner) {
            return Outcome::failure(format!("configuration for '{}' already exists", owner));
        }
        instances.insert(owner.to_string(), value.clone());
        Outcome::success(value)
    }

    fn update_instance(&self, owner: &str, value: Value) -> Outcome<()> {
        resilient_write(&self.instances).insert(owner.to_string(), value);
        Outcome::success(())
    }
}
