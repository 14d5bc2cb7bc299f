// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The security manager facade.
//!
//! [`SecurityManager`] ties the credential store, the session store and
//! the purge scheduler to one lifecycle. Every mutating operation is
//! refused with "not running" outside `Running`; lookups work in any
//! state. Business failures come back as [`Outcome`]s. The only error
//! that escapes is [`StartupError`], when `start` can neither retrieve
//! nor seed the configuration.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use security_manager::{
//!     MemoryConfigurationProvider, Role, SecurityManager, StaticApplicationContext,
//! };
//!
//! let manager = SecurityManager::new(
//!     Arc::new(StaticApplicationContext::default()),
//!     Arc::new(MemoryConfigurationProvider::new()),
//! );
//! manager.start().expect("configuration available");
//!
//! manager.create_user("operator", "Operator", "op@plant.local", "secret", Role::ReadWriter);
//! let session = manager.start_session("operator", "secret").into_value().unwrap();
//! assert_eq!(session.identity.name, "operator");
//!
//! manager.stop();
//! ```

use std::sync::{Arc, Mutex, RwLock};

use chrono::Duration;

use super::credentials::{CredentialStore, SharedConfiguration, User, UserUpdate};
use super::events::SecurityEvent;
use super::hash::verify_password;
use super::lifecycle::{Lifecycle, Transition};
use super::locks::{resilient_lock, resilient_read, resilient_write};
use super::purge::{PurgeScheduler, ThreadTicker, Ticker};
use super::session::{Issued, Session, SessionStore};
use crate::clock::{Clock, SystemClock};
use crate::config::{
    configuration_definition, persist_configuration, ApplicationContext, ConfigurationDefinition,
    ConfigurationProvider, SecurityManagerConfiguration, CONFIGURATION_OWNER,
};
use crate::error::StartupError;
use crate::outcome::Outcome;
use crate::types::{Role, State};

/// Evaluates to a guard pinning the manager at `Running`, or returns early
/// with a "not running" failure.
macro_rules! require_running {
    ($self:expr) => {
        match $self.lifecycle.running() {
            Ok(guard) => guard,
            Err(message) => return Outcome::failure(message),
        }
    };
}

/// Builds a [`SecurityManager`] with a custom clock or purge ticker.
pub struct SecurityManagerBuilder {
    app: Arc<dyn ApplicationContext>,
    provider: Arc<dyn ConfigurationProvider>,
    clock: Arc<dyn Clock>,
    ticker: Arc<dyn Ticker>,
}

impl SecurityManagerBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ticker(mut self, ticker: Arc<dyn Ticker>) -> Self {
        self.ticker = ticker;
        self
    }

    pub fn build(self) -> SecurityManager {
        let configuration: SharedConfiguration = Arc::new(RwLock::new(None));
        let sessions = Arc::new(SessionStore::new());

        SecurityManager {
            app: self.app,
            credentials: CredentialStore::new(
                Arc::clone(&configuration),
                Arc::clone(&self.provider),
                Arc::clone(&self.clock),
            ),
            purge: PurgeScheduler::new(Arc::clone(&sessions), Arc::clone(&self.clock), self.ticker),
            provider: self.provider,
            clock: self.clock,
            lifecycle: Lifecycle::new(),
            configuration,
            sessions,
            setup_done: Mutex::new(false),
        }
    }
}

/// Owns users and sessions for the platform.
pub struct SecurityManager {
    app: Arc<dyn ApplicationContext>,
    provider: Arc<dyn ConfigurationProvider>,
    clock: Arc<dyn Clock>,
    lifecycle: Lifecycle,
    configuration: SharedConfiguration,
    credentials: CredentialStore,
    sessions: Arc<SessionStore>,
    purge: PurgeScheduler,
    setup_done: Mutex<bool>,
}

impl SecurityManager {
    /// Manager on the system clock with a background purge thread.
    pub fn new(app: Arc<dyn ApplicationContext>, provider: Arc<dyn ConfigurationProvider>) -> Self {
        Self::builder(app, provider).build()
    }

    pub fn builder(
        app: Arc<dyn ApplicationContext>,
        provider: Arc<dyn ConfigurationProvider>,
    ) -> SecurityManagerBuilder {
        SecurityManagerBuilder {
            app,
            provider,
            clock: Arc::new(SystemClock),
            ticker: Arc::new(ThreadTicker::new()),
        }
    }

    /// Describe the configuration for the platform's configuration UI.
    pub fn configuration_definition() -> ConfigurationDefinition {
        configuration_definition()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub fn state(&self) -> State {
        self.lifecycle.state()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Seed the default configuration if the provider has none.
    ///
    /// Runs once; later calls return `Success` without touching the
    /// provider. A seeding failure is reported, not fatal, and leaves the
    /// next call free to retry.
    pub fn setup(&self) -> Outcome<()> {
        let mut done = resilient_lock(&self.setup_done);
        if *done {
            return Outcome::success(());
        }

        if self.provider.get_instance(CONFIGURATION_OWNER).is_failure() {
            let seeded = match serde_json::to_value(SecurityManagerConfiguration::default()) {
                Ok(value) => self.provider.add_instance(CONFIGURATION_OWNER, value),
                Err(e) => Outcome::failure(format!("failed to serialize default configuration: {}", e)),
            };
            if let Outcome::Failure(messages) = seeded {
                tracing::warn!(
                    target: "security::lifecycle",
                    "Could not seed default security configuration: {}",
                    messages.join("; ")
                );
                return Outcome::Failure(messages);
            }
            tracing::info!(target: "security::lifecycle", "Seeded default security configuration");
        }

        *done = true;
        Outcome::success(())
    }

    /// Load the configuration and begin accepting requests.
    ///
    /// Starting a running manager is a no-op. Starting while a start or
    /// stop is in flight fails. If the configuration can be neither
    /// retrieved nor seeded, the manager returns to its previous state
    /// and a [`StartupError`] is returned.
    pub fn start(&self) -> Result<Outcome<()>, StartupError> {
        let previous = match self.lifecycle.begin_start() {
            Transition::Begun(previous) => previous,
            Transition::Unchanged => return Ok(Outcome::success(())),
            Transition::Busy(state) => {
                return Ok(Outcome::failure(format!("cannot start while {}", state)));
            }
        };

        let platform = self.app.state();
        if !matches!(platform, State::Starting | State::Running) {
            self.lifecycle.finish(previous);
            return Ok(Outcome::failure(format!("application is {}", platform)));
        }

        // Failure here is retried by the fallback in load_configuration
        let _ = self.setup();

        let config = match self.load_configuration() {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(target: "security::lifecycle", "{}", e);
                self.lifecycle.finish(previous);
                return Err(e);
            }
        };

        let interval = config.purge_interval();
        tracing::info!(
            target: "security::lifecycle",
            users = config.users.len(),
            session_length_secs = config.session_length,
            purge_interval_ms = config.session_purge_interval,
            sliding = config.sliding_sessions,
            "Security configuration loaded"
        );
        *resilient_write(&self.configuration) = Some(config);

        self.purge.start(interval);
        self.lifecycle.finish(State::Running);
        Ok(Outcome::success(()))
    }

    /// Retrieve the stored configuration, seeding the default if retrieval fails.
    fn load_configuration(&self) -> Result<SecurityManagerConfiguration, StartupError> {
        let retrieved = self
            .provider
            .get_instance(CONFIGURATION_OWNER)
            .into_result()
            .and_then(decode_configuration);

        let retrieve = match retrieved {
            Ok(config) => return Ok(config),
            Err(messages) => messages,
        };

        tracing::warn!(
            target: "security::lifecycle",
            "Security configuration unavailable ({}); seeding defaults",
            retrieve.join("; ")
        );

        let default = SecurityManagerConfiguration::default();
        let seeded = match serde_json::to_value(&default) {
            Ok(value) => self.provider.add_instance(CONFIGURATION_OWNER, value).into_result(),
            Err(e) => Err(vec![format!("failed to serialize default configuration: {}", e)]),
        };

        match seeded {
            // Prefer what the provider reports it stored
            Ok(stored) => Ok(decode_configuration(stored).unwrap_or(default)),
            Err(seed) => Err(StartupError::ConfigurationUnavailable { retrieve, seed }),
        }
    }

    /// Stop the purge ticker, drop every session and stop accepting requests.
    ///
    /// Returns once the ticker has halted. Stopping a manager that is not
    /// running is a no-op.
    pub fn stop(&self) -> Outcome<()> {
        match self.lifecycle.begin_stop() {
            Transition::Begun(_) => {}
            Transition::Unchanged => return Outcome::success(()),
            Transition::Busy(state) => return Outcome::failure(format!("cannot stop while {}", state)),
        }

        self.purge.stop();
        let dropped = self.sessions.clear();
        self.lifecycle.finish(State::Stopped);
        tracing::info!(target: "security::lifecycle", sessions_dropped = dropped, "Security manager stopped");
        Outcome::success(())
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Snapshot of the adopted configuration, `None` before the first start.
    pub fn configuration(&self) -> Option<SecurityManagerConfiguration> {
        resilient_read(&self.configuration).clone()
    }

    /// Validate, persist and adopt a new configuration.
    ///
    /// While running, the purge ticker is restarted on the new interval.
    pub fn configure(&self, config: SecurityManagerConfiguration) -> Outcome<()> {
        if let Err(message) = config.validate() {
            return Outcome::failure(message);
        }

        let interval = config.purge_interval();
        {
            let mut current = resilient_write(&self.configuration);
            if let Outcome::Failure(mut messages) = persist_configuration(self.provider.as_ref(), &config) {
                messages.insert(0, "failed to persist configuration".to_string());
                return Outcome::Failure(messages);
            }
            *current = Some(config);
        }

        if let Ok(_running) = self.lifecycle.running() {
            self.purge.start(interval);
        }
        tracing::info!(target: "security::lifecycle", "Security configuration updated");
        Outcome::success(())
    }

    /// Every defined role.
    pub fn roles(&self) -> &'static [Role] {
        &Role::ALL
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    /// The user list, `None` until the manager has started at least once.
    pub fn users(&self) -> Option<Vec<User>> {
        self.credentials.users()
    }

    pub fn find_user(&self, name: &str) -> Option<User> {
        self.credentials.find_user(name)
    }

    pub fn create_user(
        &self,
        name: &str,
        display_name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Outcome<User> {
        let _running = require_running!(self);
        self.credentials.create_user(name, display_name, email, password, role)
    }

    pub fn update_user(&self, name: &str, update: UserUpdate) -> Outcome<User> {
        let _running = require_running!(self);
        self.credentials.update_user(name, update)
    }

    /// Delete a user and end every session they hold.
    pub fn delete_user(&self, name: &str) -> Outcome<()> {
        let _running = require_running!(self);

        let outcome = self.credentials.delete_user(name);
        if outcome.is_success() {
            let sessions_ended = self.sessions.remove_user_sessions(name);
            SecurityEvent::UserDeleted {
                user: name.to_string(),
                sessions_ended,
                timestamp: self.clock.now(),
            }
            .emit();
        }
        outcome
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    /// Snapshot of every stored session, oldest first.
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.snapshot()
    }

    pub fn find_session(&self, token: &str) -> Option<Session> {
        self.sessions.find(token)
    }

    /// The live session held by `name`, if any.
    pub fn find_user_session(&self, name: &str) -> Option<Session> {
        self.sessions.find_by_user(name, self.clock.now())
    }

    /// Log a user in.
    ///
    /// If the user already holds a live session, that session is returned
    /// unchanged.
    pub fn start_session(&self, name: &str, password: &str) -> Outcome<Session> {
        let _running = require_running!(self);

        // Lookup and issuance share the configuration read lock, so a
        // concurrent delete_user either precedes the lookup or removes the
        // issued session.
        let login = self.credentials.with_user(name, |user, config| {
            if !verify_password(password, &user.password_hash) {
                return Err("incorrect password");
            }
            Ok(self.sessions.issue_or_resume(user, self.clock.now(), config.session_length()))
        });

        match login.unwrap_or(Err("user not found")) {
            Err(reason) => self.reject_login(name, reason),
            Ok(Issued::New(session)) => {
                SecurityEvent::SessionStarted {
                    token: session.token.clone(),
                    user: session.identity.name.clone(),
                    expires: session.expires,
                }
                .emit();
                Outcome::success(session)
            }
            Ok(Issued::Resumed(session)) => {
                SecurityEvent::SessionResumed {
                    token: session.token.clone(),
                    user: session.identity.name.clone(),
                }
                .emit();
                Outcome::success(session)
            }
        }
    }

    fn reject_login(&self, name: &str, reason: &str) -> Outcome<Session> {
        SecurityEvent::LoginRejected {
            user: name.to_string(),
            reason: reason.to_string(),
        }
        .emit();
        Outcome::failure(reason)
    }

    /// End `session`. Matched on token against the stored sessions.
    pub fn end_session(&self, session: &Session) -> Outcome<()> {
        self.end_session_by_token(&session.token)
    }

    pub fn end_session_by_token(&self, token: &str) -> Outcome<()> {
        let _running = require_running!(self);

        match self.sessions.remove(token) {
            Some(ended) => {
                SecurityEvent::SessionEnded {
                    token: ended.token,
                    user: ended.identity.name,
                }
                .emit();
                Outcome::success(())
            }
            None => Outcome::failure("session not found"),
        }
    }

    /// Push the stored session's expiry to now plus the session length.
    ///
    /// Expired sessions cannot be extended. With sliding sessions disabled
    /// the session is returned unchanged as a `Warning`.
    pub fn extend_session(&self, session: &Session) -> Outcome<Session> {
        let _running = require_running!(self);

        let Some((length, sliding)) = self.session_policy() else {
            return Outcome::failure("configuration has not been loaded");
        };

        let outcome = self.sessions.extend(&session.token, self.clock.now(), length, sliding);
        match &outcome {
            Outcome::Success(extended) => SecurityEvent::SessionExtended {
                token: extended.token.clone(),
                expires: extended.expires,
            }
            .emit(),
            Outcome::Warning(_, messages) => {
                tracing::warn!(target: "security::sessions", "Session not extended: {}", messages.join("; "))
            }
            Outcome::Failure(_) => {}
        }
        outcome
    }

    /// Run the expired-session sweep now. Returns the number removed.
    pub fn purge_expired_sessions(&self) -> usize {
        self.purge.tick()
    }

    /// Session length and sliding flag from the adopted configuration.
    fn session_policy(&self) -> Option<(Duration, bool)> {
        resilient_read(&self.configuration)
            .as_ref()
            .map(|config| (config.session_length(), config.sliding_sessions))
    }
}

fn decode_configuration(value: serde_json::Value) -> Result<SecurityManagerConfiguration, Vec<String>> {
    let config: SecurityManagerConfiguration = serde_json::from_value(value)
        .map_err(|e| vec![format!("stored configuration is invalid: {}", e)])?;
    config
        .validate()
        .map_err(|message| vec![format!("stored configuration is invalid: {}", message)])?;
    Ok(config)
}
