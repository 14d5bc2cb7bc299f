// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Security manager facade tests
//!
//! Every test builds a fresh manager over a scriptable configuration
//! provider, a manual clock and a manual purge ticker, so session expiry
//! and sweeps are driven explicitly instead of by sleeping.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use serde_json::Value;

use security_manager::security::compute_sha512_hash;
use security_manager::{
    Clock, ConfigurationProvider, ManualClock, ManualTicker, Outcome, ResultCode, Role, SecurityManager,
    SecurityManagerConfiguration, Session, StartupError, State, StaticApplicationContext, Ticker,
    User, UserUpdate,
};

// =============================================================================
// HARNESS
// =============================================================================

/// Configuration provider whose calls can be made to fail.
#[derive(Default)]
struct ScriptedProvider {
    stored: Mutex<Option<Value>>,
    fail_get: AtomicBool,
    fail_add: AtomicBool,
    fail_update: AtomicBool,
    updates: AtomicUsize,
}

impl ScriptedProvider {
    fn with_configuration(config: &SecurityManagerConfiguration) -> Self {
        let provider = Self::default();
        *provider.stored.lock().unwrap() = Some(serde_json::to_value(config).unwrap());
        provider
    }

    fn stored_configuration(&self) -> Option<SecurityManagerConfiguration> {
        self.stored
            .lock()
            .unwrap()
            .clone()
            .map(|value| serde_json::from_value(value).unwrap())
    }
}

impl ConfigurationProvider for ScriptedProvider {
    fn get_instance(&self, _owner: &str) -> Outcome<Value> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Outcome::failure("get failed");
        }
        match self.stored.lock().unwrap().clone() {
            Some(value) => Outcome::success(value),
            None => Outcome::failure("not found"),
        }
    }

    fn add_instance(&self, _owner: &str, value: Value) -> Outcome<Value> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Outcome::failure("add failed");
        }
        *self.stored.lock().unwrap() = Some(value.clone());
        Outcome::success(value)
    }

    fn update_instance(&self, _owner: &str, value: Value) -> Outcome<()> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Outcome::failure("update failed");
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        *self.stored.lock().unwrap() = Some(value);
        Outcome::success(())
    }
}

struct Harness {
    manager: SecurityManager,
    provider: Arc<ScriptedProvider>,
    clock: ManualClock,
    ticker: ManualTicker,
}

/// Session length 900 s, sliding on, one user `test` / `test` (Reader).
fn test_configuration() -> SecurityManagerConfiguration {
    SecurityManagerConfiguration {
        session_length: 900,
        session_purge_interval: 90_000,
        sliding_sessions: true,
        users: vec![User::new("test", "user", "test@test.com", compute_sha512_hash("test"), Role::Reader)],
    }
}

fn harness_with(config: SecurityManagerConfiguration) -> Harness {
    harness_over(ScriptedProvider::with_configuration(&config))
}

fn harness_over(provider: ScriptedProvider) -> Harness {
    let provider = Arc::new(provider);
    let clock = ManualClock::new();
    let ticker = ManualTicker::new();
    let manager = SecurityManager::builder(Arc::new(StaticApplicationContext::default()), provider.clone())
        .clock(Arc::new(clock.clone()))
        .ticker(Arc::new(ticker.clone()))
        .build();

    Harness {
        manager,
        provider,
        clock,
        ticker,
    }
}

fn harness() -> Harness {
    harness_with(test_configuration())
}

fn started() -> Harness {
    let h = harness();
    assert!(h.manager.start().unwrap().is_success());
    h
}

fn login(h: &Harness) -> Session {
    h.manager.start_session("test", "test").into_value().unwrap()
}

/// A session the manager never issued.
fn stranger_session(h: &Harness) -> Session {
    let mut session = login(h);
    h.manager.end_session(&session);
    session.token = "0".repeat(64);
    session
}

// =============================================================================
// CONSTRUCTION AND LIFECYCLE
// =============================================================================

#[test]
fn test_constructor() {
    let h = harness();
    assert_eq!(h.manager.state(), State::Initialized);
    assert!(!h.manager.roles().is_empty());
    assert!(h.manager.sessions().is_empty());
    assert!(h.manager.users().is_none());
}

#[test]
fn test_start() {
    let h = harness();
    let result = h.manager.start().unwrap();

    assert!(result.messages().is_empty());
    assert_ne!(result.code(), ResultCode::Failure);
    assert_eq!(h.manager.state(), State::Running);
    assert_eq!(h.ticker.interval(), Some(std::time::Duration::from_millis(90_000)));
}

#[test]
fn test_start_configuration_failure() {
    let provider = ScriptedProvider::default();
    provider.fail_get.store(true, Ordering::SeqCst);
    provider.fail_add.store(true, Ordering::SeqCst);
    let h = harness_over(provider);

    let err = h.manager.start().unwrap_err();
    assert!(matches!(err, StartupError::ConfigurationUnavailable { .. }));
    assert!(err.to_string().contains("get failed"));
    assert!(err.to_string().contains("add failed"));
    assert_ne!(h.manager.state(), State::Running);
}

#[test]
fn test_start_not_configured() {
    let provider = ScriptedProvider::default();
    provider.fail_get.store(true, Ordering::SeqCst);
    let h = harness_over(provider);

    let result = h.manager.start().unwrap();
    assert!(result.messages().is_empty());
    assert_ne!(result.code(), ResultCode::Failure);
    assert_eq!(h.manager.state(), State::Running);
    assert!(h.manager.find_user("admin").is_some());
}

#[test]
fn test_start_while_running_is_noop() {
    let h = started();
    let session = login(&h);

    assert!(h.manager.start().unwrap().is_success());
    assert_eq!(h.manager.state(), State::Running);
    assert_eq!(h.manager.find_session(&session.token), Some(session));
}

#[test]
fn test_setup() {
    let provider = ScriptedProvider::default();
    let h = harness_over(provider);

    assert!(h.manager.setup().is_success());
    assert!(h.provider.stored_configuration().is_some());
    assert!(h.manager.setup().is_success());
}

#[test]
fn test_stop() {
    let h = started();
    login(&h);

    let result = h.manager.stop();
    assert!(result.messages().is_empty());
    assert_ne!(result.code(), ResultCode::Failure);
    assert_eq!(h.manager.state(), State::Stopped);
    assert!(h.manager.sessions().is_empty());
    assert!(!h.ticker.fire());
}

#[test]
fn test_stop_when_not_running() {
    let h = harness();
    assert!(h.manager.stop().is_success());
    assert_eq!(h.manager.state(), State::Initialized);
}

#[test]
fn test_users_survive_restart() {
    let h = started();
    h.manager.create_user("operator", "Operator", "op@plant.local", "secret", Role::ReadWriter);
    login(&h);

    h.manager.stop();
    assert!(h.manager.start().unwrap().is_success());

    assert!(h.manager.find_user("operator").is_some());
    assert!(h.manager.sessions().is_empty());
}

#[test]
fn test_mutations_refused_before_start() {
    let h = harness();
    let session = stranger_session_unstarted();

    assert_eq!(
        h.manager.create_user("name", "test", "test@test.com", "password", Role::Reader).last_error(),
        Some("not running")
    );
    assert!(h.manager.update_user("test", UserUpdate::new().display_name("x")).is_failure());
    assert!(h.manager.delete_user("test").is_failure());
    assert!(h.manager.start_session("test", "test").is_failure());
    assert!(h.manager.end_session(&session).is_failure());
    assert!(h.manager.extend_session(&session).is_failure());
}

fn stranger_session_unstarted() -> Session {
    let now = chrono::Utc::now();
    Session {
        token: "f".repeat(64),
        identity: security_manager::Identity {
            name: "name".to_string(),
            role: Role::Reader,
        },
        created: now,
        expires: now + Duration::minutes(15),
    }
}

// =============================================================================
// USERS
// =============================================================================

#[test]
fn test_create_user() {
    let h = started();
    let result = h.manager.create_user("operator", "test", "test@test.com", "password", Role::Reader);

    assert_eq!(result.last_error(), None);
    assert_eq!(result.code(), ResultCode::Success);
    let user = result.into_value().unwrap();
    assert_eq!(user.name, "operator");
    assert_eq!(user.password_hash, compute_sha512_hash("password"));
    assert_eq!(user.role, Role::Reader);

    assert!(h.manager.configuration().unwrap().users.iter().any(|u| u.name == "operator"));
    let stored = h.provider.stored_configuration().unwrap();
    assert!(stored.users.iter().any(|u| u.name == "operator"));
}

#[test]
fn test_create_user_bad_display_name() {
    let h = started();
    let result = h.manager.create_user("name", "", "test@test.com", "", Role::Reader);
    assert_eq!(result.code(), ResultCode::Failure);
}

#[test]
fn test_create_user_bad_email() {
    let h = started();
    let result = h.manager.create_user("name", "name", "email", "", Role::Reader);
    assert_eq!(result.code(), ResultCode::Failure);
}

#[test]
fn test_create_user_no_email() {
    let h = started();
    let result = h.manager.create_user("name", "name", "", "password", Role::Reader);
    assert_eq!(result.code(), ResultCode::Failure);
}

#[test]
fn test_create_user_bad_password() {
    let h = started();
    let result = h.manager.create_user("name", "test", "test@test.com", "", Role::Reader);
    assert_eq!(result.code(), ResultCode::Failure);
}

#[test]
fn test_create_user_bad_user() {
    let h = started();
    let result = h.manager.create_user("", "test", "test@test.com", "password", Role::Reader);
    assert_eq!(result.code(), ResultCode::Failure);
}

#[test]
fn test_create_user_not_started() {
    let h = harness();
    let result = h.manager.create_user("name", "test", "test@test.com", "password", Role::Reader);
    assert_eq!(result.code(), ResultCode::Failure);
}

#[test]
fn test_create_user_user_exists() {
    let h = started();
    let result = h.manager.create_user("test", "test", "test@test.com", "password", Role::Reader);
    assert_eq!(result.code(), ResultCode::Failure);
}

#[test]
fn test_create_user_persistence_failure() {
    let h = started();
    h.provider.fail_update.store(true, Ordering::SeqCst);

    let result = h.manager.create_user("operator", "test", "test@test.com", "password", Role::Reader);
    assert!(result.is_failure());
    assert!(h.manager.find_user("operator").is_none());
    assert_eq!(h.provider.updates.load(Ordering::SeqCst), 0);
}

#[test]
fn test_delete_user() {
    let mut config = test_configuration();
    config.users.push(User::new(
        "doomed",
        "doomed",
        "doomed@test.com",
        compute_sha512_hash("test"),
        Role::Reader,
    ));
    let h = harness_with(config);
    h.manager.start().unwrap();

    let result = h.manager.delete_user("doomed");
    assert_eq!(result.code(), ResultCode::Success);
    assert!(h.manager.find_user("doomed").is_none());
    assert!(!h.provider.stored_configuration().unwrap().users.iter().any(|u| u.name == "doomed"));
}

#[test]
fn test_delete_user_not_found() {
    let h = started();
    assert_eq!(h.manager.delete_user("nobody").code(), ResultCode::Failure);
}

#[test]
fn test_delete_user_not_running() {
    let h = harness();
    assert_eq!(h.manager.delete_user("test").code(), ResultCode::Failure);
}

#[test]
fn test_delete_user_ends_their_sessions() {
    let h = started();
    let session = login(&h);

    assert!(h.manager.delete_user("test").is_success());
    assert!(h.manager.find_session(&session.token).is_none());
    assert!(h.manager.find_user_session("test").is_none());
    assert!(h.manager.extend_session(&session).is_failure());
}

#[test]
fn test_find_user() {
    let mut config = test_configuration();
    config.users.push(User::new("found", "user", "test@test.com", "hash", Role::Reader));
    let h = harness_with(config);
    h.manager.start().unwrap();

    let user = h.manager.find_user("found").unwrap();
    assert_eq!(user.name, "found");
    assert_eq!(user.password_hash, "hash");
    assert_eq!(user.role, Role::Reader);
}

#[test]
fn test_find_user_not_found() {
    let h = harness();
    assert!(h.manager.find_user("nobody").is_none());
}

#[test]
fn test_update_user() {
    let h = started();
    h.manager.create_user("operator", "test", "test@test.com", "test", Role::Reader);

    let update = UserUpdate::new()
        .display_name("test")
        .email("test@test.com")
        .password("test2")
        .role(Role::ReadWriter);
    let result = h.manager.update_user("operator", update);

    assert_eq!(result.code(), ResultCode::Success);
    let user = result.into_value().unwrap();
    assert_eq!(user.name, "operator");
    assert_eq!(user.password_hash, compute_sha512_hash("test2"));
    assert_eq!(user.role, Role::ReadWriter);
}

#[test]
fn test_update_user_bad_display_name() {
    let h = started();
    let update = UserUpdate::new()
        .display_name("")
        .email("test@test.com")
        .password("password")
        .role(Role::ReadWriter);
    assert_eq!(h.manager.update_user("test", update).code(), ResultCode::Failure);
}

#[test]
fn test_update_user_bad_email() {
    let h = started();
    let update = UserUpdate::new().display_name("name").email("test").password("password");
    assert_eq!(h.manager.update_user("test", update).code(), ResultCode::Failure);
}

#[test]
fn test_update_user_bad_password() {
    let h = started();
    let update = UserUpdate::new().display_name("test").email("test@test.com").password("");
    assert_eq!(h.manager.update_user("test", update).code(), ResultCode::Failure);
}

#[test]
fn test_update_user_display_name() {
    let h = started();
    h.manager.create_user("operator", "test", "test@test.com", "test", Role::Reader);

    let user = h
        .manager
        .update_user("operator", UserUpdate::new().display_name("display"))
        .into_value()
        .unwrap();
    assert_eq!(user.name, "operator");
    assert_eq!(user.display_name, "display");
    assert_eq!(user.role, Role::Reader);
}

#[test]
fn test_update_user_email() {
    let h = started();
    h.manager.create_user("operator", "test", "test@test.com", "test", Role::Reader);

    let user = h
        .manager
        .update_user("operator", UserUpdate::new().email("email@email.com"))
        .into_value()
        .unwrap();
    assert_eq!(user.email, "email@email.com");
    assert_eq!(user.role, Role::Reader);
}

#[test]
fn test_update_user_nothing_to_update() {
    let h = started();
    let result = h.manager.update_user("name", UserUpdate::new());
    assert_eq!(result.code(), ResultCode::Failure);
    assert_eq!(result.last_error(), Some("nothing to update"));
}

#[test]
fn test_update_user_not_running() {
    let h = harness();
    let update = UserUpdate::new().display_name("test").email("test@test.com").password("test");
    assert_eq!(h.manager.update_user("test", update).code(), ResultCode::Failure);
}

#[test]
fn test_update_user_password() {
    let h = started();
    h.manager.create_user("operator", "test", "test@test.com", "test", Role::Reader);

    let user = h
        .manager
        .update_user("operator", UserUpdate::new().password("test2"))
        .into_value()
        .unwrap();
    assert_eq!(user.password_hash, compute_sha512_hash("test2"));
    assert_eq!(user.role, Role::Reader);

    assert!(h.manager.start_session("operator", "test").is_failure());
    assert!(h.manager.start_session("operator", "test2").is_success());
}

#[test]
fn test_update_user_role() {
    let h = started();
    h.manager.create_user("operator", "test", "test@test.com", "test", Role::Reader);

    let user = h
        .manager
        .update_user("operator", UserUpdate::new().role(Role::ReadWriter))
        .into_value()
        .unwrap();
    assert_eq!(user.role, Role::ReadWriter);
}

#[test]
fn test_update_user_user_not_found() {
    let h = started();
    let update = UserUpdate::new().display_name("test").email("test@test.com").password("test");
    assert_eq!(h.manager.update_user("nobody", update).code(), ResultCode::Failure);
}

#[test]
fn test_users() {
    let h = harness();
    assert!(h.manager.users().is_none());

    h.manager.start().unwrap();
    assert_eq!(h.manager.users().unwrap().len(), 1);
}

#[test]
fn test_users_empty() {
    let mut config = test_configuration();
    config.users.clear();
    let h = harness_with(config);
    h.manager.start().unwrap();

    assert!(h.manager.users().unwrap().is_empty());
}

// =============================================================================
// SESSIONS
// =============================================================================

#[test]
fn test_start_session() {
    let h = started();
    let result = h.manager.start_session("test", "test");

    assert_eq!(result.code(), ResultCode::Success);
    let session = result.into_value().unwrap();
    assert_eq!(session.identity.name, "test");
    assert_eq!(session.identity.role, Role::Reader);
    assert_eq!(session.created, h.clock.now());
    assert_eq!(session.expires, session.created + Duration::seconds(900));
}

#[test]
fn test_start_session_bad_password() {
    let h = started();
    assert_eq!(h.manager.start_session("test", "bad").code(), ResultCode::Failure);
}

#[test]
fn test_start_session_existing_session() {
    let h = started();
    let first = login(&h);
    h.clock.advance(Duration::minutes(5));
    let second = login(&h);

    assert_eq!(first, second);
    assert_eq!(h.manager.sessions().len(), 1);
}

#[test]
fn test_start_session_not_started() {
    let h = harness();
    assert_eq!(h.manager.start_session("test", "test").code(), ResultCode::Failure);
}

#[test]
fn test_start_session_user_not_found() {
    let h = started();
    assert_eq!(h.manager.start_session("nobody", "test").code(), ResultCode::Failure);
}

#[test]
fn test_end_session() {
    let h = started();
    let session = login(&h);

    assert_eq!(h.manager.end_session(&session).code(), ResultCode::Success);
    assert!(h.manager.find_session(&session.token).is_none());
}

#[test]
fn test_end_session_not_running() {
    let h = harness();
    let session = stranger_session_unstarted();
    assert_eq!(h.manager.end_session(&session).code(), ResultCode::Failure);
}

#[test]
fn test_end_session_session_not_found() {
    let h = started();
    let session = stranger_session(&h);
    assert_eq!(h.manager.end_session(&session).code(), ResultCode::Failure);
}

#[test]
fn test_end_session_by_token() {
    let h = started();
    let session = login(&h);

    assert!(h.manager.end_session_by_token(&session.token).is_success());
    assert!(h.manager.end_session_by_token(&session.token).is_failure());
}

#[test]
fn test_extend_session() {
    let h = started();
    let session = login(&h);
    let offset = session.expires;

    let mut config = h.manager.configuration().unwrap();
    config.session_length *= 2;
    assert!(h.manager.configure(config).is_success());
    h.clock.advance(Duration::minutes(1));

    let result = h.manager.extend_session(&session);
    assert_eq!(result.code(), ResultCode::Success);
    let extended = result.into_value().unwrap();
    assert!(extended.expires > offset);
    assert_eq!(extended.expires, h.clock.now() + Duration::seconds(1800));
    assert_eq!(h.manager.find_session(&session.token), Some(extended));
}

#[test]
fn test_extend_session_expired() {
    let h = started();
    let session = login(&h);
    h.clock.advance(Duration::seconds(901));

    assert_eq!(h.manager.extend_session(&session).code(), ResultCode::Failure);
}

#[test]
fn test_extend_session_not_found() {
    let h = started();
    let session = stranger_session(&h);
    assert_eq!(h.manager.extend_session(&session).code(), ResultCode::Failure);
}

#[test]
fn test_extend_session_not_running() {
    let h = harness();
    let session = stranger_session_unstarted();
    assert_eq!(h.manager.extend_session(&session).code(), ResultCode::Failure);
}

#[test]
fn test_extend_session_sliding_sessions_not_enabled() {
    let mut config = test_configuration();
    config.sliding_sessions = false;
    let h = harness_with(config);
    h.manager.start().unwrap();

    let session = login(&h);
    h.clock.advance(Duration::minutes(1));

    let result = h.manager.extend_session(&session);
    assert_eq!(result.code(), ResultCode::Warning);
    assert_eq!(result.value().unwrap().expires, session.expires);
    assert_eq!(h.manager.find_session(&session.token).unwrap().expires, session.expires);
}

#[test]
fn test_find_session() {
    let h = started();
    let session = login(&h);

    let found = h.manager.find_session(&session.token).unwrap();
    assert_eq!(found.identity.name, "test");
}

#[test]
fn test_find_session_not_found() {
    let h = harness();
    assert!(h.manager.find_session("missing").is_none());
}

#[test]
fn test_find_user_session() {
    let h = started();
    login(&h);

    let found = h.manager.find_user_session("test").unwrap();
    assert_eq!(found.identity.name, "test");
}

#[test]
fn test_find_user_session_not_found() {
    let h = harness();
    assert!(h.manager.find_user_session("nobody").is_none());
}

#[test]
fn test_purge_expired_sessions() {
    let h = started();

    h.manager.create_user("first", "test", "test@test.com", "test", Role::Reader);
    let first = h.manager.start_session("first", "test").into_value().unwrap();

    h.clock.advance(Duration::minutes(10));
    h.manager.create_user("second", "test", "test@test.com", "test", Role::Reader);
    let second = h.manager.start_session("second", "test").into_value().unwrap();

    h.clock.advance(Duration::minutes(6));
    assert!(first.is_expired_at(h.clock.now()));
    assert!(!second.is_expired_at(h.clock.now()));
    assert_eq!(h.manager.sessions().len(), 2);

    assert_eq!(h.manager.purge_expired_sessions(), 1);
    assert_eq!(h.manager.sessions(), vec![second]);
}

#[test]
fn test_timer_tick_matches_manual_purge() {
    let h = started();
    login(&h);
    h.clock.advance(Duration::seconds(901));

    assert!(h.ticker.fire());
    assert!(h.manager.sessions().is_empty());
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[test]
fn test_get_configuration_definition() {
    let definition = SecurityManager::configuration_definition();

    assert!(!definition.form.is_empty());
    assert!(!definition.schema.is_empty());
    assert!(!definition.model.is_empty());

    let config = definition.default_configuration;
    assert!(config.session_length > 0);
    assert!(config.session_purge_interval > 0);
    assert!(!config.users.is_empty());
}

#[test]
fn test_configure_persists() {
    let h = started();
    let mut config = h.manager.configuration().unwrap();
    config.sliding_sessions = false;

    assert!(h.manager.configure(config.clone()).is_success());
    assert_eq!(h.provider.stored_configuration(), Some(config));
}

#[test]
fn test_configure_racing_stop_leaves_ticker_stopped() {
    for _ in 0..50 {
        let h = started();
        let config = h.manager.configuration().unwrap();

        std::thread::scope(|scope| {
            let configurer = scope.spawn(|| h.manager.configure(config));
            assert!(h.manager.stop().is_success());
            assert!(configurer.join().unwrap().is_success());
        });

        assert_eq!(h.manager.state(), State::Stopped);
        assert!(!h.ticker.is_active());
    }
}
