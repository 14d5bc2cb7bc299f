// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Credentials, sessions and the manager that owns them.
//!
//! ## Layout
//!
//! - [`credentials`]: users and the credential store
//! - [`session`]: sessions and the session store
//! - [`purge`]: expired-session sweep and its tickers
//! - [`lifecycle`]: the start/stop state machine
//! - [`manager`]: the [`SecurityManager`] facade
//! - [`hash`], [`validation`], [`events`], [`locks`]: supporting pieces
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use security_manager::{FileConfigurationProvider, SecurityManager, StaticApplicationContext};
//!
//! let manager = SecurityManager::new(
//!     Arc::new(StaticApplicationContext::default()),
//!     Arc::new(FileConfigurationProvider::at_default_location()),
//! );
//!
//! if manager.start().is_ok() {
//!     let login = manager.start_session("admin", "admin");
//!     if let Some(session) = login.value() {
//!         println!("session expires {}", session.expires);
//!     }
//! }
//! ```

pub mod credentials;
pub mod events;
pub mod hash;
pub mod lifecycle;
pub mod locks;
pub mod manager;
pub mod purge;
pub mod session;
pub mod validation;

pub use credentials::{CredentialStore, User, UserUpdate};
pub use events::SecurityEvent;
pub use hash::{compute_sha512_hash, verify_password};
pub use lifecycle::NOT_RUNNING;
pub use locks::{resilient_lock, resilient_read, resilient_write};
pub use manager::{SecurityManager, SecurityManagerBuilder};
pub use purge::{ManualTicker, PurgeScheduler, ThreadTicker, TickFn, Ticker};
pub use session::{Identity, Session, SessionStore};
