// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! security-manager - users and login sessions for an industrial IoT platform
//!
//! The [`SecurityManager`] owns the platform's user list and its live
//! login sessions. Users are persisted through a
//! [`ConfigurationProvider`]; sessions live in memory and are swept once
//! they expire.
//!
//! # Core Modules
//!
//! - [`security`] - Credential store, session store, purge sweep and the manager facade
//! - [`config`] - The persisted configuration and the provider traits
//! - [`outcome`] - The Success / Warning / Failure result type
//! - [`clock`] - Wall-clock abstraction used for session expiry
//! - [`error`] - Fatal startup error and consistent error formatting

pub mod clock;
pub mod config;
pub mod error;
pub mod outcome;
pub mod security;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{Role, State};
pub use outcome::{Outcome, ResultCode};
pub use error::StartupError;
pub use clock::{Clock, ManualClock, SystemClock};

pub use config::{
    configuration_definition, ApplicationContext, ConfigurationDefinition, ConfigurationProvider,
    FileConfigurationProvider, MemoryConfigurationProvider, SecurityManagerConfiguration,
    StaticApplicationContext, CONFIGURATION_OWNER,
};

pub use security::{
    Identity, ManualTicker, SecurityManager, SecurityManagerBuilder, Session, ThreadTicker, Ticker,
    User, UserUpdate,
};
