// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Poison-tolerant lock helpers.
//!
//! The user list, the session map and the lifecycle state are each guarded
//! by their own lock and are touched from request threads and from the
//! purge ticker thread. A panic on one of those threads poisons the lock;
//! these helpers recover the guard and log a CRITICAL event instead of
//! turning one panic into a denial of service for every later login.
//!
//! ```
//! use std::sync::RwLock;
//! use security_manager::security::locks::{resilient_read, resilient_write};
//!
//! let sessions = RwLock::new(Vec::<String>::new());
//! resilient_write(&sessions).push("token".to_string());
//! assert_eq!(resilient_read(&sessions).len(), 1);
//! ```

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquire a read lock, recovering from poisoning if necessary.
#[inline]
pub fn resilient_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "security::locks",
                event = "LOCK_POISONED_READ",
                "CRITICAL: RwLock was poisoned during read acquisition. Recovering data. \
                 A thread previously panicked while holding this lock."
            );
            poisoned.into_inner()
        }
    }
}

/// Acquire a write lock, recovering from poisoning if necessary.
///
/// Writers to the session map and user list hold this guard for a whole
/// check-then-mutate sequence, so the data behind a poisoned lock is at
/// worst missing the one mutation that panicked.
#[inline]
pub fn resilient_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "security::locks",
                event = "LOCK_POISONED_WRITE",
                "CRITICAL: RwLock was poisoned during write acquisition. Recovering data. \
                 A thread previously panicked while holding this lock."
            );
            poisoned.into_inner()
        }
    }
}

/// Acquire a mutex, recovering from poisoning if necessary.
#[inline]
pub fn resilient_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "security::locks",
                event = "LOCK_POISONED_MUTEX",
                "CRITICAL: Mutex was poisoned. Recovering data."
            );
            poisoned.into_inner()
        }
    }
}
