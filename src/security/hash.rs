// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Password digests.
//!
//! Stored password hashes are the SHA-512 digest of the UTF-8 password,
//! rendered as 128 uppercase hex characters. This matches the digests
//! already present in persisted platform configurations; it is unsalted
//! and not a recommendation for new systems.

use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// Compute the stored digest of `password`.
///
/// ```
/// use security_manager::security::hash::compute_sha512_hash;
///
/// let digest = compute_sha512_hash("test");
/// assert_eq!(digest.len(), 128);
/// assert!(digest.starts_with("EE26B0DD"));
/// ```
pub fn compute_sha512_hash(password: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    hex::encode_upper(hasher.finalize())
}

/// Check `password` against a stored digest without short-circuiting on the
/// first differing byte.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let candidate = compute_sha512_hash(password);
    candidate.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}
