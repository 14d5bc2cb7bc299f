// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions for the security manager.

/// Mask a sensitive string (session tokens, digests) for logging.
///
/// Shows only the first `visible_prefix` characters and replaces the rest with "...".
/// Session tokens are bearer credentials and are never logged in full.
///
/// # Examples
///
/// ```
/// use security_manager::utils::mask_sensitive;
///
/// let token = "3f9a1c0b7d2e4f6a8b9c0d1e2f3a4b5c";
/// assert_eq!(mask_sensitive(token, 8), "3f9a1c0b...");
/// ```
pub fn mask_sensitive(input: &str, visible_prefix: usize) -> String {
    if input.chars().count() <= visible_prefix {
        // Still masked so the length of short secrets does not leak
        return format!("{}...", input);
    }

    let prefix: String = input.chars().take(visible_prefix).collect();
    format!("{}...", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_sensitive() {
        assert_eq!(mask_sensitive("a1b2c3d4e5f60718", 8), "a1b2c3d4...");
        assert_eq!(mask_sensitive("short", 8), "short...");
        assert_eq!(mask_sensitive("", 8), "...");
    }

    #[test]
    fn test_mask_sensitive_multibyte() {
        assert_eq!(mask_sensitive("ééééééééé", 2), "éé...");
    }
}
