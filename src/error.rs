// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Fatal startup errors and consistent error formatting.
//!
//! Ordinary business failures are reported through
//! [`Outcome`](crate::outcome::Outcome). The only condition that escapes
//! that boundary is a start that can neither retrieve nor seed the
//! security configuration: [`StartupError`].

use std::fmt;

/// Formats an error message with title, causes and fixes.
///
/// # Example
///
/// ```
/// use security_manager::error::format_error;
///
/// let error = format_error(
///     "Security configuration unavailable",
///     &["Configuration store is read-only"],
///     &["Check permissions on the configuration file"],
/// );
/// assert!(error.contains("Possible causes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = String::new();

    output.push_str(&format!("[✗] {}\n", title));

    if !causes.is_empty() {
        output.push_str("\nPossible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
    }

    if !fixes.is_empty() {
        output.push_str("\nTry these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
    }

    output.trim_end().to_string()
}

/// Builder for constructing formatted error messages.
///
/// # Example
///
/// ```
/// use security_manager::error::ErrorBuilder;
///
/// let error = ErrorBuilder::new("Failed to start the security manager")
///     .cause("Configuration store unreachable")
///     .fix("Verify the configuration path: secmgr --config <path> users list")
///     .build();
/// assert!(error.contains("[✗] Failed to start the security manager"));
/// ```
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    /// Create a new error builder with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    /// Add a possible cause.
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a suggested fix.
    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    /// Build the formatted error message.
    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().build())
    }
}

/// Unrecoverable failure while starting the security manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// The configuration could not be retrieved, and seeding a default
    /// configuration as a fallback failed as well.
    ConfigurationUnavailable {
        retrieve: Vec<String>,
        seed: Vec<String>,
    },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationUnavailable { retrieve, seed } => {
                let mut builder = ErrorBuilder::new("Security manager failed to start: configuration unavailable");
                for message in retrieve {
                    builder = builder.cause(format!("retrieve: {}", message));
                }
                for message in seed {
                    builder = builder.cause(format!("seed default: {}", message));
                }
                let builder = builder
                    .fix("Check that the configuration store is reachable and writable")
                    .fix("Remove a corrupt configuration document so defaults can be seeded");
                write!(f, "{}", builder)
            }
        }
    }
}

impl std::error::Error for StartupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error() {
        let error = format_error("Test Error", &["Cause 1", "Cause 2"], &["Fix 1", "Fix 2"]);

        assert!(error.contains("[✗] Test Error"));
        assert!(error.contains("  - Cause 1"));
        assert!(error.contains("  - Cause 2"));
        assert!(error.contains("  1. Fix 1"));
        assert!(error.contains("  2. Fix 2"));
    }

    #[test]
    fn test_empty_causes_and_fixes() {
        let error = format_error("Empty test", &[], &[]);
        assert_eq!(error, "[✗] Empty test");
    }

    #[test]
    fn test_error_builder_display() {
        let builder = ErrorBuilder::new("Display test").cause("Cause").fix("Fix");
        let error = format!("{}", builder);
        assert!(error.contains("[✗] Display test"));
        assert!(error.contains("Cause"));
    }

    #[test]
    fn test_startup_error_lists_both_failures() {
        let error = StartupError::ConfigurationUnavailable {
            retrieve: vec!["document missing".to_string()],
            seed: vec!["disk full".to_string()],
        };
        let text = error.to_string();
        assert!(text.contains("retrieve: document missing"));
        assert!(text.contains("seed default: disk full"));
        assert!(text.contains("Try these fixes:"));
    }
}
