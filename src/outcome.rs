// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tri-state operation outcome.
//!
//! Every public security manager operation reports through [`Outcome`]
//! instead of returning `Err` for ordinary business failures (bad input,
//! missing user, wrong lifecycle state). Callers inspect the
//! [`ResultCode`] rather than matching on error types.
//!
//! ```
//! use security_manager::outcome::{Outcome, ResultCode};
//!
//! let ok: Outcome<u32> = Outcome::success(7);
//! assert_eq!(ok.code(), ResultCode::Success);
//!
//! let declined = Outcome::warning(7, "sliding sessions are disabled");
//! assert_eq!(declined.value(), Some(&7));
//!
//! let failed: Outcome<u32> = Outcome::failure("not running");
//! assert_eq!(failed.last_error(), Some("not running"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three-valued code carried by every [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    /// The operation did what was asked.
    Success,
    /// The request was understood but a policy limited its effect.
    Warning,
    /// The request was rejected.
    Failure,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a security manager operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Completed with a payload.
    Success(T),
    /// Completed with a payload, but with messages worth surfacing.
    Warning(T, Vec<String>),
    /// Rejected; no payload.
    Failure(Vec<String>),
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Self::Success(value)
    }

    pub fn warning(value: T, message: impl Into<String>) -> Self {
        Self::Warning(value, vec![message.into()])
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(vec![message.into()])
    }

    pub fn code(&self) -> ResultCode {
        match self {
            Self::Success(_) => ResultCode::Success,
            Self::Warning(..) => ResultCode::Warning,
            Self::Failure(_) => ResultCode::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning(..))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Payload of a `Success` or `Warning`.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) | Self::Warning(value, _) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success(value) | Self::Warning(value, _) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Messages attached to a `Warning` or `Failure`. Empty for `Success`.
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Success(_) => &[],
            Self::Warning(_, messages) | Self::Failure(messages) => messages,
        }
    }

    /// The most recently attached message, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.messages().last().map(String::as_str)
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Warning(value, messages) => Outcome::Warning(f(value), messages),
            Self::Failure(messages) => Outcome::Failure(messages),
        }
    }

    /// Attach a message. A `Success` becomes a `Warning`; a `Failure` stays one.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            Self::Success(value) => Self::Warning(value, vec![message.into()]),
            Self::Warning(value, mut messages) => {
                messages.push(message.into());
                Self::Warning(value, messages)
            }
            Self::Failure(mut messages) => {
                messages.push(message.into());
                Self::Failure(messages)
            }
        }
    }

    /// Collapse into a `Result`, treating `Warning` as success.
    pub fn into_result(self) -> Result<T, Vec<String>> {
        match self {
            Self::Success(value) | Self::Warning(value, _) => Ok(value),
            Self::Failure(messages) => Err(messages),
        }
    }
}

impl<T> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages = self.messages();
        if messages.is_empty() {
            write!(f, "{}", self.code())
        } else {
            write!(f, "{}: {}", self.code(), messages.join("; "))
        }
    }
}
