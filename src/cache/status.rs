//! Decryption status state machine
//!
//! | Status | Meaning |
//! |--------|---------|
//! | cleared | No value; initial state and after `clear()` |
//! | in_progress | A decryption pass is pending |
//! | complete | Value cell holds the result of the latest pass |
//! | error | The latest pass failed; value cell left as it was |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the most recent decryption attempt for one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecryptionStatus {
    InProgress,
    Complete,
    Error,
    #[default]
    Cleared,
}

/// Events that drive status transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// A pass with a non-empty decryption set started
    PassStarted,
    /// A pass resolved and its value was persisted
    PassSucceeded,
    /// The decryptor failed
    PassFailed,
    /// `clear()` was requested
    Cleared,
    /// An external write replaced the value while a pass was pending
    Superseded { has_value: bool },
}

impl DecryptionStatus {
    /// Apply an event and return the next status.
    ///
    /// `clear()` and external writes win from any state. A pass can only
    /// resolve out of `in_progress`; a stray resolution event in another
    /// state leaves the status untouched.
    pub fn apply(self, event: StatusEvent) -> Self {
        match (self, event) {
            (_, StatusEvent::Cleared) => Self::Cleared,
            (_, StatusEvent::Superseded { has_value: true }) => Self::Complete,
            (_, StatusEvent::Superseded { has_value: false }) => Self::Cleared,
            (_, StatusEvent::PassStarted) => Self::InProgress,
            (Self::InProgress, StatusEvent::PassFailed) => Self::Error,
            (Self::InProgress, StatusEvent::PassSucceeded) => Self::Complete,
            // Nothing to decrypt: carried-over values settle without in_progress
            (Self::Cleared | Self::Complete | Self::Error, StatusEvent::PassSucceeded) => {
                Self::Complete
            }
            (current, StatusEvent::PassFailed) => current,
        }
    }

    /// Whether a pass is pending
    pub fn is_pending(self) -> bool {
        self == Self::InProgress
    }

    /// Wire name of the status
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Cleared => "cleared",
        }
    }
}

impl fmt::Display for DecryptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
