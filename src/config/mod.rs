//! Session configuration
//!
//! Defaults are resolved here, once, when a session is built. Nothing in the
//! crate reads a mutable global.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inactivity window applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply sent to the originating message when a round expires
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "Timed out!, please start again.";

/// Timeout settings for a dialog session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// How long a round may stay unanswered
    pub timeout: Duration,
    /// Text replied to the originating message on expiration
    pub timeout_message: String,
}

impl DialogConfig {
    /// Create a config with the default timeout and message
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the inactivity timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the timeout reply
    pub fn with_timeout_message(mut self, message: impl Into<String>) -> Self {
        self.timeout_message = message.into();
        self
    }

    /// Replace unset values with the defaults.
    ///
    /// A zero timeout or an empty message counts as unset.
    pub fn resolved(mut self) -> Self {
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.timeout_message.is_empty() {
            self.timeout_message = DEFAULT_TIMEOUT_MESSAGE.to_string();
        }
        self
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            timeout_message: DEFAULT_TIMEOUT_MESSAGE.to_string(),
        }
    }
}
