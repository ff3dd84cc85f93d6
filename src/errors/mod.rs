//! Error types for the choice dialog
//!
//! Unmatched replies are ordinary flow, not errors. What ends up here is
//! caller error (bad patterns, no runtime) or a collaborator callback that
//! failed while the session was driving it.

use thiserror::Error;

/// Errors surfaced by a [`DialogSession`](crate::DialogSession)
#[derive(Debug, Error)]
pub enum DialogError {
    /// A choice pattern did not compile
    #[error("invalid choice pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The handler of a matched choice returned an error
    #[error("choice handler failed: {0}")]
    Handler(#[source] anyhow::Error),

    /// The re-prompt could not be delivered through the message's send channel
    #[error("failed to deliver prompt: {0}")]
    Delivery(#[source] anyhow::Error),

    /// No tokio runtime was available to drive the timer
    #[error("scheduler unavailable: {0}")]
    SchedulerUnavailable(String),
}

/// Result alias used across the crate
pub type DialogResult<T> = Result<T, DialogError>;
