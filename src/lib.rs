//! Multiple-choice dialog domain
//!
//! A [`DialogSession`] lets a chat bot ask one participant a question and
//! wait for one of a set of expected replies. It provides:
//! - Choice registration: regular expressions paired with handlers, matched
//!   in registration order
//! - Match resolution against inbound messages, first match wins
//! - An inactivity timeout that replies to the originating message and
//!   notifies observers when nobody answered in time
//! - Explicit mode, which rejects unmatched replies and re-prompts with the
//!   list of acceptable answers instead of silently dropping the round
//!
//! Routing inbound messages to the right session is left to the caller, as
//! is discarding a session once it timed out.

pub mod aggregate;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod timer;
pub mod value_objects;

// Re-export main types
pub use aggregate::DialogSession;

pub use config::{DEFAULT_TIMEOUT, DEFAULT_TIMEOUT_MESSAGE, DialogConfig};

pub use errors::{DialogError, DialogResult};

pub use events::{
    ChoiceMatched, ChoiceRegistered, ChoicesReset, DialogEvent, DialogTimedOut, DomainEvent,
    ResponseRejected, RoundClosed,
};

pub use handlers::{
    ChannelMessage, ChatMessage, ChoiceHandler, MessageContent, Outbound, TimeoutListener,
};

pub use timer::{Scheduler, TimerHandle, TimerTask, TokioScheduler, VirtualScheduler};

pub use value_objects::{Choice, ExplicitPrompt, MatchResult, ReceiveOutcome};
