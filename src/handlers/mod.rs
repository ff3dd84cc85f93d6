//! Collaborator seams
//!
//! The session never talks to a transport directly. Everything it needs from
//! an inbound message goes through [`ChatMessage`], and everything it calls
//! back into is one of the callback types below.

pub mod channel_message;

pub use channel_message::{ChannelMessage, MessageContent, Outbound};

use std::sync::Arc;

use crate::aggregate::DialogSession;
use crate::value_objects::{ExplicitPrompt, MatchResult};

/// A chat message as seen by the dialog
pub trait ChatMessage: Send + Sync + 'static {
    /// Text payload, if the message carries any
    fn text(&self) -> Option<&str>;

    /// Store the captures of the choice that accepted this message,
    /// replacing whatever match was stored before
    fn set_match(&mut self, result: MatchResult);

    /// Post a structured prompt back to the conversation
    fn send(&self, prompt: &ExplicitPrompt) -> anyhow::Result<()>;

    /// Reply to the author of this message with plain text
    fn reply(&self, text: &str) -> anyhow::Result<()>;
}

/// Callback run when a choice wins.
///
/// The session is handed back so the handler can register the next round.
pub type ChoiceHandler<M> =
    Box<dyn FnOnce(&mut DialogSession<M>, &mut M) -> anyhow::Result<()> + Send + 'static>;

/// Observer notified with the originating message when a round expires
pub type TimeoutListener<M> = Arc<dyn Fn(&M) + Send + Sync + 'static>;
