//! [`ChatMessage`] adapter that hands outbound traffic to an async transport
//!
//! The session runs synchronously; a transport usually does not. Outbound
//! prompts and replies are pushed onto an unbounded tokio channel and the
//! transport drains it on its own task.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::ChatMessage;
use crate::value_objects::{ExplicitPrompt, MatchResult};

/// Content of an inbound message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MessageContent {
    /// Plain text message
    Text(String),
    /// Structured data (JSON), carries no text
    Structured(serde_json::Value),
    /// Multimodal content
    Multimodal {
        text: Option<String>,
        data: HashMap<String, serde_json::Value>,
    },
}

impl MessageContent {
    /// Text a choice pattern can be matched against
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Structured(_) => None,
            MessageContent::Multimodal { text, .. } => text.as_deref(),
        }
    }
}

/// Traffic leaving the dialog, addressed to the conversation a message came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Re-prompt listing the acceptable replies
    Prompt {
        conversation: String,
        prompt: ExplicitPrompt,
    },
    /// Plain reply to the author
    Reply {
        conversation: String,
        author: String,
        text: String,
    },
}

/// Inbound message bound to an outbound channel
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub id: Uuid,
    /// Conversation (room, thread, DM) the message arrived in
    pub conversation: String,
    /// Who wrote it
    pub author: String,
    pub content: MessageContent,
    /// Captures left by the choice that accepted this message
    pub match_result: Option<MatchResult>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ChannelMessage {
    pub fn new(
        conversation: impl Into<String>,
        author: impl Into<String>,
        content: MessageContent,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation: conversation.into(),
            author: author.into(),
            content,
            match_result: None,
            outbound,
        }
    }

    /// Create a plain text message
    pub fn plain(
        conversation: impl Into<String>,
        author: impl Into<String>,
        text: impl Into<String>,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self::new(conversation, author, MessageContent::Text(text.into()), outbound)
    }

    fn push(&self, item: Outbound) -> anyhow::Result<()> {
        self.outbound
            .send(item)
            .map_err(|_| anyhow::anyhow!("outbound channel for {} is closed", self.conversation))
    }
}

impl ChatMessage for ChannelMessage {
    fn text(&self) -> Option<&str> {
        self.content.text()
    }

    fn set_match(&mut self, result: MatchResult) {
        self.match_result = Some(result);
    }

    fn send(&self, prompt: &ExplicitPrompt) -> anyhow::Result<()> {
        self.push(Outbound::Prompt {
            conversation: self.conversation.clone(),
            prompt: prompt.clone(),
        })
    }

    fn reply(&self, text: &str) -> anyhow::Result<()> {
        self.push(Outbound::Reply {
            conversation: self.conversation.clone(),
            author: self.author.clone(),
            text: text.to_string(),
        })
    }
}
