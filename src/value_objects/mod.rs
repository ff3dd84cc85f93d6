//! Value objects for the choice dialog

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::aggregate::DialogSession;
use crate::errors::{DialogError, DialogResult};
use crate::handlers::{ChatMessage, ChoiceHandler};

/// One acceptable reply in the current round
pub struct Choice<M: ChatMessage> {
    /// Expression searched for anywhere in the reply text
    pattern: Regex,
    /// Invoked with the matched message when this choice wins
    handler: ChoiceHandler<M>,
    /// Name shown to the user when explicit mode re-prompts
    label: Option<String>,
    /// Caller tag, carried through untouched
    kind: Option<String>,
}

impl<M: ChatMessage> Choice<M> {
    /// Compile `pattern` and pair it with `handler`
    pub fn new<F>(pattern: &str, handler: F) -> DialogResult<Self>
    where
        F: FnOnce(&mut DialogSession<M>, &mut M) -> anyhow::Result<()> + Send + 'static,
    {
        let regex = Regex::new(pattern).map_err(|source| DialogError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self::from_regex(regex, handler))
    }

    /// Pair an already compiled expression with `handler`
    pub fn from_regex<F>(pattern: Regex, handler: F) -> Self
    where
        F: FnOnce(&mut DialogSession<M>, &mut M) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            pattern,
            handler: Box::new(handler),
            label: None,
            kind: None,
        }
    }

    /// Set the label offered as a quick reply
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Tag the choice
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Search `text` for this choice's pattern
    pub fn find(&self, text: &str) -> Option<MatchResult> {
        self.pattern
            .captures(text)
            .map(|caps| MatchResult::from_captures(&self.pattern, &caps))
    }

    pub(crate) fn into_parts(self) -> (ChoiceHandler<M>, Option<String>, Option<String>) {
        (self.handler, self.label, self.kind)
    }
}

impl<M: ChatMessage> fmt::Debug for Choice<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Choice")
            .field("pattern", &self.pattern.as_str())
            .field("label", &self.label)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Captures from the pattern that accepted a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Text of the whole match
    pub matched: String,
    /// Byte offset where the match starts
    pub start: usize,
    /// Byte offset one past the end of the match
    pub end: usize,
    /// Positional groups; index 0 is the whole match
    pub groups: Vec<Option<String>>,
    /// Named groups that participated in the match
    pub named: HashMap<String, String>,
}

impl MatchResult {
    fn from_captures(pattern: &Regex, caps: &Captures<'_>) -> Self {
        let whole = caps.get(0);
        let groups = caps
            .iter()
            .map(|group| group.map(|m| m.as_str().to_string()))
            .collect();
        let named = pattern
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();

        Self {
            matched: whole.map(|m| m.as_str().to_string()).unwrap_or_default(),
            start: whole.map(|m| m.start()).unwrap_or_default(),
            end: whole.map(|m| m.end()).unwrap_or_default(),
            groups,
            named,
        }
    }

    /// Positional group `index`, if it participated
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    /// Named group, if it participated
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

/// Re-prompt sent when explicit mode rejects a reply.
///
/// Serialises as `{"msg": .., "quick_replies": [..]}` so clients can render
/// the labels as buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitPrompt {
    #[serde(rename = "msg")]
    pub text: String,
    pub quick_replies: Vec<String>,
}

impl ExplicitPrompt {
    pub const NOT_UNDERSTOOD: &'static str = "Sorry, I didn't understand your response.";

    /// Build the prompt that lists `labels` as the acceptable replies
    pub fn for_labels(labels: Vec<String>) -> Self {
        let text = match labels.as_slice() {
            [] => Self::NOT_UNDERSTOOD.to_string(),
            [only] => format!("{} Please say {only} to continue.", Self::NOT_UNDERSTOOD),
            [head @ .., last] => format!(
                "{} Please say one of {} or {last} to continue.",
                Self::NOT_UNDERSTOOD,
                head.join(", ")
            ),
        };

        Self {
            text,
            quick_replies: labels,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "msg": self.text,
            "quick_replies": self.quick_replies,
        })
    }
}

/// What [`DialogSession::receive`] did with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// A choice matched and its handler ran
    Matched {
        /// Registration index of the winning choice
        index: usize,
        label: Option<String>,
        kind: Option<String>,
    },
    /// Explicit mode rejected the reply and re-prompted; the round stays open
    Reprompted(ExplicitPrompt),
    /// Nothing matched; the round, if any, was closed
    Ignored,
}

impl ReceiveOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, ReceiveOutcome::Matched { .. })
    }
}
