//! Dialog domain events
//!
//! Every state change of a session is published as one of these. The
//! timeout notification collaborators rely on is [`DialogTimedOut`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Common shape of a dialog event
pub trait DomainEvent {
    /// Routing subject, `dialog.<noun>.<verb>.v1`
    fn subject(&self) -> String;

    /// Session the event belongs to
    fn aggregate_id(&self) -> Uuid;

    fn event_type(&self) -> &'static str;
}

/// A choice was added to the current round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRegistered {
    pub session_id: Uuid,
    pub pattern: String,
    pub label: Option<String>,
    pub kind: Option<String>,
    /// Number of choices in the round after this one was added
    pub choice_count: usize,
    pub registered_at: DateTime<Utc>,
}

impl DomainEvent for ChoiceRegistered {
    fn subject(&self) -> String {
        "dialog.choice.registered.v1".to_string()
    }

    fn aggregate_id(&self) -> Uuid {
        self.session_id
    }

    fn event_type(&self) -> &'static str {
        "ChoiceRegistered"
    }
}

/// A reply matched a choice and closed the round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMatched {
    pub session_id: Uuid,
    pub index: usize,
    pub label: Option<String>,
    pub kind: Option<String>,
    pub matched_text: String,
    pub matched_at: DateTime<Utc>,
}

impl DomainEvent for ChoiceMatched {
    fn subject(&self) -> String {
        "dialog.choice.matched.v1".to_string()
    }

    fn aggregate_id(&self) -> Uuid {
        self.session_id
    }

    fn event_type(&self) -> &'static str {
        "ChoiceMatched"
    }
}

/// Explicit mode rejected a reply and re-prompted the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRejected {
    pub session_id: Uuid,
    pub received_text: Option<String>,
    pub quick_replies: Vec<String>,
    pub rejected_at: DateTime<Utc>,
}

impl DomainEvent for ResponseRejected {
    fn subject(&self) -> String {
        "dialog.response.rejected.v1".to_string()
    }

    fn aggregate_id(&self) -> Uuid {
        self.session_id
    }

    fn event_type(&self) -> &'static str {
        "ResponseRejected"
    }
}

/// An unmatched reply closed the round without running any handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundClosed {
    pub session_id: Uuid,
    /// Choices that were open when the round closed
    pub discarded_choices: usize,
    pub closed_at: DateTime<Utc>,
}

impl DomainEvent for RoundClosed {
    fn subject(&self) -> String {
        "dialog.round.closed.v1".to_string()
    }

    fn aggregate_id(&self) -> Uuid {
        self.session_id
    }

    fn event_type(&self) -> &'static str {
        "RoundClosed"
    }
}

/// A collaborator cleared the choices directly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoicesReset {
    pub session_id: Uuid,
    pub discarded_choices: usize,
    pub reset_at: DateTime<Utc>,
}

impl DomainEvent for ChoicesReset {
    fn subject(&self) -> String {
        "dialog.choices.reset.v1".to_string()
    }

    fn aggregate_id(&self) -> Uuid {
        self.session_id
    }

    fn event_type(&self) -> &'static str {
        "ChoicesReset"
    }
}

/// No reply arrived within the timeout window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogTimedOut {
    pub session_id: Uuid,
    /// Text replied to the originating message
    pub timeout_message: String,
    pub timed_out_at: DateTime<Utc>,
}

impl DomainEvent for DialogTimedOut {
    fn subject(&self) -> String {
        "dialog.timed_out.v1".to_string()
    }

    fn aggregate_id(&self) -> Uuid {
        self.session_id
    }

    fn event_type(&self) -> &'static str {
        "DialogTimedOut"
    }
}

/// Envelope for all dialog events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DialogEvent {
    ChoiceRegistered(ChoiceRegistered),
    ChoiceMatched(ChoiceMatched),
    ResponseRejected(ResponseRejected),
    RoundClosed(RoundClosed),
    ChoicesReset(ChoicesReset),
    TimedOut(DialogTimedOut),
}

impl DialogEvent {
    fn inner(&self) -> &dyn DomainEvent {
        match self {
            DialogEvent::ChoiceRegistered(e) => e,
            DialogEvent::ChoiceMatched(e) => e,
            DialogEvent::ResponseRejected(e) => e,
            DialogEvent::RoundClosed(e) => e,
            DialogEvent::ChoicesReset(e) => e,
            DialogEvent::TimedOut(e) => e,
        }
    }
}

impl DomainEvent for DialogEvent {
    fn subject(&self) -> String {
        self.inner().subject()
    }

    fn aggregate_id(&self) -> Uuid {
        self.inner().aggregate_id()
    }

    fn event_type(&self) -> &'static str {
        self.inner().event_type()
    }
}
