//! Dialog session aggregate - one round of multiple-choice conversation
//!
//! A session holds the replies it currently accepts and a single expiration
//! timer. Two states matter:
//! - idle: no choices; any message falls through to the no-match branch
//! - awaiting a choice: entered by [`DialogSession::add_choice`], left by a
//!   matching reply, by an unmatched reply outside explicit mode, or by expiry
//!
//! Expiry replies to the originating message and notifies observers. It does
//! not clear the choices; the owner decides when the session is discarded.

use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::DialogConfig;
use crate::errors::{DialogError, DialogResult};
use crate::events::{
    ChoiceMatched, ChoiceRegistered, ChoicesReset, DialogEvent, DialogTimedOut, ResponseRejected,
    RoundClosed,
};
use crate::handlers::{ChatMessage, TimeoutListener};
use crate::timer::{Scheduler, TimerHandle};
use crate::value_objects::{Choice, ExplicitPrompt, MatchResult, ReceiveOutcome};

const EVENT_CAPACITY: usize = 64;

/// State reachable from the timer task
struct Expiry<M: ChatMessage> {
    session_id: Uuid,
    origin: Arc<M>,
    timeout_message: String,
    /// Bumped on every arm, cancel and fire; a task holding an older value is stale
    generation: AtomicU64,
    listeners: Mutex<Vec<TimeoutListener<M>>>,
    events: broadcast::Sender<DialogEvent>,
}

impl<M: ChatMessage> Expiry<M> {
    fn arm(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn disarm(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn publish(&self, event: DialogEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    fn fire(&self, generation: u64) {
        if self
            .generation
            .compare_exchange(generation, generation + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            trace!(session_id = %self.session_id, "ignoring stale expiration timer");
            return;
        }

        info!(session_id = %self.session_id, "dialog timed out");
        if let Err(error) = self.origin.reply(&self.timeout_message) {
            warn!(session_id = %self.session_id, %error, "failed to send timeout reply");
        }

        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(self.origin.as_ref());
        }

        self.publish(DialogEvent::TimedOut(DialogTimedOut {
            session_id: self.session_id,
            timeout_message: self.timeout_message.clone(),
            timed_out_at: Utc::now(),
        }));
    }
}

/// Single-round multiple-choice dialog with an inactivity timeout
pub struct DialogSession<M: ChatMessage> {
    id: Uuid,
    /// Registration order is match priority
    choices: Vec<Choice<M>>,
    /// Re-prompt instead of closing the round on an unmatched reply
    explicit: bool,
    config: DialogConfig,
    scheduler: Arc<dyn Scheduler>,
    timer: Option<TimerHandle>,
    expiry: Arc<Expiry<M>>,
}

impl<M: ChatMessage> DialogSession<M> {
    /// Open a session with the default timeout. The clock starts immediately.
    pub fn new(origin: Arc<M>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_config(origin, DialogConfig::default(), scheduler)
    }

    /// Open a session with explicit timeout settings
    pub fn with_config(origin: Arc<M>, config: DialogConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        let config = config.resolved();
        let id = Uuid::new_v4();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let expiry = Arc::new(Expiry {
            session_id: id,
            origin,
            timeout_message: config.timeout_message.clone(),
            generation: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
            events,
        });

        let mut session = Self {
            id,
            choices: Vec::new(),
            explicit: false,
            config,
            scheduler,
            timer: None,
            expiry,
        };

        debug!(session_id = %id, timeout = ?session.config.timeout, "dialog session opened");
        session.start_timer();
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &DialogConfig {
        &self.config
    }

    /// The message that opened the conversation
    pub fn originating_message(&self) -> &Arc<M> {
        &self.expiry.origin
    }

    /// Whether replies must match a registered choice
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn set_explicit(&mut self, explicit: bool) {
        self.explicit = explicit;
    }

    /// Choices of the current round, in registration order
    pub fn choices(&self) -> &[Choice<M>] {
        &self.choices
    }

    /// Whether a round is waiting for an answer
    pub fn is_active(&self) -> bool {
        !self.choices.is_empty()
    }

    /// Drop every choice of the current round. The timer is left alone.
    pub fn reset_choices(&mut self) {
        let discarded = self.choices.len();
        debug!(session_id = %self.id, discarded, "resetting choices");
        self.choices.clear();

        if discarded > 0 {
            self.expiry.publish(DialogEvent::ChoicesReset(ChoicesReset {
                session_id: self.id,
                discarded_choices: discarded,
                reset_at: Utc::now(),
            }));
        }
    }

    /// Register an acceptable reply and restart the inactivity clock
    pub fn add_choice(&mut self, choice: Choice<M>) {
        debug!(
            session_id = %self.id,
            pattern = choice.pattern().as_str(),
            label = ?choice.label(),
            "registering choice"
        );

        let event = ChoiceRegistered {
            session_id: self.id,
            pattern: choice.pattern().as_str().to_string(),
            label: choice.label().map(str::to_string),
            kind: choice.kind().map(str::to_string),
            choice_count: self.choices.len() + 1,
            registered_at: Utc::now(),
        };

        self.choices.push(choice);
        self.restart_timer();
        self.expiry.publish(DialogEvent::ChoiceRegistered(event));
    }

    /// Compile `pattern` and register it, optionally labelled and tagged
    pub fn add_choice_pattern<F>(
        &mut self,
        pattern: &str,
        handler: F,
        label: Option<&str>,
        kind: Option<&str>,
    ) -> DialogResult<()>
    where
        F: FnOnce(&mut DialogSession<M>, &mut M) -> anyhow::Result<()> + Send + 'static,
    {
        let mut choice = Choice::new(pattern, handler)?;
        if let Some(label) = label {
            choice = choice.with_label(label);
        }
        if let Some(kind) = kind {
            choice = choice.with_kind(kind);
        }
        self.add_choice(choice);
        Ok(())
    }

    /// Offer an inbound message to the current round.
    ///
    /// The first choice, in registration order, whose pattern occurs anywhere
    /// in the text wins: the round closes, the timer stops, the captures are
    /// stored on `message` and the handler runs. A message without text never
    /// matches.
    pub fn receive(&mut self, message: &mut M) -> DialogResult<ReceiveOutcome> {
        let text = message.text().map(str::to_owned);
        debug!(session_id = %self.id, choices = self.choices.len(), "receiving message");

        let hit = text.as_deref().and_then(|text| {
            self.choices.iter().enumerate().find_map(|(index, choice)| {
                trace!(pattern = choice.pattern().as_str(), text, "checking choice");
                choice.find(text).map(|result| (index, result))
            })
        });

        match hit {
            Some((index, result)) => self.accept(index, result, message),
            None => self.reject(text, message),
        }
    }

    /// Register a callback run with the originating message on every expiry
    pub fn on_timeout<F>(&self, listener: F)
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.expiry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Stream of every event this session publishes from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DialogEvent> {
        self.expiry.events.subscribe()
    }

    fn accept(
        &mut self,
        index: usize,
        result: MatchResult,
        message: &mut M,
    ) -> DialogResult<ReceiveOutcome> {
        let mut choices = std::mem::take(&mut self.choices);
        self.cancel_timer();
        let (handler, label, kind) = choices.swap_remove(index).into_parts();
        drop(choices);

        info!(session_id = %self.id, index, label = ?label, "choice matched");
        self.expiry.publish(DialogEvent::ChoiceMatched(ChoiceMatched {
            session_id: self.id,
            index,
            label: label.clone(),
            kind: kind.clone(),
            matched_text: result.matched.clone(),
            matched_at: Utc::now(),
        }));

        message.set_match(result);
        handler(self, message).map_err(DialogError::Handler)?;

        Ok(ReceiveOutcome::Matched { index, label, kind })
    }

    fn reject(&mut self, text: Option<String>, message: &mut M) -> DialogResult<ReceiveOutcome> {
        if self.explicit && !self.choices.is_empty() {
            let labels = self
                .choices
                .iter()
                .filter_map(|choice| choice.label().map(str::to_string))
                .collect();
            let prompt = ExplicitPrompt::for_labels(labels);

            // Same round, fresh window
            self.restart_timer();

            info!(session_id = %self.id, quick_replies = ?prompt.quick_replies, "re-prompting");
            self.expiry.publish(DialogEvent::ResponseRejected(ResponseRejected {
                session_id: self.id,
                received_text: text,
                quick_replies: prompt.quick_replies.clone(),
                rejected_at: Utc::now(),
            }));

            message.send(&prompt).map_err(DialogError::Delivery)?;
            return Ok(ReceiveOutcome::Reprompted(prompt));
        }

        let discarded = self.choices.len();
        self.choices.clear();
        self.cancel_timer();

        if discarded > 0 {
            debug!(session_id = %self.id, discarded, "no choice matched, closing round");
            self.expiry.publish(DialogEvent::RoundClosed(RoundClosed {
                session_id: self.id,
                discarded_choices: discarded,
                closed_at: Utc::now(),
            }));
        }

        Ok(ReceiveOutcome::Ignored)
    }

    fn start_timer(&mut self) {
        let generation = self.expiry.arm();
        let expiry = self.expiry.clone();

        trace!(session_id = %self.id, generation, "arming expiration timer");
        let handle = self.scheduler.schedule(
            self.config.timeout,
            Box::new(move || expiry.fire(generation)),
        );
        self.timer = Some(handle);
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.expiry.disarm();
    }

    fn restart_timer(&mut self) {
        self.cancel_timer();
        self.start_timer();
    }
}

impl<M: ChatMessage> Drop for DialogSession<M> {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

impl<M: ChatMessage> fmt::Debug for DialogSession<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogSession")
            .field("id", &self.id)
            .field("choices", &self.choices)
            .field("explicit", &self.explicit)
            .field("config", &self.config)
            .field("timer_armed", &self.timer.as_ref().is_some_and(|t| !t.is_cancelled()))
            .finish()
    }
}
