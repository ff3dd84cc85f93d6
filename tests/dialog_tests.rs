//! Tests for the dialog session state machine

use choice_dialog::{
    ChannelMessage, Choice, DialogConfig, DialogSession, MessageContent, Outbound,
    ReceiveOutcome, VirtualScheduler,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

struct Harness {
    clock: Arc<VirtualScheduler>,
    outbound: mpsc::UnboundedSender<Outbound>,
    sent: mpsc::UnboundedReceiver<Outbound>,
    session: DialogSession<ChannelMessage>,
    timeouts: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(DialogConfig::default())
    }

    fn with_config(config: DialogConfig) -> Self {
        let clock = Arc::new(VirtualScheduler::new());
        let (outbound, sent) = mpsc::unbounded_channel();
        let origin = Arc::new(ChannelMessage::plain(
            "#ops",
            "alice",
            "deploy to production",
            outbound.clone(),
        ));
        let session = DialogSession::with_config(origin, config, clock.clone());

        let timeouts = Arc::new(AtomicUsize::new(0));
        let counter = timeouts.clone();
        session.on_timeout(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        Self {
            clock,
            outbound,
            sent,
            session,
            timeouts,
        }
    }

    fn message(&self, text: &str) -> ChannelMessage {
        ChannelMessage::plain("#ops", "alice", text, self.outbound.clone())
    }

    fn drain_outbound(&mut self) -> Vec<Outbound> {
        let mut items = Vec::new();
        while let Ok(item) = self.sent.try_recv() {
            items.push(item);
        }
        items
    }

    fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::SeqCst)
    }
}

fn record(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Choice<ChannelMessage> {
    let log = log.clone();
    Choice::new(name, move |_, _| {
        log.lock().unwrap().push(name);
        Ok(())
    })
    .unwrap()
}

#[test]
fn test_choices_keep_registration_order() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in ["red", "green", "blue"] {
        h.session.add_choice(record(&log, name).with_label(name));
    }

    let labels: Vec<_> = h.session.choices().iter().map(|c| c.label().unwrap()).collect();
    assert_eq!(labels, vec!["red", "green", "blue"]);
}

#[test]
fn test_first_registered_match_wins() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = log.clone();
    let second = log.clone();

    h.session.add_choice(
        Choice::new("ye", move |_, _| {
            first.lock().unwrap().push("first");
            Ok(())
        })
        .unwrap(),
    );
    h.session.add_choice(
        Choice::new("yes", move |_, _| {
            second.lock().unwrap().push("second");
            Ok(())
        })
        .unwrap(),
    );

    let mut reply = h.message("yes");
    let outcome = h.session.receive(&mut reply).unwrap();

    assert!(matches!(outcome, ReceiveOutcome::Matched { index: 0, .. }));
    assert_eq!(*log.lock().unwrap(), vec!["first"]);
}

#[test]
fn test_pattern_matches_anywhere_in_text() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.add_choice(record(&log, "yes"));

    let mut reply = h.message("well, yes I suppose");
    assert!(h.session.receive(&mut reply).unwrap().is_match());
    assert_eq!(reply.match_result.unwrap().matched, "yes");
}

#[test]
fn test_match_cancels_timeout() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.add_choice(record(&log, "yes"));

    let mut reply = h.message("yes");
    h.session.receive(&mut reply).unwrap();

    assert!(h.session.choices().is_empty());
    h.clock.advance(Duration::from_secs(120));
    assert_eq!(h.timeouts(), 0);
    assert!(h.drain_outbound().is_empty());
}

#[test]
fn test_receive_without_round_is_noop() {
    let mut h = Harness::new();

    let mut stray = h.message("hello?");
    let outcome = h.session.receive(&mut stray).unwrap();

    assert_eq!(outcome, ReceiveOutcome::Ignored);
    assert!(stray.match_result.is_none());
    assert!(h.drain_outbound().is_empty());
    assert_eq!(h.clock.pending(), 0);
}

#[test]
fn test_unmatched_reply_closes_round_outside_explicit_mode() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.add_choice(record(&log, "yes").with_label("Yes"));

    let mut reply = h.message("nope");
    let outcome = h.session.receive(&mut reply).unwrap();

    assert_eq!(outcome, ReceiveOutcome::Ignored);
    assert!(!h.session.is_active());
    assert!(h.drain_outbound().is_empty());

    h.clock.advance(Duration::from_secs(60));
    assert_eq!(h.timeouts(), 0);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_explicit_single_label_reprompt() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.set_explicit(true);
    h.session.add_choice(record(&log, "yes").with_label("Yes"));

    let mut reply = h.message("what?");
    let outcome = h.session.receive(&mut reply).unwrap();

    match h.drain_outbound().as_slice() {
        [Outbound::Prompt { conversation, prompt }] => {
            assert_eq!(conversation, "#ops");
            assert!(prompt.text.contains("Please say Yes to continue."));
            assert_eq!(prompt.quick_replies, vec!["Yes"]);
        }
        other => panic!("expected one prompt, got {other:?}"),
    }
    assert!(matches!(outcome, ReceiveOutcome::Reprompted(_)));
    assert_eq!(h.session.choices().len(), 1);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_explicit_many_labels_reprompt() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.set_explicit(true);
    h.session.add_choice(record(&log, "yes").with_label("Yes"));
    h.session.add_choice(record(&log, "no").with_label("No"));
    h.session.add_choice(record(&log, "maybe").with_label("Maybe"));

    let mut reply = h.message("purple");
    let outcome = h.session.receive(&mut reply).unwrap();

    let ReceiveOutcome::Reprompted(prompt) = outcome else {
        panic!("expected a re-prompt");
    };
    assert!(prompt.text.contains("Please say one of Yes, No or Maybe to continue."));
    assert_eq!(prompt.quick_replies, vec!["Yes", "No", "Maybe"]);
    assert_eq!(h.session.choices().len(), 3);
}

#[test]
fn test_explicit_without_labels_sends_generic_prompt() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.set_explicit(true);
    h.session.add_choice(record(&log, "yes"));

    let mut reply = h.message("eh");
    let ReceiveOutcome::Reprompted(prompt) = h.session.receive(&mut reply).unwrap() else {
        panic!("expected a re-prompt");
    };

    assert_eq!(prompt.text, "Sorry, I didn't understand your response.");
    assert!(prompt.quick_replies.is_empty());
}

#[test]
fn test_explicit_mode_without_round_is_noop() {
    let mut h = Harness::new();
    h.session.set_explicit(true);

    let mut stray = h.message("hello?");
    assert_eq!(h.session.receive(&mut stray).unwrap(), ReceiveOutcome::Ignored);
    assert!(h.drain_outbound().is_empty());
}

#[test]
fn test_explicit_reprompt_then_match() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.set_explicit(true);
    h.session.add_choice(record(&log, "yes").with_label("yes"));
    h.session.add_choice(record(&log, "no").with_label("no"));

    let mut garbled = h.message("mmm");
    h.session.receive(&mut garbled).unwrap();
    let mut answer = h.message("no");
    h.session.receive(&mut answer).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["no"]);
    assert!(!h.session.is_active());
}

#[test]
fn test_message_without_text_never_matches() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.set_explicit(true);
    let seen = log.clone();
    let anything = Choice::new(".*", move |_, _| {
        seen.lock().unwrap().push("any");
        Ok(())
    })
    .unwrap()
    .with_label("anything");
    h.session.add_choice(anything);

    let mut sticker = ChannelMessage::new(
        "#ops",
        "alice",
        MessageContent::Structured(serde_json::json!({ "sticker": "thumbs-up" })),
        h.outbound.clone(),
    );
    let outcome = h.session.receive(&mut sticker).unwrap();

    assert!(matches!(outcome, ReceiveOutcome::Reprompted(_)));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_timeout_fires_once_with_default_message() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.add_choice(record(&log, "yes"));

    h.clock.advance(Duration::from_millis(29_999));
    assert_eq!(h.timeouts(), 0);

    h.clock.advance(Duration::from_millis(1));
    assert_eq!(h.timeouts(), 1);
    assert_eq!(
        h.drain_outbound(),
        vec![Outbound::Reply {
            conversation: "#ops".to_string(),
            author: "alice".to_string(),
            text: "Timed out!, please start again.".to_string(),
        }]
    );

    h.clock.advance(Duration::from_secs(300));
    assert_eq!(h.timeouts(), 1);
}

#[test]
fn test_timeout_uses_configured_message_and_duration() {
    let config = DialogConfig::new()
        .with_timeout(Duration::from_secs(5))
        .with_timeout_message("Too slow, try again.");
    let mut h = Harness::with_config(config);

    h.clock.advance(Duration::from_secs(5));

    assert_eq!(h.timeouts(), 1);
    match h.drain_outbound().as_slice() {
        [Outbound::Reply { text, .. }] => assert_eq!(text, "Too slow, try again."),
        other => panic!("expected timeout reply, got {other:?}"),
    }
}

#[test]
fn test_construction_starts_the_clock() {
    let h = Harness::new();
    h.clock.advance(Duration::from_secs(30));
    assert_eq!(h.timeouts(), 1);
}

#[test]
fn test_add_choice_resets_timeout_window() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    h.clock.advance(Duration::from_secs(20));
    h.session.add_choice(record(&log, "yes"));

    h.clock.advance(Duration::from_millis(29_999));
    assert_eq!(h.timeouts(), 0, "fired before t=50s");

    h.clock.advance(Duration::from_millis(1));
    assert_eq!(h.timeouts(), 1);
    assert_eq!(h.clock.now(), Duration::from_secs(50));
}

#[test]
fn test_explicit_reprompt_resets_timeout_window() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.set_explicit(true);
    h.session.add_choice(record(&log, "yes").with_label("Yes"));

    h.clock.advance(Duration::from_secs(20));
    let mut reply = h.message("hmm");
    h.session.receive(&mut reply).unwrap();

    h.clock.advance(Duration::from_secs(29));
    assert_eq!(h.timeouts(), 0);
    h.clock.advance(Duration::from_secs(1));
    assert_eq!(h.timeouts(), 1);
}

#[test]
fn test_choices_survive_timeout() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.add_choice(record(&log, "yes"));

    h.clock.advance(Duration::from_secs(30));
    assert_eq!(h.timeouts(), 1);
    assert!(h.session.is_active());

    // Late answer still matches until the owner discards the session
    let mut late = h.message("yes");
    assert!(h.session.receive(&mut late).unwrap().is_match());
    assert_eq!(*log.lock().unwrap(), vec!["yes"]);
}

#[test]
fn test_reset_choices_aborts_round() {
    let mut h = Harness::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    h.session.add_choice(record(&log, "yes"));

    h.session.reset_choices();
    let mut reply = h.message("yes");

    assert_eq!(h.session.receive(&mut reply).unwrap(), ReceiveOutcome::Ignored);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_explicit_flag_accessors() {
    let mut h = Harness::new();
    assert!(!h.session.is_explicit());

    h.session.set_explicit(true);
    assert!(h.session.is_explicit());

    h.session.set_explicit(false);
    assert!(!h.session.is_explicit());
}
