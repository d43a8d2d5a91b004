mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use answer_stream::{
    Block, ContextDocument, HistoryWindow, RunEvent, RunMessage, RunOutcome, Session,
    SessionConfig, SessionError, SessionState, Submission, UsageSink,
};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use support::Harness;

fn answer(harness: &mut Harness, question: &str, fragments: &[&str]) -> Option<RunOutcome> {
    let pending = harness
        .session
        .submit(Submission::question(question))
        .expect("session should be idle");
    let run_id = pending.request.run_id;
    for fragment in fragments {
        harness.session.on_run_chunk(run_id, fragment);
    }
    harness.session.on_run_finished(run_id, None)
}

fn answers(harness: &Harness) -> Vec<String> {
    harness
        .session
        .history()
        .iter()
        .map(|exchange| exchange.answer_text())
        .collect()
}

#[test]
fn streamed_answer_is_delivered_and_recorded() {
    let mut harness = Harness::default();

    let pending = harness
        .session
        .submit(Submission::question("How do I print?").with_context(vec![
            ContextDocument::new("Main.java", "class Main {}"),
        ]))
        .expect("session should be idle");
    let run_id = pending.request.run_id;
    assert_eq!(harness.session.state(), SessionState::InFlight { run_id });
    assert!(!pending.cancel.load(Ordering::SeqCst));

    assert_eq!(harness.session.on_run_chunk(run_id, "Here is:\n```ja"), 0);
    assert!(harness.session.history().is_empty());
    assert_eq!(
        harness
            .session
            .on_run_chunk(run_id, "va\nSystem.out.println(1);\n```\nDone.\n"),
        2
    );
    assert_eq!(
        harness.session.on_run_finished(run_id, None),
        Some(RunOutcome::Completed { recorded: true })
    );

    let expected = vec![
        Block::prose("Here is:"),
        Block::code("java", "System.out.println(1);"),
        Block::prose("Done."),
    ];
    assert_eq!(harness.drained_blocks(), expected);
    assert!(harness.session.is_idle());

    let exchange = harness.session.history().current().expect("one exchange");
    assert_eq!(exchange.question(), Some("How do I print?"));
    assert_eq!(exchange.blocks(), expected.as_slice());
    assert!(exchange.context_refs().contains("Main.java"));
    assert_eq!(
        harness.usage.answers(),
        vec![(run_id, "Here is:\n\nSystem.out.println(1);\n\nDone.".to_string())]
    );
}

#[test]
fn aggregate_answer_matches_streamed_answer() {
    let text = "Intro\n```rust\nfn main() {}\n```\ntail";

    let mut streamed = Harness::default();
    answer(&mut streamed, "q", &["Intro\n``", "`rust\nfn main", "() {}\n```\nta", "il"]);

    let mut aggregate = Harness::default();
    let run_id = aggregate
        .session
        .submit(Submission::question("q"))
        .expect("session should be idle")
        .request
        .run_id;
    aggregate
        .session
        .on_run_finished(run_id, Some(text.to_string()));

    assert_eq!(aggregate.drained_blocks(), streamed.drained_blocks());
    assert_eq!(aggregate.session.history(), streamed.session.history());
}

#[test]
fn aggregate_text_is_ignored_once_fragments_streamed() {
    let mut harness = Harness::default();
    let run_id = harness
        .session
        .submit(Submission::question("q"))
        .expect("session should be idle")
        .request
        .run_id;

    harness.session.on_run_chunk(run_id, "streamed answer");
    harness
        .session
        .on_run_finished(run_id, Some("streamed answer".to_string()));

    assert_eq!(answers(&harness), vec!["streamed answer"]);
    assert_eq!(harness.drained_blocks(), vec![Block::prose("streamed answer")]);
}

#[test]
fn cancel_mid_stream_records_nothing_and_returns_to_idle() {
    let mut harness = Harness::default();
    answer(&mut harness, "first", &["kept\n"]);

    let pending = harness
        .session
        .submit(Submission::question("second"))
        .expect("session should be idle");
    let run_id = pending.request.run_id;
    for fragment in ["one\n", "```rust\n", "let partial = 1;\n"] {
        harness.session.on_run_chunk(run_id, fragment);
    }

    assert_eq!(harness.session.cancel(), Some(run_id));
    assert!(pending.cancel.load(Ordering::SeqCst));
    assert!(harness.session.is_idle());
    assert_eq!(harness.session.history().len(), 1);

    assert_eq!(harness.session.cancel(), None);
    assert_eq!(harness.session.on_run_chunk(run_id, "late\n"), 0);
    assert_eq!(harness.session.on_run_finished(run_id, None), None);
    assert_eq!(harness.session.history().len(), 1);

    harness
        .session
        .submit(Submission::question("third"))
        .expect("a new submit succeeds after cancel");

    // "one" was completed by the fence opener; the open code block was discarded.
    assert_eq!(
        harness.drained_blocks(),
        vec![Block::prose("kept"), Block::prose("one")]
    );
}

#[test]
fn backend_acknowledging_cancel_clears_in_flight() {
    let mut harness = Harness::default();
    let run_id = harness
        .session
        .submit(Submission::question("q"))
        .expect("session should be idle")
        .request
        .run_id;

    harness.session.on_run_chunk(run_id, "partial");
    assert_eq!(
        harness.session.apply_run_event(RunEvent::Cancelled { run_id }),
        Some(RunOutcome::Cancelled)
    );

    assert!(harness.session.is_idle());
    assert!(harness.session.history().is_empty());
}

#[test]
fn submit_while_in_flight_fails_fast() {
    let mut harness = Harness::default();
    let run_id = harness
        .session
        .submit(Submission::question("first"))
        .expect("session should be idle")
        .request
        .run_id;

    assert_matches!(
        harness.session.submit(Submission::question("second")),
        Err(SessionError::ConcurrentRequest { run_id: active }) if active == run_id
    );
    assert_eq!(harness.session.active_run_id(), Some(run_id));
}

#[test]
fn submitting_from_an_earlier_exchange_discards_later_ones() {
    let mut harness = Harness::default();
    for (question, text) in [("q0", "e0"), ("q1", "e1"), ("q2", "e2")] {
        answer(&mut harness, question, &[text]);
    }

    let previous = harness
        .session
        .navigate_previous()
        .expect("e1 exists")
        .answer_text();
    assert_eq!(previous, "e1");
    assert_eq!(harness.session.history().cursor(), Some(1));

    answer(&mut harness, "q-new", &["eNew"]);

    assert_eq!(answers(&harness), vec!["e0", "e1", "eNew"]);
    assert_eq!(harness.session.history().cursor(), Some(2));
}

#[test]
fn identical_answer_leaves_history_unchanged() {
    let mut harness = Harness::default();
    answer(&mut harness, "q", &["X"]);

    let outcome = answer(&mut harness, "q again", &["X"]);

    assert_eq!(outcome, Some(RunOutcome::Completed { recorded: false }));
    assert_eq!(harness.session.history().len(), 1);
    assert!(harness.session.is_idle());
}

#[test]
fn regeneration_replaces_the_newest_exchange() {
    let mut harness = Harness::default();
    answer(&mut harness, "q0", &["e0"]);
    answer(&mut harness, "q1", &["e1"]);

    let pending = harness
        .session
        .submit(Submission::question("q1").regenerating())
        .expect("session should be idle");
    assert_eq!(harness.session.history().len(), 2);
    assert_eq!(
        pending.request.messages,
        vec![
            RunMessage::UserText {
                text: "q0".to_string()
            },
            RunMessage::AssistantText {
                text: "e0".to_string()
            },
            RunMessage::UserText {
                text: "q1".to_string()
            },
        ]
    );

    let run_id = pending.request.run_id;
    harness.session.on_run_chunk(run_id, "e1 retry");
    harness.session.on_run_finished(run_id, None);

    assert_eq!(answers(&harness), vec!["e0", "e1 retry"]);
    assert_eq!(harness.session.history().cursor(), Some(1));
}

#[test]
fn cancelled_regeneration_keeps_the_original_answer() {
    let mut harness = Harness::default();
    answer(&mut harness, "q0", &["e0"]);

    harness
        .session
        .submit(Submission::question("q0").regenerating())
        .expect("session should be idle");
    harness.session.cancel();

    assert_eq!(answers(&harness), vec!["e0"]);
}

#[test]
fn regeneration_on_empty_history_appends() {
    let mut harness = Harness::default();

    answer_with(&mut harness, Submission::question("q").regenerating(), "first");

    assert_eq!(answers(&harness), vec!["first"]);
}

fn answer_with(harness: &mut Harness, submission: Submission, text: &str) {
    let run_id = harness
        .session
        .submit(submission)
        .expect("session should be idle")
        .request
        .run_id;
    harness.session.on_run_chunk(run_id, text);
    harness.session.on_run_finished(run_id, None);
}

#[test]
fn backend_error_is_recorded_and_reported() {
    let mut harness = Harness::default();
    let run_id = harness
        .session
        .submit(Submission::question("q"))
        .expect("session should be idle")
        .request
        .run_id;

    harness.session.on_run_chunk(run_id, "Partial answer\n");
    assert_eq!(
        harness.session.on_run_failed(run_id, "401 unauthorized"),
        Some(RunOutcome::Errored { recorded: true })
    );

    let expected = vec![
        Block::prose("Partial answer"),
        Block::prose("Error: 401 unauthorized"),
    ];
    assert_eq!(harness.drained_blocks(), expected);
    assert_eq!(
        harness.session.history().current().map(|e| e.blocks().to_vec()),
        Some(expected)
    );

    let reported = harness.reporter.errors();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].run_id, run_id);
    assert_eq!(reported[0].message, "401 unauthorized");
    assert!(harness.usage.answers().is_empty());
    assert!(harness.session.is_idle());
}

#[test]
fn stale_events_are_ignored() {
    let mut harness = Harness::default();
    let first = harness
        .session
        .submit(Submission::question("first"))
        .expect("session should be idle")
        .request
        .run_id;
    harness.session.cancel();

    let second = harness
        .session
        .submit(Submission::question("second"))
        .expect("session should be idle")
        .request
        .run_id;
    assert_ne!(first, second);

    assert_eq!(harness.session.on_run_chunk(first, "stale\n"), 0);
    assert_eq!(harness.session.on_run_failed(first, "stale"), None);
    assert_eq!(harness.session.active_run_id(), Some(second));

    harness.session.on_run_chunk(second, "fresh");
    harness.session.on_run_finished(second, None);
    assert_eq!(answers(&harness), vec!["fresh"]);
}

#[test]
fn stream_state_is_fresh_for_every_request() {
    let mut harness = Harness::default();
    let run_id = harness
        .session
        .submit(Submission::question("q"))
        .expect("session should be idle")
        .request
        .run_id;
    harness.session.on_run_chunk(run_id, "```rust\nunfinished");
    assert_eq!(
        harness.session.stream_state().and_then(|state| state.code_tag()),
        Some("rust")
    );
    harness.session.cancel();
    assert!(harness.session.stream_state().is_none());

    harness
        .session
        .submit(Submission::question("next"))
        .expect("session should be idle");
    let state = harness.session.stream_state().expect("request in flight");
    assert!(state.is_empty());
}

#[test]
fn history_window_limits_replayed_messages() {
    let mut harness = Harness::new(SessionConfig {
        history_window: HistoryWindow::Last(1),
    });
    answer(&mut harness, "q0", &["e0"]);
    answer(&mut harness, "q1", &["e1"]);

    let pending = harness
        .session
        .submit(Submission::question("q2"))
        .expect("session should be idle");

    assert_eq!(
        pending.request.messages,
        vec![
            RunMessage::UserText {
                text: "q1".to_string()
            },
            RunMessage::AssistantText {
                text: "e1".to_string()
            },
            RunMessage::UserText {
                text: "q2".to_string()
            },
        ]
    );
}

#[test]
fn system_initiated_exchange_has_no_question() {
    let mut harness = Harness::default();

    answer_with(
        &mut harness,
        Submission::system().with_context(vec![ContextDocument::new("lib.rs", "")]),
        "This file declares the crate root.",
    );

    let exchange = harness.session.history().current().expect("one exchange");
    assert_eq!(exchange.question(), None);
    assert!(exchange.context_refs().contains("lib.rs"));

    let pending = harness
        .session
        .submit(Submission::question("and then?"))
        .expect("session should be idle");
    assert_eq!(
        pending.request.messages,
        vec![
            RunMessage::AssistantText {
                text: "This file declares the crate root.".to_string()
            },
            RunMessage::UserText {
                text: "and then?".to_string()
            },
        ]
    );
}

struct PanickingUsage;

impl UsageSink for PanickingUsage {
    fn record_answer(&self, _run_id: u64, _answer_text: &str) {
        panic!("usage sink failure");
    }
}

#[test]
fn observer_panic_does_not_affect_the_session() {
    let (queue, rendered) = support::recording_queue();
    let mut session =
        Session::new(queue, SessionConfig::default()).with_usage_sink(Arc::new(PanickingUsage));
    let run_id = session
        .submit(Submission::question("q"))
        .expect("session should be idle")
        .request
        .run_id;

    session.on_run_chunk(run_id, "still recorded");

    assert_eq!(
        session.on_run_finished(run_id, None),
        Some(RunOutcome::Completed { recorded: true })
    );
    assert_eq!(session.history().len(), 1);
    assert!(session.delivery().wait_until_drained(support::DEADLINE));
    assert_eq!(rendered.blocks(), vec![Block::prose("still recorded")]);
}
