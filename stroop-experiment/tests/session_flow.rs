//! End-to-end drive of a small session: id entry, practice with one redo,
//! the full experimental phase with rest breaks, and the final summary.

use rand::rngs::StdRng;
use rand::SeedableRng;
use stroop_core::{Condition, StimulusCatalog, TaskPhase, WordEntry};
use stroop_experiment::{
    summarize, Session, SessionEvent, SessionInput, SessionPhase, TaskConfig,
};

const SEC: u64 = 1_000_000_000;

fn catalog() -> StimulusCatalog {
    let mut entries = Vec::new();
    for condition in Condition::EXPERIMENTAL {
        for i in 0..8 {
            entries.push(WordEntry {
                word: format!("{}-{i}", condition.as_str()),
                category: condition,
            });
        }
    }
    StimulusCatalog::new(entries, (0..4).map(|i| format!("p-{i}")).collect())
}

fn config() -> TaskConfig {
    TaskConfig {
        n_per_condition: 4,
        trials_per_block: 5,
        rest_window_secs: (1.0, 4.0),
        ..TaskConfig::pilot()
    }
}

fn respond_correct(session: &mut Session<StdRng>, now: u64) -> Vec<SessionEvent> {
    let color = session.current_trial().unwrap().correct_answer;
    session.handle_input(
        now,
        SessionInput::Respond {
            color,
            measured_latency_ms: None,
        },
    )
}

fn respond_wrong(session: &mut Session<StdRng>, now: u64) -> Vec<SessionEvent> {
    let trial = session.current_trial().unwrap().clone();
    let color = *session
        .config()
        .color_set
        .colors()
        .iter()
        .find(|c| **c != trial.correct_answer)
        .unwrap();
    session.handle_input(
        now,
        SessionInput::Respond {
            color,
            measured_latency_ms: None,
        },
    )
}

#[test]
fn full_session_flow_with_practice_redo() {
    let mut session = Session::new(config(), catalog(), StdRng::seed_from_u64(2024)).unwrap();
    let mut now = 0;

    session.handle_input(now, SessionInput::SetParticipant("P042".into()));
    while matches!(session.phase(), SessionPhase::PracticeInstructions { .. }) {
        session.handle_input(now, SessionInput::Acknowledge);
    }
    assert_eq!(*session.phase(), SessionPhase::PracticeTrial);

    // First practice attempt: all wrong, which forces a redo.
    for _ in 0..4 {
        now += 2 * SEC;
        respond_wrong(&mut session, now);
    }
    let events = session.tick(now);
    assert!(matches!(
        events.as_slice(),
        [SessionEvent::PracticeRedo { attempt: 2 }]
    ));
    assert!(session.practice_records().is_empty());

    // Second attempt: all correct.
    while matches!(session.phase(), SessionPhase::PracticeInstructions { .. }) {
        session.handle_input(now, SessionInput::Acknowledge);
    }
    for _ in 0..4 {
        now += 2 * SEC;
        respond_correct(&mut session, now);
    }
    let events = session.tick(now);
    assert!(matches!(
        events.as_slice(),
        [SessionEvent::PracticeGatePassed { accuracy }] if *accuracy == 1.0
    ));

    // Main task: 12 trials, rest breaks after trials 5 and 10.
    session.handle_input(now, SessionInput::Acknowledge);
    assert_eq!(*session.phase(), SessionPhase::ExperimentalTrial);

    let mut rest_blocks = Vec::new();
    let mut completed = false;
    let mut guard = 0;
    while !completed {
        guard += 1;
        assert!(guard < 500, "session stalled");
        match session.phase().clone() {
            SessionPhase::ExperimentalTrial => {
                if session.trial_armed() {
                    now += SEC;
                    let events = respond_correct(&mut session, now);
                    completed = events
                        .iter()
                        .any(|e| matches!(e, SessionEvent::SessionCompleted));
                } else {
                    now += 2 * SEC;
                    let events = session.tick(now);
                    for e in &events {
                        if let SessionEvent::RestStarted { block } = e {
                            rest_blocks.push(*block);
                        }
                    }
                }
            }
            SessionPhase::RestBreak { .. } => {
                now += 5 * SEC;
                session.tick(now);
            }
            other => panic!("unexpected phase {other:?}"),
        }
    }

    assert_eq!(rest_blocks, vec![1, 2]);
    assert_eq!(session.experimental_records().len(), 12);
    assert_eq!(session.practice_records().len(), 4);
    assert_eq!(session.practice_redos(), 1);

    let summary = session.summary().expect("summary computed at completion");
    assert_eq!(summary.participant_id, "P042");
    assert_eq!(summary.n_total, 12);
    assert_eq!(summary.acc_overall, Some(1.0));
    for stats in [&summary.positive, &summary.negative, &summary.neutral] {
        assert_eq!(stats.n, 4);
        assert!(stats.mean_rt.is_some());
    }
    // All records are experimental-phase and per-condition counts hold.
    assert!(session
        .experimental_records()
        .iter()
        .all(|r| r.phase == TaskPhase::Experimental));

    // Recomputing from the same finalized inputs yields identical values.
    let again = summarize(
        session.experimental_records(),
        session.practice_records(),
        summary.started_at,
        summary.ended_at,
    );
    assert_eq!(&again, summary);
}
