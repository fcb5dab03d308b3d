use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use stroop_core::{
    build_experimental_sequence, build_practice_sequence, InkColor, ResponseRecord,
    StimulusCatalog, TaskPhase, Trial, TrialSequence,
};
use stroop_timing::{elapsed_since_onset, is_expired, rest_gate};

use crate::collector::{score, ResponseOutcome};
use crate::config::{ConfigError, TaskConfig};
use crate::summary::{summarize, SessionSummary};

pub const PRACTICE_INSTRUCTIONS: [&[&str]; 3] = [
    &[
        "A word will appear on screen, printed in a color.",
        "Ignore what the word means; judge only the ink color.",
    ],
    &[
        "Answer with the keyboard.",
        "Each color is bound to one key (shown below the stimulus).",
    ],
    &[
        "A short practice round comes first.",
        "You will see correct/incorrect feedback after each answer.",
    ],
];

pub const EXPERIMENTAL_INSTRUCTIONS: [&[&str]; 1] = [&[
    "Practice is over. The main task starts now.",
    "No feedback will be shown.",
    "As before, answer with the ink color only.",
]];

/// Where the session is. One tagged state at a time; transitions are
/// validated in `tick`/`handle_input`, never encoded as loose flags.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    CollectingParticipantId,
    PracticeInstructions { page: usize },
    PracticeTrial,
    PracticeGate,
    ExperimentalInstructions,
    ExperimentalTrial,
    RestBreak { started_ns: u64, boundary: usize },
    Completed,
    Faulted { reason: String },
}

/// Discrete participant/host input.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    SetParticipant(String),
    Acknowledge,
    Respond {
        color: InkColor,
        /// Externally measured latency in milliseconds, if one arrived.
        measured_latency_ms: Option<f64>,
    },
    ContinueRest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ParticipantRejected,
    InstructionsAdvanced { page: usize },
    TrialFinalized {
        phase: TaskPhase,
        index: usize,
        timed_out: bool,
        correct: bool,
    },
    InputIgnored,
    PracticeRedo { attempt: u32 },
    PracticeGatePassed { accuracy: f64 },
    RestStarted { block: usize },
    RestEnded { block: usize, forced: bool },
    SessionCompleted,
    Faulted { reason: String },
}

/// Last-response feedback, displayed alongside the next trial (practice) or
/// during the ITI (experimental timeouts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Correct,
    Incorrect,
    TooSlow,
}

/// What the host should present right now. The presentation layer owns the
/// pixels; this projection is the timing contract it must honor.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    ParticipantForm,
    Instructions {
        phase: TaskPhase,
        page: usize,
        pages: usize,
        lines: &'static [&'static str],
    },
    Fixation {
        feedback: Option<Feedback>,
    },
    Stimulus {
        word: String,
        color: InkColor,
        feedback: Option<Feedback>,
    },
    Blank {
        too_slow: bool,
    },
    Rest {
        completed_block: usize,
        total_blocks: usize,
        remaining: Duration,
        can_continue: bool,
    },
    Done,
    Fault {
        reason: String,
    },
}

#[derive(Debug, Clone, Copy)]
struct Iti {
    start_ns: u64,
    duration: Duration,
    after_timeout: bool,
}

/// The session state machine. Advances only through `handle_input` (discrete
/// events) and `tick` (deadline checks); timestamps are monotonic nanoseconds
/// supplied by the host clock.
pub struct Session<R: Rng> {
    config: TaskConfig,
    catalog: StimulusCatalog,
    rng: R,
    phase: SessionPhase,
    participant_id: Option<String>,
    practice: Option<TrialSequence>,
    experimental: Option<TrialSequence>,
    practice_cursor: usize,
    exp_cursor: usize,
    practice_records: Vec<ResponseRecord>,
    exp_records: Vec<ResponseRecord>,
    /// Number of practice redos performed so far.
    practice_redos: u32,
    trial_start_ns: Option<u64>,
    iti: Option<Iti>,
    /// Block boundaries (cursor values) whose rest screen has been shown.
    breaks_shown: HashSet<usize>,
    last_feedback: Option<Feedback>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    summary: Option<SessionSummary>,
}

impl<R: Rng> Session<R> {
    pub fn new(
        config: TaskConfig,
        catalog: StimulusCatalog,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            catalog,
            rng,
            phase: SessionPhase::CollectingParticipantId,
            participant_id: None,
            practice: None,
            experimental: None,
            practice_cursor: 0,
            exp_cursor: 0,
            practice_records: Vec::new(),
            exp_records: Vec::new(),
            practice_redos: 0,
            trial_start_ns: None,
            iti: None,
            breaks_shown: HashSet::new(),
            last_feedback: None,
            started_at: None,
            completed_at: None,
            summary: None,
        })
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn participant_id(&self) -> Option<&str> {
        self.participant_id.as_deref()
    }

    pub fn practice_records(&self) -> &[ResponseRecord] {
        &self.practice_records
    }

    pub fn experimental_records(&self) -> &[ResponseRecord] {
        &self.exp_records
    }

    pub fn practice_redos(&self) -> u32 {
        self.practice_redos
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// True while a trial is being presented (fixation or response window).
    pub fn trial_armed(&self) -> bool {
        self.trial_start_ns.is_some()
    }

    /// The trial currently presented (or about to be), if any.
    pub fn current_trial(&self) -> Option<&Trial> {
        match self.phase {
            SessionPhase::PracticeTrial => {
                self.practice.as_ref()?.get(self.practice_cursor)
            }
            SessionPhase::ExperimentalTrial => {
                self.experimental.as_ref()?.get(self.exp_cursor)
            }
            _ => None,
        }
    }

    /// Deadline re-evaluation. Called by the host loop on every tick; expiry,
    /// ITI completion, the practice gate, and rest auto-advance all resolve
    /// here, never only in response to input.
    pub fn tick(&mut self, now_ns: u64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match self.phase {
            SessionPhase::PracticeTrial => self.tick_practice(now_ns, &mut events),
            SessionPhase::PracticeGate => self.resolve_practice_gate(&mut events),
            SessionPhase::ExperimentalTrial => self.tick_experimental(now_ns, &mut events),
            SessionPhase::RestBreak {
                started_ns,
                boundary,
            } => {
                let gate = rest_gate(
                    Duration::from_nanos(now_ns.saturating_sub(started_ns)),
                    self.config.rest_min(),
                    self.config.rest_max(),
                );
                if gate.auto_advance {
                    self.end_rest(now_ns, boundary, true, &mut events);
                }
            }
            _ => {}
        }
        events
    }

    pub fn handle_input(&mut self, now_ns: u64, input: SessionInput) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match (&self.phase, input) {
            (SessionPhase::CollectingParticipantId, SessionInput::SetParticipant(id)) => {
                let id = id.trim().to_owned();
                if id.is_empty() {
                    events.push(SessionEvent::ParticipantRejected);
                    return events;
                }
                self.participant_id = Some(id);
                match build_practice_sequence(&self.catalog, &self.config.color_set, &mut self.rng)
                {
                    Ok(seq) => {
                        self.practice = Some(seq);
                        self.phase = SessionPhase::PracticeInstructions { page: 0 };
                    }
                    Err(e) => self.fault(e.to_string(), &mut events),
                }
            }
            (SessionPhase::PracticeInstructions { page }, SessionInput::Acknowledge) => {
                let next = page + 1;
                if next < PRACTICE_INSTRUCTIONS.len() {
                    self.phase = SessionPhase::PracticeInstructions { page: next };
                    events.push(SessionEvent::InstructionsAdvanced { page: next });
                } else {
                    self.phase = SessionPhase::PracticeTrial;
                    self.trial_start_ns = Some(now_ns);
                }
            }
            (SessionPhase::ExperimentalInstructions, SessionInput::Acknowledge) => {
                match build_experimental_sequence(
                    &self.catalog,
                    &self.config.color_set,
                    self.config.n_per_condition,
                    &mut self.rng,
                ) {
                    Ok(seq) => {
                        self.experimental = Some(seq);
                        self.started_at = Some(Utc::now());
                        self.phase = SessionPhase::ExperimentalTrial;
                        self.trial_start_ns = Some(now_ns);
                    }
                    Err(e) => self.fault(e.to_string(), &mut events),
                }
            }
            (
                SessionPhase::PracticeTrial,
                SessionInput::Respond {
                    color,
                    measured_latency_ms,
                },
            ) => {
                if self.response_window_open(now_ns, TaskPhase::Practice) {
                    self.finalize_practice(
                        now_ns,
                        ResponseOutcome::Pressed {
                            color,
                            measured_latency_ms,
                        },
                        &mut events,
                    );
                } else {
                    events.push(SessionEvent::InputIgnored);
                }
            }
            (
                SessionPhase::ExperimentalTrial,
                SessionInput::Respond {
                    color,
                    measured_latency_ms,
                },
            ) => {
                if self.iti.is_none()
                    && self.response_window_open(now_ns, TaskPhase::Experimental)
                {
                    self.finalize_experimental(
                        now_ns,
                        ResponseOutcome::Pressed {
                            color,
                            measured_latency_ms,
                        },
                        &mut events,
                    );
                } else {
                    events.push(SessionEvent::InputIgnored);
                }
            }
            (
                SessionPhase::RestBreak {
                    started_ns,
                    boundary,
                },
                SessionInput::ContinueRest,
            ) => {
                let (started_ns, boundary) = (*started_ns, *boundary);
                let gate = rest_gate(
                    Duration::from_nanos(now_ns.saturating_sub(started_ns)),
                    self.config.rest_min(),
                    self.config.rest_max(),
                );
                if gate.can_advance {
                    self.end_rest(now_ns, boundary, false, &mut events);
                } else {
                    events.push(SessionEvent::InputIgnored);
                }
            }
            // Late or duplicate responses outside a trial are a defensive
            // no-op; the trial they belonged to has already been scored.
            (_, SessionInput::Respond { .. }) => {
                events.push(SessionEvent::InputIgnored);
            }
            _ => {}
        }
        events
    }

    /// Read-only projection of what should be on screen at `now_ns`.
    pub fn screen(&self, now_ns: u64) -> Screen {
        match &self.phase {
            SessionPhase::CollectingParticipantId => Screen::ParticipantForm,
            SessionPhase::PracticeInstructions { page } => Screen::Instructions {
                phase: TaskPhase::Practice,
                page: *page,
                pages: PRACTICE_INSTRUCTIONS.len(),
                lines: PRACTICE_INSTRUCTIONS[*page],
            },
            SessionPhase::ExperimentalInstructions => Screen::Instructions {
                phase: TaskPhase::Experimental,
                page: 0,
                pages: EXPERIMENTAL_INSTRUCTIONS.len(),
                lines: EXPERIMENTAL_INSTRUCTIONS[0],
            },
            SessionPhase::PracticeTrial => self.trial_screen(now_ns, TaskPhase::Practice),
            SessionPhase::PracticeGate => Screen::Blank { too_slow: false },
            SessionPhase::ExperimentalTrial => {
                self.trial_screen(now_ns, TaskPhase::Experimental)
            }
            SessionPhase::RestBreak {
                started_ns,
                boundary,
            } => {
                let elapsed = Duration::from_nanos(now_ns.saturating_sub(*started_ns));
                let gate = rest_gate(elapsed, self.config.rest_min(), self.config.rest_max());
                let total = self
                    .experimental
                    .as_ref()
                    .map_or(0, |s| s.len() / self.config.trials_per_block);
                Screen::Rest {
                    completed_block: boundary / self.config.trials_per_block,
                    total_blocks: total,
                    remaining: self.config.rest_max().saturating_sub(elapsed),
                    can_continue: gate.can_advance,
                }
            }
            SessionPhase::Completed => Screen::Done,
            SessionPhase::Faulted { reason } => Screen::Fault {
                reason: reason.clone(),
            },
        }
    }

    fn trial_screen(&self, now_ns: u64, phase: TaskPhase) -> Screen {
        if phase == TaskPhase::Experimental {
            if let Some(iti) = self.iti {
                return Screen::Blank {
                    too_slow: iti.after_timeout,
                };
            }
        }
        let feedback = match phase {
            TaskPhase::Practice => self.last_feedback,
            TaskPhase::Experimental => None,
        };
        let Some(start) = self.trial_start_ns else {
            return Screen::Blank { too_slow: false };
        };
        let onset = start + self.current_delay(phase).as_nanos() as u64;
        if now_ns < onset {
            return Screen::Fixation { feedback };
        }
        match self.current_trial() {
            Some(trial) => Screen::Stimulus {
                word: trial.text.clone(),
                color: trial.display_color,
                feedback,
            },
            None => Screen::Blank { too_slow: false },
        }
    }

    /// Pre-stimulus delay in effect for the current trial. Practice trials
    /// that carry a feedback banner use the feedback variant.
    fn current_delay(&self, phase: TaskPhase) -> Duration {
        match phase {
            TaskPhase::Practice => self
                .config
                .pre_stimulus_delay(self.last_feedback.is_some()),
            TaskPhase::Experimental => self.config.pre_stimulus_delay(false),
        }
    }

    /// Input is accepted only between stimulus onset and expiry.
    fn response_window_open(&self, now_ns: u64, phase: TaskPhase) -> bool {
        let Some(start) = self.trial_start_ns else {
            return false;
        };
        let delay = self.current_delay(phase);
        let onset = start + delay.as_nanos() as u64;
        now_ns >= onset && !is_expired(now_ns, start, delay, self.config.max_response())
    }

    fn tick_practice(&mut self, now_ns: u64, events: &mut Vec<SessionEvent>) {
        let Some(start) = self.trial_start_ns else {
            return;
        };
        let delay = self.current_delay(TaskPhase::Practice);
        if is_expired(now_ns, start, delay, self.config.max_response()) {
            self.finalize_practice(now_ns, ResponseOutcome::Timeout, events);
        }
    }

    fn finalize_practice(
        &mut self,
        now_ns: u64,
        outcome: ResponseOutcome,
        events: &mut Vec<SessionEvent>,
    ) {
        let Some(start) = self.trial_start_ns else {
            return;
        };
        let Some(trial) = self
            .practice
            .as_ref()
            .and_then(|s| s.get(self.practice_cursor))
            .cloned()
        else {
            return;
        };
        let onset = start + self.current_delay(TaskPhase::Practice).as_nanos() as u64;
        let record = score(
            &trial,
            self.participant_id.as_deref().unwrap_or_default(),
            TaskPhase::Practice,
            outcome,
            elapsed_since_onset(now_ns, onset),
            self.config.max_response(),
        );
        let timed_out = matches!(outcome, ResponseOutcome::Timeout);
        let correct = record.is_correct();
        let index = self.practice_cursor;
        self.last_feedback = Some(if timed_out {
            Feedback::TooSlow
        } else if correct {
            Feedback::Correct
        } else {
            Feedback::Incorrect
        });
        self.practice_records.push(record);
        self.practice_cursor += 1;
        events.push(SessionEvent::TrialFinalized {
            phase: TaskPhase::Practice,
            index,
            timed_out,
            correct,
        });

        let len = self.practice.as_ref().map_or(0, TrialSequence::len);
        if self.practice_cursor >= len {
            self.trial_start_ns = None;
            self.phase = SessionPhase::PracticeGate;
        } else {
            // No ITI in practice; the next trial starts immediately and the
            // feedback banner rides along with its fixation interval.
            self.trial_start_ns = Some(now_ns);
        }
    }

    fn resolve_practice_gate(&mut self, events: &mut Vec<SessionEvent>) {
        let total = self.practice_records.len();
        let correct = self
            .practice_records
            .iter()
            .filter(|r| r.is_correct())
            .count();
        let accuracy = if total == 0 {
            1.0
        } else {
            correct as f64 / total as f64
        };

        let attempts_done = self.practice_redos + 1;
        let cap_reached = self
            .config
            .max_practice_attempts
            .is_some_and(|cap| attempts_done >= cap);

        if accuracy < self.config.practice_accuracy_threshold && !cap_reached {
            // Atomic redo: install the fresh sequence before discarding the
            // attempt, so a build failure never leaves a half-reset state.
            match build_practice_sequence(&self.catalog, &self.config.color_set, &mut self.rng) {
                Ok(seq) => {
                    self.practice = Some(seq);
                    self.practice_records.clear();
                    self.practice_cursor = 0;
                    self.practice_redos += 1;
                    self.last_feedback = None;
                    self.phase = SessionPhase::PracticeInstructions { page: 0 };
                    events.push(SessionEvent::PracticeRedo {
                        attempt: self.practice_redos + 1,
                    });
                }
                Err(e) => self.fault(e.to_string(), events),
            }
        } else {
            self.last_feedback = None;
            self.phase = SessionPhase::ExperimentalInstructions;
            events.push(SessionEvent::PracticeGatePassed { accuracy });
        }
    }

    fn tick_experimental(&mut self, now_ns: u64, events: &mut Vec<SessionEvent>) {
        if let Some(iti) = self.iti {
            if now_ns.saturating_sub(iti.start_ns) >= iti.duration.as_nanos() as u64 {
                self.iti = None;
                self.arm_next_experimental(now_ns, events);
            }
            return;
        }
        if let Some(start) = self.trial_start_ns {
            let delay = self.current_delay(TaskPhase::Experimental);
            if is_expired(now_ns, start, delay, self.config.max_response()) {
                self.finalize_experimental(now_ns, ResponseOutcome::Timeout, events);
            }
        } else {
            self.arm_next_experimental(now_ns, events);
        }
    }

    /// Starts the next experimental trial, or interposes a rest break at an
    /// unvisited block boundary, or completes the session.
    fn arm_next_experimental(&mut self, now_ns: u64, events: &mut Vec<SessionEvent>) {
        let len = self.experimental.as_ref().map_or(0, TrialSequence::len);
        if self.exp_cursor >= len {
            self.complete(events);
            return;
        }
        let cursor = self.exp_cursor;
        let per_block = self.config.trials_per_block;
        if cursor > 0 && cursor % per_block == 0 && !self.breaks_shown.contains(&cursor) {
            self.breaks_shown.insert(cursor);
            self.phase = SessionPhase::RestBreak {
                started_ns: now_ns,
                boundary: cursor,
            };
            events.push(SessionEvent::RestStarted {
                block: cursor / per_block,
            });
            return;
        }
        self.trial_start_ns = Some(now_ns);
    }

    fn finalize_experimental(
        &mut self,
        now_ns: u64,
        outcome: ResponseOutcome,
        events: &mut Vec<SessionEvent>,
    ) {
        let Some(start) = self.trial_start_ns else {
            return;
        };
        let Some(trial) = self
            .experimental
            .as_ref()
            .and_then(|s| s.get(self.exp_cursor))
            .cloned()
        else {
            return;
        };
        let onset = start + self.current_delay(TaskPhase::Experimental).as_nanos() as u64;
        let record = score(
            &trial,
            self.participant_id.as_deref().unwrap_or_default(),
            TaskPhase::Experimental,
            outcome,
            elapsed_since_onset(now_ns, onset),
            self.config.max_response(),
        );
        let timed_out = matches!(outcome, ResponseOutcome::Timeout);
        let correct = record.is_correct();
        let index = self.exp_cursor;
        self.exp_records.push(record);
        self.exp_cursor += 1;
        self.trial_start_ns = None;
        events.push(SessionEvent::TrialFinalized {
            phase: TaskPhase::Experimental,
            index,
            timed_out,
            correct,
        });

        let len = self.experimental.as_ref().map_or(0, TrialSequence::len);
        if self.exp_cursor >= len {
            self.iti = None;
            self.complete(events);
        } else {
            let duration = stroop_timing::sample_iti(
                &mut self.rng,
                self.config.iti_min(),
                self.config.iti_max(),
            );
            self.iti = Some(Iti {
                start_ns: now_ns,
                duration,
                after_timeout: timed_out,
            });
        }
    }

    fn end_rest(
        &mut self,
        now_ns: u64,
        boundary: usize,
        forced: bool,
        events: &mut Vec<SessionEvent>,
    ) {
        self.phase = SessionPhase::ExperimentalTrial;
        self.trial_start_ns = Some(now_ns);
        events.push(SessionEvent::RestEnded {
            block: boundary / self.config.trials_per_block,
            forced,
        });
    }

    /// Terminal transition. The summary is computed exactly once; re-entry
    /// never recomputes or re-appends anything.
    fn complete(&mut self, events: &mut Vec<SessionEvent>) {
        self.trial_start_ns = None;
        self.iti = None;
        if self.summary.is_none() {
            let ended = Utc::now();
            let started = self.started_at.unwrap_or(ended);
            self.summary = Some(summarize(
                &self.exp_records,
                &self.practice_records,
                started,
                ended,
            ));
            self.completed_at = Some(ended);
            events.push(SessionEvent::SessionCompleted);
        }
        self.phase = SessionPhase::Completed;
    }

    /// Phase-entry failure: surface an error state without losing any
    /// in-progress records.
    fn fault(&mut self, reason: String, events: &mut Vec<SessionEvent>) {
        events.push(SessionEvent::Faulted {
            reason: reason.clone(),
        });
        self.phase = SessionPhase::Faulted { reason };
    }
}
