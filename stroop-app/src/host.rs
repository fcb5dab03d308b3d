use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use stroop_experiment::{
    Feedback, Screen, Session, SessionEvent, SessionInput, SessionPhase,
};
use stroop_timing::{Clock, MonotonicClock};

use crate::persist::{self, JsonlBackup};

const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Line-oriented terminal host: a stdin reader thread feeds discrete inputs
/// into the session while the main loop ticks its deadlines.
pub struct Host {
    session: Session<StdRng>,
    clock: MonotonicClock,
    out_dir: PathBuf,
    participant: Option<String>,
    backup: Option<PathBuf>,
    last_screen: Option<Screen>,
    saved: bool,
}

impl Host {
    pub fn new(
        session: Session<StdRng>,
        out_dir: PathBuf,
        participant: Option<String>,
        backup: Option<PathBuf>,
    ) -> Self {
        Self {
            session,
            clock: MonotonicClock::new(),
            out_dir,
            participant,
            backup,
            last_screen: None,
            saved: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let lines = spawn_stdin_reader();

        if let Some(id) = self.participant.take() {
            let now = self.clock.now();
            let events = self.session.handle_input(now, SessionInput::SetParticipant(id));
            self.handle_events(events);
        }

        loop {
            let now = self.clock.now();
            let events = self.session.tick(now);
            self.handle_events(events);

            loop {
                match lines.try_recv() {
                    Ok(line) => {
                        let line = line.trim().to_owned();
                        if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
                            println!("Aborted.");
                            return Ok(());
                        }
                        if let Some(input) = self.map_line(&line) {
                            let now = self.clock.now();
                            let events = self.session.handle_input(now, input);
                            self.handle_events(events);
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        println!("Input closed; aborting.");
                        return Ok(());
                    }
                }
            }

            self.render(self.clock.now());

            if matches!(self.session.phase(), SessionPhase::Completed) && self.saved {
                return Ok(());
            }
            if matches!(self.session.phase(), SessionPhase::Faulted { .. }) {
                return Ok(());
            }

            self.clock.sleep(TICK_INTERVAL);
        }
    }

    fn map_line(&self, line: &str) -> Option<SessionInput> {
        match self.session.phase() {
            SessionPhase::CollectingParticipantId => {
                Some(SessionInput::SetParticipant(line.to_owned()))
            }
            SessionPhase::PracticeInstructions { .. }
            | SessionPhase::ExperimentalInstructions => Some(SessionInput::Acknowledge),
            SessionPhase::RestBreak { .. } => Some(SessionInput::ContinueRest),
            SessionPhase::PracticeTrial | SessionPhase::ExperimentalTrial => {
                let key = line.chars().next()?;
                let color = self.session.config().color_set.color_for_key(key)?;
                Some(SessionInput::Respond {
                    color,
                    measured_latency_ms: None,
                })
            }
            _ => None,
        }
    }

    fn handle_events(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            match event {
                SessionEvent::ParticipantRejected => {
                    println!("Participant id must not be empty.");
                }
                SessionEvent::PracticeRedo { attempt } => {
                    println!("\nPractice accuracy was too low; starting attempt {attempt}.");
                }
                SessionEvent::PracticeGatePassed { accuracy } => {
                    println!("\nPractice complete ({:.0}% correct).", accuracy * 100.0);
                }
                SessionEvent::Faulted { reason } => {
                    eprintln!("\nTask cannot continue: {reason}");
                }
                SessionEvent::SessionCompleted => self.save(),
                _ => {}
            }
        }
    }

    /// Persists the finished session. Failures are warnings: the summary is
    /// still printed so the data is never lost with the process.
    fn save(&mut self) {
        if self.saved {
            return;
        }
        self.saved = true;

        let Some(summary) = self.session.summary().cloned() else {
            return;
        };
        let experimental = self.session.experimental_records().to_vec();
        let practice = self.session.practice_records().to_vec();

        match persist::save_session(&self.out_dir, &summary, &experimental, &practice) {
            Ok(saved) => {
                println!("Saved results to {}", saved.csv.display());
                println!("Saved summary to {}", saved.json.display());
            }
            Err(e) => {
                eprintln!("WARNING: failed to save results locally: {e:#}");
                persist::dump_row_to_stdout(&summary, &experimental, &practice);
            }
        }

        if let Some(path) = &self.backup {
            let mut sink = JsonlBackup::new(path.clone());
            match persist::backup_session(&mut sink, &summary, &experimental, &practice) {
                Ok(()) => println!("Appended backup row to {}", path.display()),
                Err(e) => eprintln!("WARNING: backup failed: {e:#}"),
            }
        }
    }

    fn render(&mut self, now_ns: u64) {
        let mut screen = self.session.screen(now_ns);
        // Whole-second granularity so the countdown redraws once per second.
        if let Screen::Rest { remaining, .. } = &mut screen {
            *remaining = Duration::from_secs(remaining.as_secs());
        }
        if self.last_screen.as_ref() == Some(&screen) {
            return;
        }
        self.last_screen = Some(screen.clone());

        match screen {
            Screen::ParticipantForm => {
                println!("\nParticipant id:");
            }
            Screen::Instructions {
                page, pages, lines, ..
            } => {
                println!();
                for line in lines {
                    println!("  {line}");
                }
                self.print_key_legend();
                println!("  [{}/{}] Press Enter to continue.", page + 1, pages);
            }
            Screen::Fixation { feedback } => {
                if let Some(feedback) = feedback {
                    println!("\n{}", feedback_banner(feedback));
                }
                println!("\n        +");
            }
            Screen::Stimulus { word, color, .. } => {
                println!("\n        {word}   [{}]", color.as_str().to_uppercase());
            }
            Screen::Blank { too_slow } => {
                if too_slow {
                    println!("\nToo slow");
                }
            }
            Screen::Rest {
                completed_block,
                total_blocks,
                remaining,
                can_continue,
            } => {
                println!(
                    "\nBlock {completed_block}/{total_blocks} complete. Rest for a moment ({}s left).",
                    remaining.as_secs()
                );
                if can_continue {
                    println!("Press Enter to start the next block.");
                }
            }
            Screen::Done => {
                println!("\nAll trials complete. Thank you!");
            }
            Screen::Fault { reason } => {
                eprintln!("\nError: {reason}");
            }
        }
    }

    fn print_key_legend(&self) {
        let set = &self.session.config().color_set;
        let legend: Vec<String> = set
            .colors()
            .iter()
            .map(|c| {
                format!(
                    "{}: {}",
                    c.as_str(),
                    set.key_for(*c).unwrap_or('?').to_ascii_uppercase()
                )
            })
            .collect();
        println!("  Keys: {}", legend.join("   "));
    }
}

fn feedback_banner(feedback: Feedback) -> &'static str {
    match feedback {
        Feedback::Correct => "Correct",
        Feedback::Incorrect => "Incorrect",
        Feedback::TooSlow => "Too slow",
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.clone()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}
