use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use stroop_core::StimulusCatalog;
use stroop_experiment::{Mode, Session, TaskConfig};

mod host;
mod persist;

use host::Host;

/// Emotional word Stroop task runner.
#[derive(Debug, Parser)]
#[command(name = "stroop", about = "Runs a timed emotional-word color-naming task")]
struct Args {
    /// Trial-count preset: pilot (10 words/condition) or full (48).
    #[arg(long, default_value = "full")]
    mode: Mode,

    /// CSV file with `word,category` rows for the experimental pool.
    #[arg(long, default_value = "stimuli/final_144_words.csv")]
    stimuli: PathBuf,

    /// CSV file with the practice-only word list.
    #[arg(long, default_value = "stimuli/final_practice_words.csv")]
    practice_stimuli: PathBuf,

    /// Directory for the per-session CSV/JSON output.
    #[arg(long, default_value = "data/responses")]
    out: PathBuf,

    /// Optional JSON task configuration; overrides the mode preset.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Participant id; prompted for interactively when omitted.
    #[arg(long)]
    participant: Option<String>,

    /// Optional JSON-lines backup file appended to after the local save.
    #[arg(long)]
    backup: Option<PathBuf>,

    /// RNG seed for reproducible sequences.
    #[arg(long)]
    seed: Option<u64>,
}

fn load_config(args: &Args) -> Result<TaskConfig> {
    let config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            TaskConfig::from_json(&json)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => TaskConfig::for_mode(args.mode),
    };
    config.validate()?;
    Ok(config)
}

fn load_catalog(args: &Args) -> Result<StimulusCatalog> {
    let words = fs::read_to_string(&args.stimuli)
        .with_context(|| format!("reading stimuli {}", args.stimuli.display()))?;
    let entries = StimulusCatalog::parse_word_table(&words)
        .with_context(|| format!("parsing stimuli {}", args.stimuli.display()))?;
    let practice = fs::read_to_string(&args.practice_stimuli).with_context(|| {
        format!(
            "reading practice stimuli {}",
            args.practice_stimuli.display()
        )
    })?;
    let practice = StimulusCatalog::parse_practice_table(&practice).with_context(|| {
        format!(
            "parsing practice stimuli {}",
            args.practice_stimuli.display()
        )
    })?;
    Ok(StimulusCatalog::new(entries, practice))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let catalog = load_catalog(&args)?;

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let session = Session::new(config, catalog, rng)?;

    println!("=== EMOTIONAL WORD STROOP TASK ===");
    // A --config file may override the --mode preset; report what was loaded.
    println!(
        "Mode: {:?} ({} trials)",
        session.config().mode,
        session.config().total_trials()
    );
    println!("Type q + Enter at any point to abort.\n");

    Host::new(session, args.out, args.participant, args.backup).run()
}
