use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stroop_core::ColorSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Pilot,
    Full,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "pilot" => Ok(Mode::Pilot),
            "full" => Ok(Mode::Full),
            other => Err(format!("unknown mode `{other}` (expected pilot or full)")),
        }
    }
}

/// Task parameters. Durations are stored in seconds to mirror how they are
/// reported; accessors convert to `Duration` for the timing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub mode: Mode,
    /// Distinct words sampled per experimental condition.
    pub n_per_condition: usize,
    pub max_response_secs: f64,
    /// Pre-stimulus fixation interval.
    pub fixation_secs: f64,
    /// Pre-stimulus delay when a feedback banner precedes the stimulus.
    pub fixation_feedback_secs: f64,
    pub iti_range_secs: (f64, f64),
    pub trials_per_block: usize,
    pub rest_window_secs: (f64, f64),
    pub practice_accuracy_threshold: f64,
    pub color_set: ColorSet,
    /// `None` means the practice-redo loop is uncapped. When set, an
    /// exhausted cap lets the participant proceed instead of dead-ending.
    pub max_practice_attempts: Option<u32>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self::full()
    }
}

impl TaskConfig {
    pub fn full() -> Self {
        Self {
            mode: Mode::Full,
            n_per_condition: 48,
            max_response_secs: 3.0,
            fixation_secs: 0.5,
            fixation_feedback_secs: 0.5,
            iti_range_secs: (0.8, 1.2),
            trials_per_block: 36,
            rest_window_secs: (5.0, 30.0),
            practice_accuracy_threshold: 0.5,
            color_set: ColorSet::default(),
            max_practice_attempts: None,
        }
    }

    pub fn pilot() -> Self {
        Self {
            mode: Mode::Pilot,
            n_per_condition: 10,
            ..Self::full()
        }
    }

    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Pilot => Self::pilot(),
            Mode::Full => Self::full(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: TaskConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                reason: reason.into(),
            }
        }
        if self.n_per_condition == 0 {
            return Err(invalid("n_per_condition must be positive"));
        }
        if !(self.max_response_secs > 0.0) {
            return Err(invalid("max_response_secs must be positive"));
        }
        if self.fixation_secs < 0.0 || self.fixation_feedback_secs < 0.0 {
            return Err(invalid("fixation durations must be non-negative"));
        }
        let (iti_min, iti_max) = self.iti_range_secs;
        if iti_min < 0.0 || iti_min > iti_max {
            return Err(invalid("iti_range_secs must satisfy 0 <= min <= max"));
        }
        if self.trials_per_block == 0 {
            return Err(invalid("trials_per_block must be positive"));
        }
        let (rest_min, rest_max) = self.rest_window_secs;
        if rest_min < 0.0 || rest_min > rest_max {
            return Err(invalid("rest_window_secs must satisfy 0 <= min <= max"));
        }
        if !(0.0..=1.0).contains(&self.practice_accuracy_threshold) {
            return Err(invalid("practice_accuracy_threshold must be within [0, 1]"));
        }
        Ok(())
    }

    pub fn total_trials(&self) -> usize {
        self.n_per_condition * 3
    }

    pub fn max_response(&self) -> Duration {
        Duration::from_secs_f64(self.max_response_secs)
    }

    /// Delay from trial start to stimulus onset; RT is measured from the end
    /// of this interval, never from trial creation.
    pub fn pre_stimulus_delay(&self, feedback_pending: bool) -> Duration {
        if feedback_pending {
            Duration::from_secs_f64(self.fixation_feedback_secs)
        } else {
            Duration::from_secs_f64(self.fixation_secs)
        }
    }

    pub fn iti_min(&self) -> Duration {
        Duration::from_secs_f64(self.iti_range_secs.0)
    }

    pub fn iti_max(&self) -> Duration {
        Duration::from_secs_f64(self.iti_range_secs.1)
    }

    pub fn rest_min(&self) -> Duration {
        Duration::from_secs_f64(self.rest_window_secs.0)
    }

    pub fn rest_max(&self) -> Duration {
        Duration::from_secs_f64(self.rest_window_secs.1)
    }
}
