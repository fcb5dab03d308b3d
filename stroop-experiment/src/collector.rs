use std::time::Duration;

use chrono::Utc;
use stroop_core::{Response, ResponseRecord, RtSource, TaskPhase, Trial};

/// Raw input for one trial, before scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseOutcome {
    Pressed {
        color: stroop_core::InkColor,
        /// Externally measured latency in milliseconds, when available.
        /// Improves RT precision only; never gates control flow.
        measured_latency_ms: Option<f64>,
    },
    Timeout,
}

/// Scores one trial into its single `ResponseRecord`. Must be called at most
/// once per trial index; the session gates on its cursor to guarantee that.
pub fn score(
    trial: &Trial,
    participant_id: &str,
    phase: TaskPhase,
    outcome: ResponseOutcome,
    server_elapsed: Duration,
    max_response: Duration,
) -> ResponseRecord {
    let (response, accuracy, rt_seconds, rt_source) = match outcome {
        // Any pending measured latency is discarded on timeout.
        ResponseOutcome::Timeout => (
            Response::Timeout,
            0,
            max_response.as_secs_f64(),
            RtSource::Timeout,
        ),
        ResponseOutcome::Pressed {
            color,
            measured_latency_ms,
        } => {
            let accuracy = u8::from(color == trial.correct_answer);
            let (rt, source) = match measured_latency_ms {
                Some(ms) if ms > 0.0 => (ms / 1000.0, RtSource::ClientMeasured),
                _ => (server_elapsed.as_secs_f64(), RtSource::ServerMeasured),
            };
            (Response::Color(color), accuracy, rt, source)
        }
    };

    ResponseRecord {
        participant_id: participant_id.to_owned(),
        word: trial.text.clone(),
        condition: trial.condition,
        color: trial.display_color,
        response,
        accuracy,
        rt_seconds,
        rt_source,
        timestamp: Utc::now(),
        phase,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stroop_core::{Condition, InkColor};

    fn trial() -> Trial {
        Trial {
            text: "chair".into(),
            display_color: InkColor::Green,
            correct_answer: InkColor::Green,
            condition: Condition::Neutral,
        }
    }

    #[test]
    fn correct_iff_response_matches_answer() {
        let t = trial();
        let hit = score(
            &t,
            "P001",
            TaskPhase::Experimental,
            ResponseOutcome::Pressed {
                color: InkColor::Green,
                measured_latency_ms: None,
            },
            Duration::from_millis(640),
            Duration::from_secs(3),
        );
        assert_eq!(hit.accuracy, 1);
        assert_eq!(hit.response, Response::Color(InkColor::Green));
        assert_eq!(hit.rt_source, RtSource::ServerMeasured);
        assert!((hit.rt_seconds - 0.64).abs() < 1e-9);

        let miss = score(
            &t,
            "P001",
            TaskPhase::Experimental,
            ResponseOutcome::Pressed {
                color: InkColor::Red,
                measured_latency_ms: None,
            },
            Duration::from_millis(500),
            Duration::from_secs(3),
        );
        assert_eq!(miss.accuracy, 0);
    }

    #[test]
    fn client_latency_takes_precedence_when_positive() {
        let r = score(
            &trial(),
            "P001",
            TaskPhase::Experimental,
            ResponseOutcome::Pressed {
                color: InkColor::Green,
                measured_latency_ms: Some(812.5),
            },
            Duration::from_secs(2),
            Duration::from_secs(3),
        );
        assert_eq!(r.rt_source, RtSource::ClientMeasured);
        assert!((r.rt_seconds - 0.8125).abs() < 1e-9);

        let r = score(
            &trial(),
            "P001",
            TaskPhase::Experimental,
            ResponseOutcome::Pressed {
                color: InkColor::Green,
                measured_latency_ms: Some(0.0),
            },
            Duration::from_secs(2),
            Duration::from_secs(3),
        );
        assert_eq!(r.rt_source, RtSource::ServerMeasured);
        assert_eq!(r.rt_seconds, 2.0);
    }

    #[test]
    fn timeout_fixes_rt_and_discards_latency() {
        let r = score(
            &trial(),
            "P001",
            TaskPhase::Practice,
            ResponseOutcome::Timeout,
            Duration::from_secs(9),
            Duration::from_secs(3),
        );
        assert_eq!(r.response, Response::Timeout);
        assert_eq!(r.accuracy, 0);
        assert_eq!(r.rt_seconds, 3.0);
        assert_eq!(r.rt_source, RtSource::Timeout);
        assert_eq!(r.phase, TaskPhase::Practice);
    }
}
