use std::time::Duration;

use rand::Rng;

/// Elapsed time since stimulus onset, saturating at zero if the onset has
/// not yet been reached.
pub fn elapsed_since_onset(now_ns: u64, onset_ns: u64) -> Duration {
    Duration::from_nanos(now_ns.saturating_sub(onset_ns))
}

/// Timeout trigger: true once `now - trial_start >= pre_stimulus_delay +
/// max_response`. Checked on every tick, not only on explicit input.
pub fn is_expired(
    now_ns: u64,
    trial_start_ns: u64,
    pre_stimulus_delay: Duration,
    max_response: Duration,
) -> bool {
    let deadline = pre_stimulus_delay.as_nanos() + max_response.as_nanos();
    u128::from(now_ns.saturating_sub(trial_start_ns)) >= deadline
}

/// Draws a uniform random inter-trial interval in `[min, max]`, once per
/// experimental trial.
pub fn sample_iti<R: Rng>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    debug_assert!(min <= max);
    if min >= max {
        return min;
    }
    Duration::from_secs_f64(rng.random_range(min.as_secs_f64()..=max.as_secs_f64()))
}

/// Gate for a rest screen between blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestGate {
    /// Participant may advance manually.
    pub can_advance: bool,
    /// Forced advance regardless of input.
    pub auto_advance: bool,
}

pub fn rest_gate(elapsed: Duration, min: Duration, max: Duration) -> RestGate {
    RestGate {
        can_advance: elapsed >= min,
        auto_advance: elapsed >= max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEC: u64 = 1_000_000_000;

    #[test]
    fn expiry_boundary() {
        let fixation = Duration::from_millis(500);
        let max_response = Duration::from_secs(3);
        // 3.49 s since trial start: not expired; 3.51 s: expired.
        assert!(!is_expired(3_490_000_000, 0, fixation, max_response));
        assert!(is_expired(3_510_000_000, 0, fixation, max_response));
        // Exact deadline counts as expired.
        assert!(is_expired(3_500_000_000, 0, fixation, max_response));
    }

    #[test]
    fn expiry_uses_trial_start_anchor() {
        let fixation = Duration::from_millis(500);
        let max_response = Duration::from_secs(3);
        assert!(!is_expired(10 * SEC, 7 * SEC, fixation, max_response));
        assert!(is_expired(11 * SEC, 7 * SEC, fixation, max_response));
    }

    #[test]
    fn onset_elapsed_saturates_before_onset() {
        assert_eq!(elapsed_since_onset(400, 500), Duration::ZERO);
        assert_eq!(
            elapsed_since_onset(2 * SEC, SEC),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn iti_stays_inside_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let min = Duration::from_millis(800);
        let max = Duration::from_millis(1200);
        for _ in 0..1000 {
            let iti = sample_iti(&mut rng, min, max);
            assert!(iti >= min && iti <= max);
        }
    }

    #[test]
    fn iti_degenerate_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = Duration::from_secs(1);
        assert_eq!(sample_iti(&mut rng, d, d), d);
    }

    #[test]
    fn rest_gate_windows() {
        let min = Duration::from_secs(10);
        let max = Duration::from_secs(30);
        let early = rest_gate(Duration::from_secs(5), min, max);
        assert!(!early.can_advance && !early.auto_advance);
        let mid = rest_gate(Duration::from_secs(15), min, max);
        assert!(mid.can_advance && !mid.auto_advance);
        let late = rest_gate(Duration::from_secs(30), min, max);
        assert!(late.can_advance && late.auto_advance);
    }
}
