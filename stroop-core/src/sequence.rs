use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::StimulusCatalog;
use crate::error::SequenceError;
use crate::trial::{ColorSet, Condition, Trial, TrialSequence};

/// Builds the practice sequence: every practice word, each assigned a
/// uniformly random ink color, in shuffled order.
pub fn build_practice_sequence<R: Rng>(
    catalog: &StimulusCatalog,
    colors: &ColorSet,
    rng: &mut R,
) -> Result<TrialSequence, SequenceError> {
    let words = catalog.practice_words();
    if words.is_empty() {
        return Err(SequenceError::InsufficientStimuli {
            condition: Condition::Practice,
            requested: 1,
            available: 0,
        });
    }

    let mut trials: Vec<Trial> = words
        .iter()
        .map(|word| {
            let color = colors.pick(rng);
            Trial {
                text: word.clone(),
                display_color: color,
                correct_answer: color,
                condition: Condition::Practice,
            }
        })
        .collect();
    trials.shuffle(rng);
    Ok(TrialSequence::new(trials))
}

/// Builds the experimental sequence: `n_per_condition` distinct words per
/// condition, sampled without replacement, each assigned a uniformly random
/// ink color; the combined list is shuffled with no condition blocking.
pub fn build_experimental_sequence<R: Rng>(
    catalog: &StimulusCatalog,
    colors: &ColorSet,
    n_per_condition: usize,
    rng: &mut R,
) -> Result<TrialSequence, SequenceError> {
    let mut trials = Vec::with_capacity(n_per_condition * Condition::EXPERIMENTAL.len());

    for condition in Condition::EXPERIMENTAL {
        let pool = catalog.words_for(condition);
        if pool.len() < n_per_condition {
            return Err(SequenceError::InsufficientStimuli {
                condition,
                requested: n_per_condition,
                available: pool.len(),
            });
        }
        for i in rand::seq::index::sample(rng, pool.len(), n_per_condition) {
            let color = colors.pick(rng);
            trials.push(Trial {
                text: pool[i].to_owned(),
                display_color: color,
                correct_answer: color,
                condition,
            });
        }
    }

    trials.shuffle(rng);
    Ok(TrialSequence::new(trials))
}
