use thiserror::Error;

use crate::trial::Condition;

/// Errors raised while parsing stimulus tables or building the color set.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("missing required column `{name}`")]
    MissingColumn { name: String },
    #[error("malformed record on line {line}")]
    Malformed { line: usize },
    #[error("unknown category `{value}` on line {line}")]
    UnknownCategory { line: usize, value: String },
    #[error("catalog contains no records")]
    Empty,
    #[error("invalid color set: {reason}")]
    InvalidColorSet { reason: String },
}

/// Errors raised while building a trial sequence. Fatal to phase entry:
/// the caller must surface them, never shrink the sequence or sample with
/// replacement.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error(
        "insufficient stimuli for condition `{}`: requested {requested}, available {available}",
        condition.as_str()
    )]
    InsufficientStimuli {
        condition: Condition,
        requested: usize,
        available: usize,
    },
}
