pub mod catalog;
pub mod error;
pub mod response;
pub mod sequence;
pub mod trial;

pub use catalog::{StimulusCatalog, WordEntry};
pub use error::{CatalogError, SequenceError};
pub use response::{Response, ResponseRecord, RtSource, TaskPhase};
pub use sequence::{build_experimental_sequence, build_practice_sequence};
pub use trial::{ColorSet, Condition, InkColor, Trial, TrialSequence};
