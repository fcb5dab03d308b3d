pub mod collector;
pub mod config;
pub mod session;
pub mod summary;

pub use collector::{score, ResponseOutcome};
pub use config::{ConfigError, Mode, TaskConfig};
pub use session::{Feedback, Screen, Session, SessionEvent, SessionInput, SessionPhase};
pub use summary::{summarize, summary_row, ConditionStats, SessionSummary};
