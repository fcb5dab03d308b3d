use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trial::{Condition, InkColor};

/// What the participant answered: a color key, or nothing before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Response {
    Color(InkColor),
    Timeout,
}

impl Response {
    pub fn as_str(&self) -> &'static str {
        match self {
            Response::Color(c) => c.as_str(),
            Response::Timeout => "timeout",
        }
    }
}

impl From<Response> for String {
    fn from(r: Response) -> String {
        r.as_str().to_owned()
    }
}

impl TryFrom<String> for Response {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        match s.as_str() {
            "red" => Ok(Response::Color(InkColor::Red)),
            "green" => Ok(Response::Color(InkColor::Green)),
            "blue" => Ok(Response::Color(InkColor::Blue)),
            "timeout" => Ok(Response::Timeout),
            other => Err(format!("unknown response `{other}`")),
        }
    }
}

/// Which clock produced the recorded reaction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RtSource {
    #[serde(rename = "client")]
    ClientMeasured,
    #[serde(rename = "server")]
    ServerMeasured,
    #[serde(rename = "timeout")]
    Timeout,
}

impl RtSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RtSource::ClientMeasured => "client",
            RtSource::ServerMeasured => "server",
            RtSource::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPhase {
    Practice,
    Experimental,
}

impl TaskPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPhase::Practice => "practice",
            TaskPhase::Experimental => "experimental",
        }
    }
}

/// Scored outcome of one presented trial. Created exactly once per trial,
/// append-only, never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub participant_id: String,
    pub word: String,
    pub condition: Condition,
    pub color: InkColor,
    pub response: Response,
    /// 1 for a correct color response, 0 otherwise (always 0 on timeout).
    pub accuracy: u8,
    /// Seconds from stimulus onset; equals the configured maximum on timeout.
    pub rt_seconds: f64,
    pub rt_source: RtSource,
    pub timestamp: DateTime<Utc>,
    pub phase: TaskPhase,
}

impl ResponseRecord {
    pub fn is_correct(&self) -> bool {
        self.accuracy == 1
    }
}
