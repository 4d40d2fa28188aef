use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Score granted for a single accepted checkpoint
pub const SCORE_PER_CHECKPOINT: u32 = 10;

/// Display name used when a slug has no registered name
pub const FALLBACK_VERDICT_NAME: &str = "System Error";

/// Verdict of a checkpoint run or of a whole submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "AC")]
    Accepted,
    #[serde(rename = "WA")]
    WrongAnswer,
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    #[serde(rename = "MLE")]
    MemoryLimitExceeded,
    #[serde(rename = "RE")]
    RuntimeError,
    #[serde(rename = "SE")]
    SystemError,
    #[serde(rename = "CE")]
    CompileError,
}

impl Verdict {
    /// Short slug used on the wire and as the registry key
    pub fn slug(&self) -> &'static str {
        match self {
            Verdict::Accepted => "AC",
            Verdict::WrongAnswer => "WA",
            Verdict::TimeLimitExceeded => "TLE",
            Verdict::MemoryLimitExceeded => "MLE",
            Verdict::RuntimeError => "RE",
            Verdict::SystemError => "SE",
            Verdict::CompileError => "CE",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Score earned by a checkpoint that finished with this verdict
    pub fn score(&self) -> u32 {
        if self.is_accepted() {
            SCORE_PER_CHECKPOINT
        } else {
            0
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for Verdict {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let verdict = match s {
            "AC" => Verdict::Accepted,
            "WA" => Verdict::WrongAnswer,
            "TLE" => Verdict::TimeLimitExceeded,
            "MLE" => Verdict::MemoryLimitExceeded,
            "RE" => Verdict::RuntimeError,
            "SE" => Verdict::SystemError,
            "CE" => Verdict::CompileError,
            other => anyhow::bail!("Unknown verdict slug: {}", other),
        };
        Ok(verdict)
    }
}
