//! Error types of the judging pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a judging step
#[derive(Debug, Error)]
pub enum JudgeError {
    /// No submission record exists for the requested id
    #[error("Illegal submission #{0}")]
    IllegalSubmission(i64),

    #[error("Failed to create directory: {}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Submission #{submission_id} references unknown language #{language_id}")]
    UnknownLanguage { submission_id: i64, language_id: i64 },

    #[error("Submission #{submission_id} references unknown problem #{problem_id}")]
    UnknownProblem { submission_id: i64, problem_id: i64 },

    #[error("Registry lookup failed: {0:#}")]
    Registry(anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type JudgeResult<T> = std::result::Result<T, JudgeError>;
