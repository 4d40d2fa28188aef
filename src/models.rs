//! Records read from the registry

use serde::{Deserialize, Serialize};

/// A submitted program waiting to be judged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: i64,
    pub problem_id: i64,
    pub language_id: i64,
    pub code: String,
}

/// A supported programming language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    pub language_id: i64,
    pub name: String,
    /// Compile command template, `{filename}` is replaced with `workDir/baseName`
    pub compile_command: String,
    /// Run command template, same placeholders as `compile_command`
    pub run_command: String,
    /// Managed runtimes get twice the problem's time limit
    #[serde(default)]
    pub extended_time_limit: bool,
    /// Entry class the source must declare (e.g. `Main`); renamed to the
    /// workspace base name before the source is written
    #[serde(default)]
    pub main_class: Option<String>,
}

/// Problem limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub problem_id: i64,
    /// Time limit in milliseconds
    pub time_limit: u32,
    /// Memory limit in KB, 0 = unlimited
    pub memory_limit: u32,
    /// Scaffold code for fill-in problems
    #[serde(default)]
    pub code: Option<String>,
}

/// One test case of a problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: i64,
    pub problem_id: i64,
    /// Ordinal of this checkpoint within its problem
    pub checkpoint_number: i32,
    pub input: String,
    pub output: String,
}

/// Everything a task needs to know about the submission being judged
#[derive(Debug, Clone)]
pub struct JudgeTask {
    pub submission: Submission,
    pub language: Language,
    pub problem: Problem,
}

impl JudgeTask {
    pub fn submission_id(&self) -> i64 {
        self.submission.submission_id
    }

    pub fn problem_id(&self) -> i64 {
        self.problem.problem_id
    }
}
