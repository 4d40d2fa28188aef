//! Worker configuration
//!
//! Loaded from environment variables (after `.env` has been applied by
//! `dotenvy`), each with a default suitable for a local setup.

use std::path::PathBuf;

use crate::redis_manager::keys;

/// Judging worker configuration
#[derive(Debug, Clone)]
pub struct JudgerConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Root directory under which per-submission workspaces are created
    pub work_dir: PathBuf,
    /// Root directory of the per-problem checkpoint fixture cache
    pub checkpoint_dir: PathBuf,
    /// Language and verdict catalog (TOML)
    pub catalog_path: PathBuf,
    /// Queue the "submission created" messages are consumed from
    pub submission_queue: String,
    /// Queue judging events are sent to
    pub event_queue: String,
    /// Unix user that compiles and runs submitted programs
    pub execution_user: Option<String>,
    /// Emit a `CheckpointFinished` event after every checkpoint
    pub emit_checkpoint_events: bool,
}

impl Default for JudgerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".into(),
            work_dir: PathBuf::from("/tmp/judger/work"),
            checkpoint_dir: PathBuf::from("/tmp/judger/checkpoints"),
            catalog_path: PathBuf::from("./files/catalog.toml"),
            submission_queue: keys::SUBMISSION_QUEUE.into(),
            event_queue: keys::EVENT_QUEUE.into(),
            execution_user: None,
            emit_checkpoint_events: false,
        }
    }
}

impl JudgerConfig {
    /// Build the configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            redis_url: non_empty("REDIS_URL").unwrap_or(defaults.redis_url),
            work_dir: non_empty("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            checkpoint_dir: non_empty("CHECKPOINT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.checkpoint_dir),
            catalog_path: non_empty("CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_path),
            submission_queue: non_empty("SUBMISSION_QUEUE").unwrap_or(defaults.submission_queue),
            event_queue: non_empty("EVENT_QUEUE").unwrap_or(defaults.event_queue),
            execution_user: non_empty("JUDGER_USERNAME"),
            emit_checkpoint_events: non_empty("EMIT_CHECKPOINT_EVENTS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.emit_checkpoint_events),
        }
    }
}
