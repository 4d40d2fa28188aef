//! Read-only lookups of submissions, languages, problems, checkpoints and
//! verdict names.
//!
//! Languages and verdict names rarely change and live in a TOML catalog shipped
//! with the worker. Submissions, problems and checkpoints are owned by the web
//! platform and are read from Redis as JSON documents.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::core::Verdict;
use crate::models::{Checkpoint, Language, Problem, Submission};
use crate::redis_manager::keys;

/// Key lookups used by the judging pipeline
#[async_trait]
pub trait Registry: Send + Sync {
    async fn submission(&self, submission_id: i64) -> Result<Option<Submission>>;

    async fn language(&self, language_id: i64) -> Result<Option<Language>>;

    async fn problem(&self, problem_id: i64) -> Result<Option<Problem>>;

    /// Checkpoints of a problem, ordered by ascending checkpoint number
    async fn checkpoints(&self, problem_id: i64) -> Result<Vec<Checkpoint>>;

    /// Display name of a verdict, `None` if the slug is not registered
    async fn verdict_name(&self, verdict: Verdict) -> Result<Option<String>>;
}

/// In-memory registry, usually loaded from a TOML file
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub languages: Vec<Language>,
    /// Verdict slug -> display name
    #[serde(default)]
    pub verdicts: HashMap<String, String>,
    #[serde(default)]
    pub problems: Vec<Problem>,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

impl Catalog {
    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content).context("Invalid catalog")?;
        for slug in catalog.verdicts.keys() {
            slug.parse::<Verdict>()
                .with_context(|| format!("Invalid catalog verdict {:?}", slug))?;
        }
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {:?}", path))?;
        Self::from_toml(&content)
    }

    fn ordered_checkpoints(&self, problem_id: i64) -> Vec<Checkpoint> {
        let mut checkpoints: Vec<Checkpoint> = self
            .checkpoints
            .iter()
            .filter(|c| c.problem_id == problem_id)
            .cloned()
            .collect();
        checkpoints.sort_by_key(|c| c.checkpoint_number);
        checkpoints
    }
}

#[async_trait]
impl Registry for Catalog {
    async fn submission(&self, submission_id: i64) -> Result<Option<Submission>> {
        Ok(self
            .submissions
            .iter()
            .find(|s| s.submission_id == submission_id)
            .cloned())
    }

    async fn language(&self, language_id: i64) -> Result<Option<Language>> {
        Ok(self
            .languages
            .iter()
            .find(|l| l.language_id == language_id)
            .cloned())
    }

    async fn problem(&self, problem_id: i64) -> Result<Option<Problem>> {
        Ok(self
            .problems
            .iter()
            .find(|p| p.problem_id == problem_id)
            .cloned())
    }

    async fn checkpoints(&self, problem_id: i64) -> Result<Vec<Checkpoint>> {
        Ok(self.ordered_checkpoints(problem_id))
    }

    async fn verdict_name(&self, verdict: Verdict) -> Result<Option<String>> {
        Ok(self.verdicts.get(verdict.slug()).cloned())
    }
}

/// Registry reading platform-owned records from Redis.
///
/// Languages and verdict names come from the local catalog.
pub struct RedisRegistry {
    conn: MultiplexedConnection,
    catalog: Catalog,
}

impl RedisRegistry {
    pub fn new(conn: MultiplexedConnection, catalog: Catalog) -> Self {
        Self { conn, catalog }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("Failed to read {}", key))?;

        raw.map(|json| {
            serde_json::from_str(&json).with_context(|| format!("Malformed record at {}", key))
        })
        .transpose()
    }
}

#[async_trait]
impl Registry for RedisRegistry {
    async fn submission(&self, submission_id: i64) -> Result<Option<Submission>> {
        self.get_json(&format!("{}{}", keys::SUBMISSION_PREFIX, submission_id))
            .await
    }

    async fn language(&self, language_id: i64) -> Result<Option<Language>> {
        self.catalog.language(language_id).await
    }

    async fn problem(&self, problem_id: i64) -> Result<Option<Problem>> {
        self.get_json(&format!("{}{}", keys::PROBLEM_PREFIX, problem_id))
            .await
    }

    async fn checkpoints(&self, problem_id: i64) -> Result<Vec<Checkpoint>> {
        let mut checkpoints: Vec<Checkpoint> = self
            .get_json(&format!("{}{}", keys::CHECKPOINTS_PREFIX, problem_id))
            .await?
            .unwrap_or_default();
        checkpoints.sort_by_key(|c| c.checkpoint_number);
        Ok(checkpoints)
    }

    async fn verdict_name(&self, verdict: Verdict) -> Result<Option<String>> {
        self.catalog.verdict_name(verdict).await
    }
}
