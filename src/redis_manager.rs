//! Redis Manager - Centralized Redis connection and queue operations
//!
//! This module handles:
//! - Consuming "submission created" messages (BLPOP)
//! - Pushing judge events (RPUSH)

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::reporter::{EventSink, JudgeEvent};

/// Redis key constants
pub mod keys {
    /// Queue of "submission created" messages
    pub const SUBMISSION_QUEUE: &str = "judger:submissions";

    /// Queue judge events are pushed to
    pub const EVENT_QUEUE: &str = "judger:events";

    /// Submission record key prefix (JSON)
    pub const SUBMISSION_PREFIX: &str = "judger:submission:";

    /// Problem record key prefix (JSON)
    pub const PROBLEM_PREFIX: &str = "judger:problem:";

    /// Checkpoint list key prefix (JSON array, keyed by problem id)
    pub const CHECKPOINTS_PREFIX: &str = "judger:checkpoints:";
}

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Inbound message announcing a new submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCreated {
    pub submission_id: i64,
}

/// Parse a queue message, `None` if it is malformed or carries no usable id
pub fn parse_submission_message(data: &str) -> Option<i64> {
    match serde_json::from_str::<SubmissionCreated>(data) {
        Ok(message) if message.submission_id > 0 => Some(message.submission_id),
        Ok(message) => {
            warn!("Ignoring illegal submission id {}", message.submission_id);
            None
        }
        Err(e) => {
            warn!("Failed to parse submission message: {}. Data: {}", e, data);
            None
        }
    }
}

/// Centralized Redis manager for queue operations
pub struct RedisManager {
    client: redis::Client,
    conn: MultiplexedConnection,
    submission_queue: String,
}

impl RedisManager {
    /// Connect to Redis, retrying until the server is reachable
    pub async fn connect(redis_url: &str, submission_queue: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = get_connection_with_retry(&client).await?;
        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            client,
            conn,
            submission_queue: submission_queue.into(),
        })
    }

    /// Connection shared with the registry
    pub fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    /// Event sink pushing to `queue` over its own connection
    pub async fn event_sink(&self, queue: impl Into<String>) -> Result<RedisEventSink> {
        let conn = get_connection_with_retry(&self.client).await?;
        Ok(RedisEventSink {
            client: self.client.clone(),
            conn: Mutex::new(conn),
            queue: queue.into(),
        })
    }

    /// Block and wait for the next submission id.
    ///
    /// Malformed messages and non-positive ids are logged and skipped.
    /// Automatically reconnects on connection failure.
    pub async fn pop_submission(&mut self) -> Result<i64> {
        loop {
            let result: Option<(String, String)> =
                match self.conn.blpop(&self.submission_queue, 0.0).await {
                    Ok(res) => res,
                    Err(e) => {
                        warn!("Redis BLPOP failed: {}. Reconnecting...", e);
                        self.conn = get_connection_with_retry(&self.client).await?;
                        continue;
                    }
                };

            if let Some(submission_id) = result.and_then(|(_, data)| parse_submission_message(&data)) {
                return Ok(submission_id);
            }
        }
    }
}

/// Pushes judge events onto a Redis list
pub struct RedisEventSink {
    client: redis::Client,
    conn: Mutex<MultiplexedConnection>,
    queue: String,
}

#[async_trait]
impl EventSink for RedisEventSink {
    async fn send(&self, event: &JudgeEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        let mut conn = self.conn.lock().await;

        // Try to push, reconnect once on failure
        if let Err(e) = conn.rpush::<_, _, ()>(&self.queue, &json).await {
            warn!("Failed to push judge event: {}. Reconnecting...", e);
            *conn = get_connection_with_retry(&self.client).await?;
            conn.rpush::<_, _, ()>(&self.queue, &json)
                .await
                .with_context(|| format!("Failed to push judge event to {}", self.queue))?;
        }

        Ok(())
    }
}

/// Get a Redis connection with retry logic
async fn get_connection_with_retry(client: &redis::Client) -> Result<MultiplexedConnection> {
    loop {
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(
                    "Failed to connect to Redis: {}. Retrying in {} seconds...",
                    e,
                    RECONNECT_DELAY.as_secs()
                );
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
