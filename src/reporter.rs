//! Reporter - human-readable reports and lifecycle events
//!
//! Events are serialized as JSON objects tagged by `event` and keyed by
//! `submissionId`. A failing sink is logged and never interrupts judging.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::aggregator::{aggregate, AggregateOutcome, CheckpointOutcome};
use crate::compiler::CompileResult;
use crate::core::{Verdict, FALLBACK_VERDICT_NAME};
use crate::registry::Registry;

/// Log attached to `ErrorOccurred` events
pub const INTERNAL_ERROR_LOG: &str = "Internal error occurred.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum JudgeEvent {
    #[serde(rename_all = "camelCase")]
    CompileFinished {
        submission_id: i64,
        is_successful: bool,
        compile_log: String,
    },
    #[serde(rename_all = "camelCase")]
    CheckpointFinished {
        submission_id: i64,
        checkpoint_id: i64,
        judge_result: Verdict,
        used_time: u32,
        used_memory: u32,
        score: u32,
    },
    #[serde(rename_all = "camelCase")]
    AllTestPointsFinished {
        submission_id: i64,
        judge_result: Verdict,
        total_time: u64,
        max_memory: u32,
        total_score: u32,
        runtime_log: String,
    },
    #[serde(rename_all = "camelCase")]
    ErrorOccurred { submission_id: i64, log: String },
}

impl JudgeEvent {
    pub fn submission_id(&self) -> i64 {
        match self {
            JudgeEvent::CompileFinished { submission_id, .. }
            | JudgeEvent::CheckpointFinished { submission_id, .. }
            | JudgeEvent::AllTestPointsFinished { submission_id, .. }
            | JudgeEvent::ErrorOccurred { submission_id, .. } => *submission_id,
        }
    }
}

/// Destination of judge events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: &JudgeEvent) -> Result<()>;
}

/// Compile report shown to the user
pub fn render_compile_log(result: &CompileResult) -> String {
    if result.is_successful {
        return "Compile Successful.\n\n".to_string();
    }

    format!(
        "Compile Error.\n\n{}\nCompile Error, Time = 0 ms, Memory = 0 KB, Score = 0.\n",
        result.log.replace('\n', "\n\n")
    )
}

/// Runtime report: one line per checkpoint, then the summary line.
///
/// `names` holds the display name of each outcome's verdict, in order.
pub fn render_runtime_log(
    outcomes: &[CheckpointOutcome],
    names: &[String],
    result: &AggregateOutcome,
    result_name: &str,
) -> String {
    let mut log = String::from("Compile Successfully.\n\n");

    for (index, (outcome, name)) in outcomes.iter().zip(names).enumerate() {
        log.push_str(&format!(
            "- Test Point #{}: {}, Time = {} ms, Memory = {} KB, Score = {}\n",
            index,
            name,
            outcome.time_ms,
            outcome.memory_kb,
            outcome.score()
        ));
    }

    log.push_str(&format!(
        "\n{}, Time = {} ms, Memory = {} KB, Score = {}\n",
        result_name, result.total_time_ms, result.max_memory_kb, result.total_score
    ));
    log
}

pub struct Reporter {
    registry: Arc<dyn Registry>,
    sink: Arc<dyn EventSink>,
    emit_checkpoint_events: bool,
}

impl Reporter {
    pub fn new(
        registry: Arc<dyn Registry>,
        sink: Arc<dyn EventSink>,
        emit_checkpoint_events: bool,
    ) -> Self {
        Self {
            registry,
            sink,
            emit_checkpoint_events,
        }
    }

    pub async fn on_compile_finished(&self, submission_id: i64, result: &CompileResult) {
        info!(
            "[Submission #{}] Compile finished (successful: {})",
            submission_id, result.is_successful
        );

        self.emit(JudgeEvent::CompileFinished {
            submission_id,
            is_successful: result.is_successful,
            compile_log: render_compile_log(result),
        })
        .await;
    }

    /// Only emitted when checkpoint events are enabled
    pub async fn on_checkpoint_finished(&self, submission_id: i64, outcome: &CheckpointOutcome) {
        if !self.emit_checkpoint_events {
            return;
        }

        self.emit(JudgeEvent::CheckpointFinished {
            submission_id,
            checkpoint_id: outcome.checkpoint_id,
            judge_result: outcome.verdict,
            used_time: outcome.time_ms,
            used_memory: outcome.memory_kb,
            score: outcome.score(),
        })
        .await;
    }

    /// Aggregate the outcomes and report them
    pub async fn on_all_checkpoints_finished(&self, submission_id: i64, outcomes: &[CheckpointOutcome]) {
        let result = aggregate(outcomes);

        let mut names = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            names.push(self.verdict_name(outcome.verdict).await);
        }
        let result_name = self.verdict_name(result.verdict).await;

        info!(
            "[Submission #{}] Judging finished: {} (time={}ms, memory={}KB, score={})",
            submission_id, result.verdict, result.total_time_ms, result.max_memory_kb, result.total_score
        );

        self.emit(JudgeEvent::AllTestPointsFinished {
            submission_id,
            judge_result: result.verdict,
            total_time: result.total_time_ms,
            max_memory: result.max_memory_kb,
            total_score: result.total_score,
            runtime_log: render_runtime_log(outcomes, &names, &result, &result_name),
        })
        .await;
    }

    pub async fn on_error_occurred(&self, submission_id: i64) {
        self.emit(JudgeEvent::ErrorOccurred {
            submission_id,
            log: INTERNAL_ERROR_LOG.to_string(),
        })
        .await;
    }

    /// Display name of a verdict, "System Error" when it cannot be resolved
    pub async fn verdict_name(&self, verdict: Verdict) -> String {
        match self.registry.verdict_name(verdict).await {
            Ok(Some(name)) => name,
            Ok(None) => FALLBACK_VERDICT_NAME.to_string(),
            Err(e) => {
                warn!("Failed to look up the name of verdict {}: {:#}", verdict, e);
                FALLBACK_VERDICT_NAME.to_string()
            }
        }
    }

    async fn emit(&self, event: JudgeEvent) {
        if let Err(e) = self.sink.send(&event).await {
            error!(
                "[Submission #{}] Failed to send judge event: {:#}",
                event.submission_id(),
                e
            );
        }
    }
}

/// Sink keeping every event in memory
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<JudgeEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn events(&self) -> Vec<JudgeEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, event: &JudgeEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
