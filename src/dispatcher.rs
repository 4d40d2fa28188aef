//! Dispatcher - drives one submission through the judging pipeline
//!
//! preprocess -> compile -> run every checkpoint -> report -> cleanup
//!
//! Only one task runs at a time; the whole pipeline is a critical section.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::aggregator::{self, CheckpointOutcome};
use crate::comparator::Comparator;
use crate::compiler::Compiler;
use crate::config::JudgerConfig;
use crate::error::{JudgeError, JudgeResult};
use crate::executer::Executer;
use crate::models::{JudgeTask, Submission};
use crate::preprocessor::{FixtureCache, Preprocessor};
use crate::registry::Registry;
use crate::reporter::{EventSink, Reporter};
use crate::runner::Runner;
use crate::workspace::Workspace;

pub struct Dispatcher {
    registry: Arc<dyn Registry>,
    preprocessor: Preprocessor,
    compiler: Compiler,
    runner: Runner,
    comparator: Arc<dyn Comparator>,
    reporter: Reporter,
    work_dir: PathBuf,
    task_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        config: &JudgerConfig,
        registry: Arc<dyn Registry>,
        executer: Arc<dyn Executer>,
        comparator: Arc<dyn Comparator>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let principal = config.execution_user.clone();

        Self {
            preprocessor: Preprocessor::new(
                registry.clone(),
                FixtureCache::new(&config.checkpoint_dir),
            ),
            compiler: Compiler::new(executer.clone(), principal.clone()),
            runner: Runner::new(executer, principal),
            reporter: Reporter::new(registry.clone(), sink, config.emit_checkpoint_events),
            registry,
            comparator,
            work_dir: config.work_dir.clone(),
            task_lock: Mutex::new(()),
        }
    }

    /// Entry point for "submission created" messages. Errors are logged only.
    pub async fn on_submission_created(&self, submission_id: i64) {
        if let Err(e) = self.create_new_task(submission_id).await {
            error!("[Submission #{}] Judging aborted: {}", submission_id, e);
        }
    }

    /// Judge a submission end to end.
    ///
    /// Fails before touching the filesystem when the submission, its language
    /// or its problem cannot be found. Once the workspace is allocated the
    /// task always runs to completion and the workspace is removed.
    pub async fn create_new_task(&self, submission_id: i64) -> JudgeResult<()> {
        let _guard = self.task_lock.lock().await;

        let task = self.load_task(submission_id).await?;
        let workspace = Workspace::new(&self.work_dir, submission_id);

        info!(
            "[Submission #{}] Judging problem #{} in {} (workspace {:?})",
            submission_id,
            task.problem_id(),
            task.language.name,
            workspace.dir()
        );

        self.judge(&task, &workspace).await;
        workspace.cleanup().await;

        Ok(())
    }

    async fn load_task(&self, submission_id: i64) -> JudgeResult<JudgeTask> {
        let submission = self
            .registry
            .submission(submission_id)
            .await
            .map_err(JudgeError::Registry)?
            .ok_or(JudgeError::IllegalSubmission(submission_id))?;

        let result = self.resolve(submission).await;
        if result.is_err() {
            self.reporter.on_error_occurred(submission_id).await;
        }
        result
    }

    async fn resolve(&self, submission: Submission) -> JudgeResult<JudgeTask> {
        let submission_id = submission.submission_id;

        let language = self
            .registry
            .language(submission.language_id)
            .await
            .map_err(JudgeError::Registry)?
            .ok_or(JudgeError::UnknownLanguage {
                submission_id,
                language_id: submission.language_id,
            })?;

        let problem = self
            .registry
            .problem(submission.problem_id)
            .await
            .map_err(JudgeError::Registry)?
            .ok_or(JudgeError::UnknownProblem {
                submission_id,
                problem_id: submission.problem_id,
            })?;

        Ok(JudgeTask {
            submission,
            language,
            problem,
        })
    }

    async fn judge(&self, task: &JudgeTask, workspace: &Workspace) {
        let submission_id = task.submission_id();

        if let Err(e) = self.preprocess(task, workspace).await {
            error!("[Submission #{}] Preprocessing failed: {}", submission_id, e);
            self.reporter.on_error_occurred(submission_id).await;
        }

        let compile_result = self.compiler.get_compile_result(task, workspace).await;
        self.reporter
            .on_compile_finished(submission_id, &compile_result)
            .await;
        if !compile_result.is_successful {
            return;
        }

        let outcomes = match self.run_checkpoints(task, workspace).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!("[Submission #{}] Failed to run checkpoints: {}", submission_id, e);
                self.reporter.on_error_occurred(submission_id).await;
                return;
            }
        };

        self.reporter
            .on_all_checkpoints_finished(submission_id, &outcomes)
            .await;
    }

    async fn preprocess(&self, task: &JudgeTask, workspace: &Workspace) -> JudgeResult<()> {
        self.preprocessor.create_test_code(task, workspace).await?;
        self.preprocessor.fetch_test_points(task.problem_id()).await?;
        Ok(())
    }

    async fn run_checkpoints(
        &self,
        task: &JudgeTask,
        workspace: &Workspace,
    ) -> JudgeResult<Vec<CheckpointOutcome>> {
        let problem_id = task.problem_id();
        let fixtures = self.preprocessor.fixtures();
        let checkpoints = self
            .registry
            .checkpoints(problem_id)
            .await
            .map_err(JudgeError::Registry)?;

        let mut outcomes = Vec::with_capacity(checkpoints.len());
        for checkpoint in &checkpoints {
            let checkpoint_id = checkpoint.checkpoint_id;
            let output_path = workspace.output_path(checkpoint_id);

            let run = self
                .runner
                .get_runtime_result(
                    task,
                    workspace,
                    &fixtures.input_path(problem_id, checkpoint_id),
                    &output_path,
                )
                .await;
            let outcome = aggregator::refine(
                checkpoint_id,
                run,
                self.comparator.as_ref(),
                &fixtures.answer_path(problem_id, checkpoint_id),
                &output_path,
            )
            .await;

            self.reporter
                .on_checkpoint_finished(task.submission_id(), &outcome)
                .await;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}
