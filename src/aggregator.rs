//! Aggregation of checkpoint outcomes into a submission result

use std::path::Path;

use tracing::warn;

use crate::comparator::Comparator;
use crate::core::Verdict;
use crate::runner::CheckpointRun;

/// Final verdict and usage of one checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointOutcome {
    pub checkpoint_id: i64,
    pub verdict: Verdict,
    pub time_ms: u32,
    pub memory_kb: u32,
}

impl CheckpointOutcome {
    pub fn score(&self) -> u32 {
        self.verdict.score()
    }
}

/// Submission-level result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOutcome {
    pub verdict: Verdict,
    pub total_time_ms: u64,
    pub max_memory_kb: u32,
    pub total_score: u32,
}

/// Check the output of a run the program exited cleanly from.
///
/// Only an accepted run is compared; a mismatch or a comparison failure turns
/// it into a wrong answer. Every other verdict is kept.
pub async fn refine(
    checkpoint_id: i64,
    run: CheckpointRun,
    comparator: &dyn Comparator,
    expected_path: &Path,
    actual_path: &Path,
) -> CheckpointOutcome {
    let verdict = if run.verdict.is_accepted() {
        match comparator.is_output_the_same(expected_path, actual_path).await {
            Ok(true) => Verdict::Accepted,
            Ok(false) => Verdict::WrongAnswer,
            Err(e) => {
                warn!("Checkpoint #{} output comparison failed: {:#}", checkpoint_id, e);
                Verdict::WrongAnswer
            }
        }
    } else {
        run.verdict
    };

    CheckpointOutcome {
        checkpoint_id,
        verdict,
        time_ms: run.time_ms,
        memory_kb: run.memory_kb,
    }
}

/// Sum the time, keep the peak memory and take the first failing verdict
pub fn aggregate(outcomes: &[CheckpointOutcome]) -> AggregateOutcome {
    let verdict = outcomes
        .iter()
        .map(|o| o.verdict)
        .find(|v| !v.is_accepted())
        .unwrap_or(Verdict::Accepted);

    AggregateOutcome {
        verdict,
        total_time_ms: outcomes.iter().map(|o| u64::from(o.time_ms)).sum(),
        max_memory_kb: outcomes.iter().map(|o| o.memory_kb).max().unwrap_or(0),
        total_score: outcomes.iter().map(CheckpointOutcome::score).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FixedComparator(Option<bool>);

    #[async_trait]
    impl Comparator for FixedComparator {
        async fn is_output_the_same(&self, _: &Path, _: &Path) -> Result<bool> {
            self.0.ok_or_else(|| anyhow::anyhow!("unreadable"))
        }
    }

    fn outcome(verdict: Verdict, time_ms: u32, memory_kb: u32) -> CheckpointOutcome {
        CheckpointOutcome {
            checkpoint_id: 1,
            verdict,
            time_ms,
            memory_kb,
        }
    }

    fn run(verdict: Verdict) -> CheckpointRun {
        CheckpointRun {
            verdict,
            time_ms: 50,
            memory_kb: 700,
        }
    }

    #[test]
    fn test_all_accepted() {
        let outcomes = [
            outcome(Verdict::Accepted, 100, 1000),
            outcome(Verdict::Accepted, 150, 1200),
            outcome(Verdict::Accepted, 120, 900),
        ];

        assert_eq!(
            aggregate(&outcomes),
            AggregateOutcome {
                verdict: Verdict::Accepted,
                total_time_ms: 370,
                max_memory_kb: 1200,
                total_score: 30,
            }
        );
    }

    #[test]
    fn test_first_failure_decides_verdict() {
        let outcomes = [
            outcome(Verdict::Accepted, 10, 10),
            outcome(Verdict::TimeLimitExceeded, 1000, 10),
            outcome(Verdict::Accepted, 10, 10),
            outcome(Verdict::WrongAnswer, 10, 10),
        ];

        let result = aggregate(&outcomes);
        assert_eq!(result.verdict, Verdict::TimeLimitExceeded);
        assert_eq!(result.total_score, 20);
    }

    #[test]
    fn test_empty_outcomes() {
        assert_eq!(
            aggregate(&[]),
            AggregateOutcome {
                verdict: Verdict::Accepted,
                total_time_ms: 0,
                max_memory_kb: 0,
                total_score: 0,
            }
        );
    }

    #[test]
    fn test_score_grows_with_accepted_count() {
        let mut outcomes = vec![outcome(Verdict::RuntimeError, 1, 1); 5];
        let mut last = aggregate(&outcomes).total_score;
        assert_eq!(last, 0);

        for i in 0..outcomes.len() {
            outcomes[i].verdict = Verdict::Accepted;
            let score = aggregate(&outcomes).total_score;
            assert_eq!(score, 10 * (i as u32 + 1));
            assert!(score > last);
            last = score;
        }
    }

    #[tokio::test]
    async fn test_refine() {
        let (e, a) = (Path::new("expected"), Path::new("actual"));

        let same = refine(1, run(Verdict::Accepted), &FixedComparator(Some(true)), e, a).await;
        assert_eq!(same.verdict, Verdict::Accepted);
        assert_eq!(same.score(), 10);

        let mismatch = refine(1, run(Verdict::Accepted), &FixedComparator(Some(false)), e, a).await;
        assert_eq!(mismatch.verdict, Verdict::WrongAnswer);
        assert_eq!(mismatch.score(), 0);
        assert_eq!((mismatch.time_ms, mismatch.memory_kb), (50, 700));

        let unreadable = refine(1, run(Verdict::Accepted), &FixedComparator(None), e, a).await;
        assert_eq!(unreadable.verdict, Verdict::WrongAnswer);

        // not compared at all
        let tle = refine(1, run(Verdict::TimeLimitExceeded), &FixedComparator(None), e, a).await;
        assert_eq!(tle.verdict, Verdict::TimeLimitExceeded);
    }
}
