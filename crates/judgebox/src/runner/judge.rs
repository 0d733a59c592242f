//! Judge loop
//!
//! Runs a submission against a problem's test cases in order and stops at
//! the first case that fails or produces the wrong answer.

use std::future::Future;

use tracing::debug;

use crate::types::{
    ExecutionFailure, ExecutionResult, JudgeVerdict, Outcome, TestCase, normalize_output,
};

/// Judge `cases` in order with `execute_case` producing each attempt.
///
/// The outer `Result` of `execute_case` is for errors that abort the whole
/// run (nothing is judged after one); the inner one is the attempt's
/// classification. Totals only include cases that passed before the
/// terminal one.
pub async fn judge_cases<F, Fut, E>(cases: &[TestCase], mut execute_case: F) -> Result<JudgeVerdict, E>
where
    F: FnMut(&TestCase) -> Fut,
    Fut: Future<Output = Result<Result<ExecutionResult, ExecutionFailure>, E>>,
{
    let mut total_elapsed_time_ms = 0.0;
    let mut total_memory_used_mb = 0.0;

    for (index, case) in cases.iter().enumerate() {
        let outcome = match execute_case(case).await? {
            Ok(result) if result.normalized_output == normalize_output(&case.expected_output) => {
                debug!(case = index + 1, elapsed_ms = result.elapsed_time_ms, "test case passed");
                total_elapsed_time_ms += result.elapsed_time_ms;
                total_memory_used_mb += result.memory_used_mb;
                continue;
            }
            Ok(_) => Outcome::WrongAnswer,
            Err(failure) => Outcome::Failed(failure),
        };

        debug!(case = index + 1, verdict = outcome.verdict_name(), "test case failed");
        return Ok(JudgeVerdict {
            outcome,
            failing_test_case: Some(case.clone()),
            total_elapsed_time_ms,
            total_memory_used_mb,
        });
    }

    Ok(JudgeVerdict {
        outcome: Outcome::Accepted,
        failing_test_case: None,
        total_elapsed_time_ms,
        total_memory_used_mb,
    })
}
