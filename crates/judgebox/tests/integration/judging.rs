use judgebox::{ExecutionFailure, Language, Outcome, Problem, ResourceLimits, TestCase};

use super::{files_in, shell_runner, write_script};

fn three_cases() -> Problem {
    Problem::new(
        "double",
        vec![
            TestCase::new("1", "2"),
            TestCase::new("2", "5"),
            TestCase::new("3", "6"),
        ],
    )
}

#[tokio::test]
async fn test_all_cases_pass() {
    let (_dir, runner) = shell_runner();
    let problem = Problem::new(
        "double",
        vec![
            TestCase::new("1", "2"),
            TestCase::new("2", "4"),
            TestCase::new("3", "6\r\n"),
        ],
    );
    let source = write_script(&runner, Language::Python3, "read x; echo $((x * 2))").await;

    let verdict = runner
        .judge(&problem, Language::Python3, source.path(), None)
        .await
        .expect("Judge failed");

    assert_eq!(verdict.outcome, Outcome::Accepted);
    assert!(verdict.failing_test_case.is_none());
    assert!(verdict.total_elapsed_time_ms > 0.0);
}

#[tokio::test]
async fn test_wrong_answer_stops_at_second_case() {
    let (_dir, runner) = shell_runner();
    let problem = three_cases();
    // Log every input the program sees
    let log = runner.artifacts().dir().join("seen.log");
    let script = format!("read x; echo \"$x\" >> {}; echo $((x * 2))", log.display());
    let source = write_script(&runner, Language::Python3, &script).await;

    let verdict = runner
        .judge(&problem, Language::Python3, source.path(), None)
        .await
        .expect("Judge failed");

    assert_eq!(verdict.outcome, Outcome::WrongAnswer);
    assert_eq!(verdict.failing_test_case, Some(TestCase::new("2", "5")));
    // The third case never ran
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "1\n2\n");
    assert!(verdict.total_elapsed_time_ms > 0.0);
}

#[tokio::test]
async fn test_totals_only_count_passing_cases() {
    let (_dir, runner) = shell_runner();
    let problem = Problem::new(
        "slow-then-wrong",
        vec![TestCase::new("a", "a"), TestCase::new("b", "x")],
    );
    // The passing case is fast, the failing one slow
    let script = "read x; if [ \"$x\" = b ]; then sleep 0.5; fi; echo \"$x\"";
    let source = write_script(&runner, Language::Python3, script).await;

    let verdict = runner
        .judge(&problem, Language::Python3, source.path(), None)
        .await
        .unwrap();

    assert_eq!(verdict.outcome, Outcome::WrongAnswer);
    assert!(verdict.total_elapsed_time_ms < 500.0);
}

#[tokio::test]
async fn test_failure_verdict_carries_failing_case() {
    let (_dir, runner) = shell_runner();
    let problem = three_cases().with_limits(ResourceLimits::unset().with_time_limit(300));
    let script = "read x; if [ \"$x\" = 1 ]; then sleep 5; fi; echo $((x * 2))";
    let source = write_script(&runner, Language::Python3, script).await;

    let verdict = runner
        .judge(&problem, Language::Python3, source.path(), None)
        .await
        .unwrap();

    assert_eq!(verdict.outcome, Outcome::Failed(ExecutionFailure::TimeExceeded));
    assert_eq!(verdict.failing_test_case, Some(TestCase::new("1", "2")));
    assert_eq!(verdict.total_elapsed_time_ms, 0.0);
    assert_eq!(verdict.total_memory_used_mb, 0.0);
}

#[tokio::test]
async fn test_overrides_beat_problem_limits() {
    let (_dir, runner) = shell_runner();
    let problem = Problem::new("sleepy", vec![TestCase::new("", "ok")])
        .with_limits(ResourceLimits::unset().with_time_limit(100));
    let source = write_script(&runner, Language::Python3, "sleep 0.3; echo ok").await;

    let verdict = runner
        .judge(&problem, Language::Python3, source.path(), None)
        .await
        .unwrap();
    assert_eq!(verdict.outcome, Outcome::Failed(ExecutionFailure::TimeExceeded));

    let overrides = ResourceLimits::unset().with_time_limit(5000);
    let verdict = runner
        .judge(&problem, Language::Python3, source.path(), Some(&overrides))
        .await
        .unwrap();
    assert_eq!(verdict.outcome, Outcome::Accepted);
}

#[tokio::test]
async fn test_compile_error_fails_first_case() {
    let (dir, runner) = shell_runner();
    let source = write_script(&runner, Language::Cpp, "if then fi (").await;

    let verdict = runner
        .judge(&three_cases(), Language::Cpp, source.path(), None)
        .await
        .unwrap();

    assert!(matches!(
        verdict.outcome,
        Outcome::Failed(ExecutionFailure::CompileError { .. })
    ));
    assert_eq!(verdict.failing_test_case, Some(TestCase::new("1", "2")));

    drop(source);
    assert!(files_in(dir.path()).is_empty());
}
