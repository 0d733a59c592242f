use judgebox::{ExecutionFailure, Language, ResourceLimits};

use super::{group_gone, request, shell_runner, write_script};

#[tokio::test]
async fn test_run_echoes_input() {
    let (_dir, runner) = shell_runner();
    let source = write_script(&runner, Language::Python3, "read a b; echo $((a + b))").await;

    let request = request(
        &runner,
        Language::Python3,
        source.path(),
        "20 22\n",
        &ResourceLimits::default(),
    )
    .await;
    let result = runner.execute(request).await.expect("Execution failed");

    assert_eq!(result.normalized_output, "42");
    assert!(result.elapsed_time_ms > 0.0);
    assert!(result.elapsed_time_ms < 4000.0);
}

#[tokio::test]
async fn test_output_is_normalized() {
    let (_dir, runner) = shell_runner();
    let script = std::fs::read_to_string(super::fixture_path("sources/echo.sh")).unwrap();
    let source = write_script(&runner, Language::Python3, &script).await;

    let request = request(
        &runner,
        Language::Python3,
        source.path(),
        "one\ntwo\n\n",
        &ResourceLimits::default(),
    )
    .await;
    let result = runner.execute(request).await.expect("Execution failed");

    assert_eq!(result.normalized_output, "one\ntwo");
}

#[tokio::test]
async fn test_deterministic_program_gives_identical_output() {
    let (_dir, runner) = shell_runner();
    let source = write_script(&runner, Language::Python3, "seq 1 100").await;

    let mut outputs = Vec::new();
    for _ in 0..3 {
        let request = request(
            &runner,
            Language::Python3,
            source.path(),
            "",
            &ResourceLimits::default(),
        )
        .await;
        outputs.push(runner.execute(request).await.unwrap().normalized_output);
    }

    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_memory_usage_is_reported() {
    let (_dir, runner) = shell_runner();
    let source = write_script(&runner, Language::Python3, "sleep 0.2; echo done").await;

    let request = request(
        &runner,
        Language::Python3,
        source.path(),
        "",
        &ResourceLimits::default(),
    )
    .await;
    let result = runner.execute(request).await.unwrap();

    assert_eq!(result.normalized_output, "done");
    assert!(result.memory_used_mb > 0.0);
    assert!(result.memory_used_mb < 64.0);
}

#[tokio::test]
async fn test_sleeping_program_times_out_and_group_is_gone() {
    let (dir, runner) = shell_runner();
    let pid_file = dir.path().join("leader.pid");
    let script = format!("echo $$ > {}; sleep 5; echo late", pid_file.display());
    let source = write_script(&runner, Language::Python3, &script).await;

    let limits = ResourceLimits::default().with_time_limit(300);
    let request = request(&runner, Language::Python3, source.path(), "", &limits).await;
    let result = runner.execute(request).await;

    assert_eq!(result, Err(ExecutionFailure::TimeExceeded));

    let pgid: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(group_gone(pgid).await, "process group {pgid} survived");
}

#[tokio::test]
async fn test_memory_hog_is_killed_before_exit() {
    let (_dir, runner) = shell_runner();
    let script = "x=$(head -c 67108864 /dev/zero | tr '\\000' a); sleep 30; echo \"${#x}\"";
    let source = write_script(&runner, Language::Python3, script).await;

    let limits = ResourceLimits::default()
        .with_time_limit(20_000)
        .with_memory_limit(16);
    let started = std::time::Instant::now();
    let request = request(&runner, Language::Python3, source.path(), "", &limits).await;
    let result = runner.execute(request).await;

    assert_eq!(result, Err(ExecutionFailure::MemoryExceeded));
    assert!(started.elapsed() < std::time::Duration::from_secs(20));
}

#[tokio::test]
async fn test_output_flood_is_output_too_large() {
    let (_dir, runner) = shell_runner();
    let source = write_script(&runner, Language::Python3, "yes judgebox").await;

    let limits = ResourceLimits::default()
        .with_time_limit(10_000)
        .with_memory_limit(8);
    let request = request(&runner, Language::Python3, source.path(), "", &limits).await;
    let result = runner.execute(request).await;

    assert_eq!(result, Err(ExecutionFailure::OutputTooLarge));
}

#[tokio::test]
async fn test_nonzero_exit_is_runtime_error() {
    let (_dir, runner) = shell_runner();
    let source = write_script(&runner, Language::Python3, "echo partial; exit 3").await;

    let request = request(
        &runner,
        Language::Python3,
        source.path(),
        "",
        &ResourceLimits::default(),
    )
    .await;
    let result = runner.execute(request).await;

    assert_eq!(
        result,
        Err(ExecutionFailure::RuntimeError {
            diagnostic: "process exited with status 3".to_owned()
        })
    );
}

#[tokio::test]
async fn test_stderr_is_runtime_error() {
    let (_dir, runner) = shell_runner();
    let source = write_script(&runner, Language::Python3, "echo 'Traceback: boom' >&2").await;

    let request = request(
        &runner,
        Language::Python3,
        source.path(),
        "",
        &ResourceLimits::default(),
    )
    .await;
    let result = runner.execute(request).await;

    assert_eq!(
        result,
        Err(ExecutionFailure::RuntimeError {
            diagnostic: "Traceback: boom\n".to_owned()
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_jobs_do_not_collide() {
    let (_dir, runner) = shell_runner();
    let source = write_script(&runner, Language::Python3, "read x; sleep 0.1; echo \"$x\"").await;
    let source_path = source.path().to_owned();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let runner = runner.clone();
            let source_path = source_path.clone();
            tokio::spawn(async move {
                let limits = ResourceLimits::default();
                let result = runner
                    .run(Language::Python3, &source_path, format!("{i}\n").as_bytes(), &limits)
                    .await
                    .expect("Failed to allocate job");
                (i, result)
            })
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.await.unwrap();
        assert_eq!(result.unwrap().normalized_output, i.to_string());
    }
}
