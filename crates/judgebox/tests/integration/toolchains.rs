//! Tests against the real g++, java and python3 toolchains

use judgebox::{
    Config, ExecutionFailure, Language, Outcome, ProblemDirectory, ProblemStore, ResourceLimits,
    Runner,
};

use super::{files_in, fixture_path};

fn runner(work_dir: &std::path::Path) -> Runner {
    let mut config = Config::default();
    config.work_dir = work_dir.to_owned();
    Runner::new(config)
}

async fn judge_fixture(
    language: Language,
    fixture: &str,
    overrides: Option<&ResourceLimits>,
) -> (tempfile::TempDir, Outcome) {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(dir.path());
    let problem = ProblemDirectory::new(fixture_path("problems"))
        .problem("sum")
        .unwrap()
        .expect("sum problem fixture");

    let code = std::fs::read_to_string(fixture_path(fixture)).unwrap();
    let source = runner.artifacts().write_source(language, &code).await.unwrap();
    let verdict = runner
        .judge(&problem, language, source.path(), overrides)
        .await
        .expect("Judge failed");
    source.release();

    (dir, verdict.outcome)
}

#[tokio::test]
async fn test_cpp_sum_accepted() {
    let (dir, outcome) = judge_fixture(Language::Cpp, "sources/sum.cpp", None).await;
    assert_eq!(outcome, Outcome::Accepted);
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_python_sum_accepted() {
    let (_dir, outcome) = judge_fixture(Language::Python3, "sources/sum.py", None).await;
    assert_eq!(outcome, Outcome::Accepted);
}

#[tokio::test]
async fn test_java_sum_accepted() {
    // The source launcher compiles inside the JVM, whose resident set alone
    // is well above the problem's 64 MB.
    let overrides = ResourceLimits::unset()
        .with_time_limit(15_000)
        .with_memory_limit(1024);
    let (_dir, outcome) =
        judge_fixture(Language::Java, "sources/Sum.java", Some(&overrides)).await;
    assert_eq!(outcome, Outcome::Accepted);
}

#[tokio::test]
async fn test_cpp_syntax_error() {
    let (dir, outcome) = judge_fixture(Language::Cpp, "sources/syntax_error.cpp", None).await;
    match outcome {
        Outcome::Failed(ExecutionFailure::CompileError { diagnostic }) => {
            assert!(diagnostic.contains("error"), "{diagnostic}");
        }
        other => panic!("expected compile error, got {other:?}"),
    }
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_cpp_hello_world() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(dir.path());

    let code = std::fs::read_to_string(fixture_path("sources/hello.cpp")).unwrap();
    let source = runner
        .artifacts()
        .write_source(Language::Cpp, &code)
        .await
        .unwrap();
    let result = runner
        .run(
            Language::Cpp,
            source.path(),
            b"",
            &runner.config().default_limits,
        )
        .await
        .unwrap()
        .expect("Execution failed");

    assert_eq!(result.normalized_output, "Hello, World!");
}
