use judgebox::{AuthStatus, ProblemDirectory, Runner, Service, SubmitRequest};

use super::{files_in, fixture_path, shell_config};

fn service(work_dir: &std::path::Path) -> Service<ProblemDirectory> {
    Service::new(
        Runner::new(shell_config(work_dir)),
        ProblemDirectory::new(fixture_path("problems")),
    )
}

fn submit(language: &str, code: &str, problem: &str) -> SubmitRequest {
    SubmitRequest {
        language: Some(language.to_owned()),
        code: Some(code.to_owned()),
        problem_id: Some(problem.to_owned()),
    }
}

#[tokio::test]
async fn test_submit_toml_problem_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let response = service
        .submit(
            AuthStatus::Authorized,
            submit("Python3", "read a b; echo $((a + b))", "sum"),
        )
        .await;

    assert_eq!(response.status, 200);
    assert!(response.body.success);
    assert_eq!(response.body.verdict.as_deref(), Some("Accepted"));
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_submit_json_problem_with_crlf_expectations() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let response = service
        .submit(AuthStatus::Authorized, submit("python3", "cat", "echo"))
        .await;

    assert_eq!(response.body.verdict.as_deref(), Some("Accepted"));
}

#[tokio::test]
async fn test_submit_compiled_wrong_answer() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let response = service
        .submit(
            AuthStatus::Authorized,
            submit("C++", "read a b; echo $((a - b))", "sum"),
        )
        .await;

    assert_eq!(response.status, 200);
    assert!(!response.body.success);
    assert_eq!(response.body.verdict.as_deref(), Some("Wrong Answer"));
    assert_eq!(response.body.failed_test_case.as_deref(), Some("1 2"));
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_submit_compile_error_status() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let response = service
        .submit(AuthStatus::Authorized, submit("cpp", "if then fi (", "sum"))
        .await;

    assert_eq!(response.status, 400);
    assert_eq!(response.body.verdict.as_deref(), Some("Compilation Error"));
    assert!(
        response
            .body
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Compilation error: "))
    );
}

#[tokio::test]
async fn test_submit_memory_breach_status() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    // sum.toml allows 64 MB
    let code = "x=$(head -c 134217728 /dev/zero | tr '\\000' a); echo 3";
    let response = service
        .submit(AuthStatus::Authorized, submit("python3", code, "sum"))
        .await;

    assert_eq!(response.status, 413);
    assert_eq!(response.body.verdict.as_deref(), Some("Memory Limit Exceeded"));
}

#[tokio::test]
async fn test_submit_unknown_problem() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let response = service
        .submit(AuthStatus::Authorized, submit("cpp", "echo", "nope"))
        .await;

    assert_eq!(response.status, 400);
    assert_eq!(response.body.error.as_deref(), Some("Problem not found"));
}
