use async_trait::async_trait;
use harness::{
    combinations, detect_runtime, ContainerRuntime, DevcontainerError, DevcontainerExecutor,
    DevcontainerResult, HarnessConfig, MatrixFilter, MatrixRunner, RunnerError,
    TemplateExecutor, TemplateInstance, TemplateTester, TestLog, TEST_PROJECT_DIR,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use template::unresolved_placeholders;

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..")
}

/// Keeps logs, results and instances out of the repository
fn scratch_config(scratch: &Path) -> HarnessConfig {
    HarnessConfig::new()
        .with_repo_root(repo_root())
        .with_work_dir(scratch.join("work"))
        .with_log_dir(scratch.join(".test-logs"))
        .with_results_file(scratch.join(".test-results.txt"))
}

/// Inspects each materialized instance instead of starting containers
#[derive(Default)]
struct InspectingExecutor {
    fail_templates: Vec<String>,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl TemplateExecutor for InspectingExecutor {
    async fn preflight(&self) -> DevcontainerResult<()> {
        Ok(())
    }

    async fn execute(
        &self,
        instance: &TemplateInstance,
        log: &mut TestLog,
    ) -> DevcontainerResult<()> {
        for rel in [
            ".devcontainer/devcontainer.json",
            ".devcontainer/Dockerfile",
        ] {
            let text = fs::read_to_string(instance.workspace.join(rel))?;
            assert!(
                unresolved_placeholders(&text).is_empty(),
                "{} has unresolved placeholders in {rel}",
                instance.combination
            );
        }
        let workspace = instance.workspace.as_path();
        assert!(workspace.join(TEST_PROJECT_DIR).join("test.sh").is_file());
        assert!(workspace.join("test-utils/test-utils.sh").is_file());

        log.line("inspected")?;
        let combination = instance.combination.to_string();
        self.seen.lock().unwrap().push(combination);

        if self.fail_templates.contains(&instance.combination.template) {
            return Err(DevcontainerError::CommandFailed {
                command: "devcontainer up".to_string(),
                status: "exit status 1".to_string(),
            });
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_full_matrix_against_shipped_templates() {
    let scratch = tempfile::tempdir().unwrap();
    let config = scratch_config(scratch.path());
    let runner = MatrixRunner::new(config, InspectingExecutor::default());

    let summary = runner.run(MatrixFilter::default()).await.unwrap();
    assert_eq!(summary.total(), 15);
    assert!(summary.is_success(), "failed: {:?}", summary.failed());

    let seen = runner.tester().executor().seen.lock().unwrap().clone();
    let expected: Vec<String> = combinations(MatrixFilter::default())
        .iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(seen, expected);

    let logs = fs::read_dir(scratch.path().join(".test-logs")).unwrap().count();
    assert_eq!(logs, 15);
    let results = fs::read_to_string(scratch.path().join(".test-results.txt")).unwrap();
    assert_eq!(results, "");
}

#[tokio::test]
async fn test_skip_flags_select_podman_only() {
    let scratch = tempfile::tempdir().unwrap();
    let config = scratch_config(scratch.path());
    let runner = MatrixRunner::new(config, InspectingExecutor::default());

    let filter = MatrixFilter {
        skip_fedora: true,
        skip_ubi: true,
        skip_podman: false,
    };
    let summary = runner.run(filter).await.unwrap();
    assert_eq!(summary.total(), 1);
    assert_eq!(
        runner.tester().executor().seen.lock().unwrap().as_slice(),
        ["template=podman-in-podman"]
    );
}

#[tokio::test]
async fn test_failed_ubi_runs_are_retried() {
    let scratch = tempfile::tempdir().unwrap();
    let executor = InspectingExecutor {
        fail_templates: vec!["ubi".to_string()],
        ..Default::default()
    };
    let runner = MatrixRunner::new(scratch_config(scratch.path()), executor);

    let summary = runner.run(MatrixFilter::default()).await.unwrap();
    assert_eq!(summary.total() - summary.passed(), 9);

    let results = fs::read_to_string(scratch.path().join(".test-results.txt")).unwrap();
    assert_eq!(results.lines().count(), 9);
    assert!(results.lines().all(|l| l.starts_with("template=ubi ")));

    let config = scratch_config(scratch.path());
    let retry_runner = MatrixRunner::new(config, InspectingExecutor::default());
    let retry = retry_runner.retry_failed().await.unwrap();
    assert_eq!(retry.total(), 9);
    assert!(retry.is_success());
    let results = fs::read_to_string(scratch.path().join(".test-results.txt")).unwrap();
    assert_eq!(results.lines().count(), 0);
}

#[tokio::test]
async fn test_podman_in_podman_override() {
    let scratch = tempfile::tempdir().unwrap();
    let config = scratch_config(scratch.path());
    let instance_dir = config.instance_dir("podman-in-podman-5.7.1");
    let tester = TemplateTester::new(config, InspectingExecutor::default());

    let overrides = vec![("imageVariant".to_string(), "5.7.1".to_string())];
    let outcome = tester
        .test_template("podman-in-podman", &overrides)
        .await
        .unwrap();
    assert!(outcome.passed);

    let dockerfile = fs::read_to_string(instance_dir.join(".devcontainer/Dockerfile")).unwrap();
    assert!(dockerfile.starts_with("FROM quay.io/podman/stable:v5.7.1\n"));
}

#[tokio::test]
async fn test_unknown_template_creates_no_logs() {
    let scratch = tempfile::tempdir().unwrap();
    let config = scratch_config(scratch.path());
    let tester = TemplateTester::new(config, InspectingExecutor::default());

    let result = tester.test_template("alpine", &[]).await;
    assert!(matches!(result, Err(RunnerError::TemplateNotFound { .. })));
    assert!(!scratch.path().join(".test-logs").exists());
}

/// Requires Podman or Docker plus the Dev Container CLI
#[tokio::test]
#[ignore]
async fn test_fedora_in_real_container() {
    if detect_runtime() == ContainerRuntime::None {
        println!("Skipping: no container runtime available");
        return;
    }

    let scratch = tempfile::tempdir().unwrap();
    let config = scratch_config(scratch.path());
    let executor = DevcontainerExecutor::from_config(&config);
    let tester = TemplateTester::new(config, executor);

    let outcome = tester.test_template("fedora", &[]).await.unwrap();
    assert!(outcome.passed);
}
