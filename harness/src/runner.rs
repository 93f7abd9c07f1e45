//! Template test orchestration.
//!
//! [`TemplateTester`] prepares and runs a single template instance,
//! [`MatrixRunner`] walks the fixed combination matrix (or the recorded
//! failures) one combination at a time. Container work is delegated to a
//! [`TemplateExecutor`] so the orchestration can run without an engine.

use crate::config::HarnessConfig;
use crate::devcontainer::{DevcontainerResult, TEST_PROJECT_DIR};
use crate::logs::{LogDir, TestLog};
use crate::matrix::{combinations, Combination, MatrixFilter};
use crate::results::{ResultsError, ResultsFile};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use template::{
    apply_derived_options, copy_dir_all, materialize, OptionAssignment, TemplateDescriptor,
    TemplateError,
};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Template '{template}' not found at {path}")]
    TemplateNotFound { template: String, path: PathBuf },

    #[error("Test directory for template '{template}' not found at {path}")]
    TestDirNotFound { template: String, path: PathBuf },

    #[error("Test script missing: {path}")]
    TestScriptNotFound { path: PathBuf },

    #[error("Test of '{combination}' failed: {reason}. See {log}")]
    TestFailed {
        combination: String,
        reason: String,
        log: PathBuf,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Executor(#[from] crate::devcontainer::DevcontainerError),

    #[error(transparent)]
    Results(#[from] ResultsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;

/// A materialized template ready to be handed to the Dev Container CLI
#[derive(Debug, Clone)]
pub struct TemplateInstance {
    pub combination: Combination,
    /// Workspace folder holding `.devcontainer/` and `test-project/`
    pub workspace: PathBuf,
    pub assignment: OptionAssignment,
}

/// Builds, runs and smoke-tests one template instance
#[async_trait]
pub trait TemplateExecutor: Send + Sync {
    /// Fatal environment checks (runtime, CLI) done once before any test
    async fn preflight(&self) -> DevcontainerResult<()>;

    /// Bring the instance up and run its smoke test, writing the transcript to `log`
    async fn execute(
        &self,
        instance: &TemplateInstance,
        log: &mut TestLog,
    ) -> DevcontainerResult<()>;
}

/// Outcome of one combination
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub combination: Combination,
    pub passed: bool,
    pub error: Option<String>,
    pub log: Option<PathBuf>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<TestOutcome>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed(&self) -> Vec<Combination> {
        self.outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.combination.clone())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn print(&self) {
        println!();
        println!("==================== Summary ====================");
        println!("Total:  {}", self.total());
        println!("Passed: {}", self.passed());
        println!("Failed: {}", self.total() - self.passed());
        for outcome in self.outcomes.iter().filter(|o| !o.passed) {
            match &outcome.log {
                Some(log) => println!("  ❌ {} ({})", outcome.combination, log.display()),
                None => println!("  ❌ {}", outcome.combination),
            }
        }
    }
}

pub struct TemplateTester<E> {
    config: HarnessConfig,
    executor: E,
}

impl<E: TemplateExecutor> TemplateTester<E> {
    pub fn new(config: HarnessConfig, executor: E) -> Self {
        Self { config, executor }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Fail fast when `src/<template>` or `test/<template>` is missing
    pub fn check_directories(&self, template: &str) -> RunnerResult<()> {
        let template_dir = self.config.template_dir(template);
        if !template_dir.is_dir() {
            return Err(RunnerError::TemplateNotFound {
                template: template.to_string(),
                path: template_dir,
            });
        }

        let test_dir = self.config.test_dir(template);
        if !test_dir.is_dir() {
            return Err(RunnerError::TestDirNotFound {
                template: template.to_string(),
                path: test_dir,
            });
        }

        let script = test_dir.join("test.sh");
        if !script.is_file() {
            return Err(RunnerError::TestScriptNotFound { path: script });
        }

        Ok(())
    }

    /// Resolve options and write the instance, test project included, to the scratch directory
    pub fn prepare(&self, combination: &Combination) -> RunnerResult<TemplateInstance> {
        self.check_directories(&combination.template)?;

        let template_dir = self.config.template_dir(&combination.template);
        let descriptor = TemplateDescriptor::load(&template_dir)?;
        let mut assignment = OptionAssignment::resolve(&descriptor, &combination.options)?;
        apply_derived_options(&descriptor.id, &mut assignment);

        let workspace = self.config.instance_dir(&combination.slug());
        materialize(&template_dir, &workspace, &assignment)?;

        copy_dir_all(
            &self.config.test_dir(&combination.template),
            &workspace.join(TEST_PROJECT_DIR),
        )?;
        let utils = self.config.test_utils_dir();
        if utils.is_dir() {
            copy_dir_all(&utils, &workspace.join("test-utils"))?;
        }

        Ok(TemplateInstance {
            combination: combination.clone(),
            workspace,
            assignment,
        })
    }

    /// Run one combination; every failure is recorded in the outcome, never returned
    pub async fn run_one(&self, combination: &Combination, logs: &LogDir) -> TestOutcome {
        let started = Instant::now();
        let mut log = match logs.open(combination) {
            Ok(log) => log,
            Err(e) => {
                error!(combination = %combination, error = %e, "Could not create test log");
                return TestOutcome {
                    combination: combination.clone(),
                    passed: false,
                    error: Some(e.to_string()),
                    log: None,
                    duration: started.elapsed(),
                };
            }
        };

        let result = self.prepare_and_execute(combination, &mut log).await;
        if let Err(e) = &result {
            let _ = log.section("error");
            let _ = log.line(&e.to_string());
        }

        let passed = result.is_ok();
        let log_path = match log.finish(passed) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "Could not finalize test log");
                None
            }
        };

        TestOutcome {
            combination: combination.clone(),
            passed,
            error: result.err().map(|e| e.to_string()),
            log: log_path,
            duration: started.elapsed(),
        }
    }

    async fn prepare_and_execute(
        &self,
        combination: &Combination,
        log: &mut TestLog,
    ) -> RunnerResult<()> {
        log.section("materialize")?;
        let instance = self.prepare(combination)?;
        for (name, value) in instance.assignment.iter() {
            log.line(&format!("{name}={value}"))?;
        }
        log.line(&format!("workspace: {}", instance.workspace.display()))?;

        self.executor.execute(&instance, log).await?;
        Ok(())
    }

    /// `test-template <template> [option=value ...]`
    ///
    /// Missing directories, a failed preflight and invalid overrides are
    /// reported before any log file is created.
    pub async fn test_template(
        &self,
        template: &str,
        overrides: &[(String, String)],
    ) -> RunnerResult<TestOutcome> {
        self.check_directories(template)?;

        let mut combination = Combination::new(template);
        combination.options = overrides.to_vec();

        // Validate the overrides before touching the engine
        let descriptor = TemplateDescriptor::load(&self.config.template_dir(template))?;
        OptionAssignment::resolve(&descriptor, overrides)?;

        self.executor.preflight().await?;
        let logs = LogDir::create(self.config.log_path())?;

        println!("▶️  Testing {combination}");
        let outcome = self.run_one(&combination, &logs).await;
        report(&outcome);

        if outcome.passed {
            Ok(outcome)
        } else {
            Err(RunnerError::TestFailed {
                combination: combination.to_string(),
                reason: outcome.error.unwrap_or_else(|| "unknown error".to_string()),
                log: outcome.log.unwrap_or_else(|| logs.path().to_path_buf()),
            })
        }
    }
}

fn report(outcome: &TestOutcome) {
    let secs = outcome.duration.as_secs();
    if outcome.passed {
        println!("✅ {} passed ({}s)", outcome.combination, secs);
        info!(combination = %outcome.combination, duration_secs = secs, "Combination passed");
    } else {
        println!(
            "❌ {} failed ({}s): {}",
            outcome.combination,
            secs,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
        if let Some(log) = &outcome.log {
            println!("   log: {}", log.display());
        }
        warn!(
            combination = %outcome.combination,
            error = outcome.error.as_deref().unwrap_or(""),
            "Combination failed"
        );
    }
}

/// Sequential driver over the combination matrix
pub struct MatrixRunner<E> {
    tester: TemplateTester<E>,
    results: ResultsFile,
}

impl<E: TemplateExecutor> MatrixRunner<E> {
    pub fn new(config: HarnessConfig, executor: E) -> Self {
        let results = ResultsFile::new(config.results_path());
        Self {
            tester: TemplateTester::new(config, executor),
            results,
        }
    }

    pub fn tester(&self) -> &TemplateTester<E> {
        &self.tester
    }

    pub fn results(&self) -> &ResultsFile {
        &self.results
    }

    /// Directory, runtime and CLI checks; any failure aborts the whole run
    async fn preconditions(&self, templates: &[&str]) -> RunnerResult<LogDir> {
        for template in templates {
            self.tester.check_directories(template)?;
        }
        self.tester.executor.preflight().await?;
        Ok(LogDir::create(self.tester.config.log_path())?)
    }

    /// Run every combination selected by `filter`.
    ///
    /// The results file is reset first and then holds exactly the failures of this run.
    pub async fn run(&self, filter: MatrixFilter) -> RunnerResult<RunSummary> {
        let selected = combinations(filter);
        let logs = self.preconditions(&filter.templates()).await?;
        self.results.reset()?;

        info!(combinations = selected.len(), "Running template matrix");
        let summary = self
            .run_combinations(&selected, &logs, |failed| self.results.write(failed))
            .await?;
        Ok(summary)
    }

    /// Re-run the combinations listed in the results file.
    ///
    /// Entries that pass are dropped from the file, the others stay.
    pub async fn retry_failed(&self) -> RunnerResult<RunSummary> {
        let recorded = self.results.read()?;
        if recorded.is_empty() {
            let path = self.results.path().display();
            println!("No failed combinations recorded in {path}");
            return Ok(RunSummary::default());
        }

        let mut templates: Vec<&str> = Vec::new();
        for combination in &recorded {
            if !templates.contains(&combination.template.as_str()) {
                templates.push(&combination.template);
            }
        }
        let logs = self.preconditions(&templates).await?;

        info!(count = recorded.len(), "Retrying failed combinations");
        let summary = self.run_combinations(&recorded, &logs, |_| Ok(())).await?;
        self.results.write(&summary.failed())?;
        Ok(summary)
    }

    async fn run_combinations<F>(
        &self,
        selected: &[Combination],
        logs: &LogDir,
        mut on_failure: F,
    ) -> RunnerResult<RunSummary>
    where
        F: FnMut(&[Combination]) -> Result<(), ResultsError>,
    {
        let mut summary = RunSummary::default();
        let total = selected.len();

        for (index, combination) in selected.iter().enumerate() {
            println!("\n▶️  [{}/{}] {}", index + 1, total, combination);
            let outcome = self.tester.run_one(combination, logs).await;
            report(&outcome);

            let failed = !outcome.passed;
            summary.outcomes.push(outcome);
            if failed {
                on_failure(&summary.failed())?;
            }
        }

        Ok(summary)
    }
}
