//! Wrapper around the Dev Container CLI.
//!
//! The harness never builds or runs containers itself. It hands the
//! materialized workspace to `devcontainer up`, runs the smoke test through
//! `devcontainer exec`, and removes whatever the CLI started by label.

use crate::config::{HarnessConfig, RuntimePreference};
use crate::container::{resolve_runtime, ContainerError, ContainerRuntime, LabeledContainers};
use crate::logs::TestLog;
use crate::runner::{TemplateExecutor, TemplateInstance};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Output;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Label key passed to `--id-label`, the value is the combination slug
pub const ID_LABEL_KEY: &str = "test-container";

/// Directory inside the workspace that receives `test/<template>`
pub const TEST_PROJECT_DIR: &str = "test-project";

#[derive(Error, Debug)]
pub enum DevcontainerError {
    #[error("Dev Container CLI '{command}' not found (npm install -g @devcontainers/cli)")]
    CliNotFound { command: String },

    #[error("'{command}' failed with {status}")]
    CommandFailed { command: String, status: String },

    #[error("Container runtime has not been resolved, run the preflight checks first")]
    RuntimeNotResolved,

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DevcontainerResult<T> = Result<T, DevcontainerError>;

/// How to invoke the Dev Container CLI
#[derive(Debug, Clone)]
pub struct DevcontainerCli {
    program: String,
    /// Leading arguments, e.g. `@devcontainers/cli` when running through `npx`
    base_args: Vec<String>,
}

impl DevcontainerCli {
    /// `command` may carry leading arguments separated by whitespace
    pub fn new(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "devcontainer".to_string());
        Self {
            program,
            base_args: parts.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn runtime_args(runtime: ContainerRuntime) -> Vec<String> {
        match runtime {
            ContainerRuntime::Podman => vec!["--docker-path".to_string(), "podman".to_string()],
            _ => Vec::new(),
        }
    }

    /// Arguments of `devcontainer up` for a workspace
    pub fn up_args(
        &self,
        runtime: ContainerRuntime,
        workspace: &Path,
        label: &str,
    ) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            "up".to_string(),
            "--workspace-folder".to_string(),
            workspace.display().to_string(),
            "--id-label".to_string(),
            label.to_string(),
            "--remove-existing-container".to_string(),
        ]);
        args.extend(Self::runtime_args(runtime));
        args
    }

    /// Arguments of `devcontainer exec` running `command` in the workspace container
    pub fn exec_args(
        &self,
        runtime: ContainerRuntime,
        workspace: &Path,
        label: &str,
        command: &[&str],
    ) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            "exec".to_string(),
            "--workspace-folder".to_string(),
            workspace.display().to_string(),
            "--id-label".to_string(),
            label.to_string(),
        ]);
        args.extend(Self::runtime_args(runtime));
        args.extend(command.iter().map(|s| s.to_string()));
        args
    }

    /// Printable command line for logs
    pub fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().map(|a| a.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn run(&self, args: &[String]) -> DevcontainerResult<Output> {
        debug!(command = %self.command_line(args), "Running Dev Container CLI");
        Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => DevcontainerError::CliNotFound {
                    command: self.program.clone(),
                },
                _ => DevcontainerError::Io(e),
            })
    }

    /// Verify the CLI runs and return its version
    pub async fn check_available(&self) -> DevcontainerResult<String> {
        let mut args = self.base_args.clone();
        args.push("--version".to_string());
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(DevcontainerError::CliNotFound {
                command: self.command_line(&self.base_args),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn up(
        &self,
        runtime: ContainerRuntime,
        workspace: &Path,
        label: &str,
    ) -> DevcontainerResult<(String, Output)> {
        let args = self.up_args(runtime, workspace, label);
        let output = self.run(&args).await?;
        Ok((self.command_line(&args), output))
    }

    pub async fn exec(
        &self,
        runtime: ContainerRuntime,
        workspace: &Path,
        label: &str,
        command: &[&str],
    ) -> DevcontainerResult<(String, Output)> {
        let args = self.exec_args(runtime, workspace, label, command);
        let output = self.run(&args).await?;
        Ok((self.command_line(&args), output))
    }
}

/// Shell snippet run inside the container to execute the smoke test
pub fn smoke_test_command() -> [&'static str; 3] {
    [
        "/bin/sh",
        "-c",
        "set -e; cd test-project && chmod +x test.sh && ./test.sh",
    ]
}

fn status_text(output: &Output) -> String {
    match output.status.code() {
        Some(code) => format!("exit status {code}"),
        None => "termination by signal".to_string(),
    }
}

/// Production executor: `devcontainer up`, smoke test via `exec`, cleanup
pub struct DevcontainerExecutor {
    cli: DevcontainerCli,
    preference: RuntimePreference,
    keep_containers: bool,
    runtime: OnceLock<ContainerRuntime>,
}

impl DevcontainerExecutor {
    pub fn new(cli: DevcontainerCli, preference: RuntimePreference) -> Self {
        Self {
            cli,
            preference,
            keep_containers: false,
            runtime: OnceLock::new(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        let cli = DevcontainerCli::new(&config.devcontainer_cli);
        Self::new(cli, config.runtime).with_keep_containers(config.keep_containers)
    }

    pub fn with_keep_containers(mut self, keep: bool) -> Self {
        self.keep_containers = keep;
        self
    }

    fn runtime(&self) -> DevcontainerResult<ContainerRuntime> {
        self.runtime
            .get()
            .copied()
            .ok_or(DevcontainerError::RuntimeNotResolved)
    }
}

#[async_trait]
impl TemplateExecutor for DevcontainerExecutor {
    async fn preflight(&self) -> DevcontainerResult<()> {
        let runtime = resolve_runtime(self.preference)?;
        let version = self.cli.check_available().await?;
        let _ = self.runtime.set(runtime);
        info!(runtime = %runtime, cli_version = %version, "Preflight checks passed");
        println!("🔧 Using {} with Dev Container CLI {}", runtime, version);
        Ok(())
    }

    async fn execute(
        &self,
        instance: &TemplateInstance,
        log: &mut TestLog,
    ) -> DevcontainerResult<()> {
        let runtime = self.runtime()?;
        let label = format!("{ID_LABEL_KEY}={}", instance.combination.slug());
        let workspace = instance.workspace.as_path();

        // Leftovers of an interrupted run share the label
        if let Err(e) = LabeledContainers::new(runtime, &label).cleanup() {
            warn!(label = %label, error = %e, "Could not remove leftover containers");
        }
        let mut containers = LabeledContainers::new(runtime, &label);
        if self.keep_containers {
            containers.keep();
        }

        log.section("devcontainer up")?;
        let (command, output) = self.cli.up(runtime, workspace, &label).await?;
        log.command_output(&command, &output)?;
        if !output.status.success() {
            return Err(DevcontainerError::CommandFailed {
                command: "devcontainer up".to_string(),
                status: status_text(&output),
            });
        }

        log.section("smoke test")?;
        let (command, output) = self
            .cli
            .exec(runtime, workspace, &label, &smoke_test_command())
            .await?;
        log.command_output(&command, &output)?;
        if !output.status.success() {
            return Err(DevcontainerError::CommandFailed {
                command: "devcontainer exec test.sh".to_string(),
                status: status_text(&output),
            });
        }

        if self.keep_containers {
            log.line(&format!("keeping containers labeled {label}"))?;
            return Ok(());
        }

        log.section("cleanup")?;
        match containers.cleanup() {
            Ok(removed) => log.line(&format!("removed {removed} container(s)"))?,
            Err(e) => {
                warn!(label = %label, error = %e, "Container cleanup failed");
                log.line(&format!("cleanup failed: {e}"))?;
            }
        }
        Ok(())
    }
}
