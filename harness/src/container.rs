use crate::config::RuntimePreference;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, warn};

/// Container runtime types supported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    /// Podman container runtime
    Podman,
    /// Docker container runtime
    Docker,
    /// No container runtime available
    None,
}

impl ContainerRuntime {
    /// Get the command name for this runtime
    pub fn command(&self) -> &'static str {
        match self {
            ContainerRuntime::Podman => "podman",
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::None => "",
        }
    }

    /// Check if this runtime is available
    pub fn is_available(&self) -> bool {
        matches!(self, ContainerRuntime::Podman | ContainerRuntime::Docker)
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerRuntime::None => write!(f, "none"),
            runtime => write!(f, "{}", runtime.command()),
        }
    }
}

/// Container operation errors
#[derive(Error, Debug)]
pub enum ContainerError {
    /// No container runtime is available
    #[error("No container runtime available. Install Podman or Docker to test the templates.")]
    NoRuntimeAvailable,

    /// A specific runtime was requested but is not installed
    #[error("Requested container runtime '{runtime}' is not installed or not working")]
    RuntimeNotInstalled { runtime: ContainerRuntime },

    /// Container cleanup failed
    #[error("Failed to cleanup containers labeled '{label}': {reason}")]
    CleanupFailed { label: String, reason: String },

    /// Command execution failed
    #[error("Command execution failed: {command}")]
    CommandFailed { command: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn runtime_responds(runtime: ContainerRuntime) -> bool {
    Command::new(runtime.command())
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Detect available container runtime in order of preference
pub fn detect_runtime() -> ContainerRuntime {
    // Podman first, the templates are developed against it
    if runtime_responds(ContainerRuntime::Podman) {
        return ContainerRuntime::Podman;
    }

    if runtime_responds(ContainerRuntime::Docker) {
        return ContainerRuntime::Docker;
    }

    ContainerRuntime::None
}

/// Pick the runtime for a configured preference
pub fn resolve_runtime(preference: RuntimePreference) -> Result<ContainerRuntime, ContainerError> {
    let runtime = match preference {
        RuntimePreference::Auto => detect_runtime(),
        RuntimePreference::Podman => ContainerRuntime::Podman,
        RuntimePreference::Docker => ContainerRuntime::Docker,
    };

    if !runtime.is_available() {
        return Err(ContainerError::NoRuntimeAvailable);
    }

    if preference != RuntimePreference::Auto && !runtime_responds(runtime) {
        return Err(ContainerError::RuntimeNotInstalled { runtime });
    }

    debug!(runtime = %runtime, "Using container runtime");
    Ok(runtime)
}

/// Containers started by the Dev Container CLI under one id label.
///
/// The label is what `devcontainer up --id-label` attaches, so every
/// container of one template instance can be found and removed together.
#[derive(Debug)]
pub struct LabeledContainers {
    /// `key=value` label passed to `--id-label`
    pub label: String,
    /// Runtime used
    pub runtime: ContainerRuntime,
    /// Whether the containers still need cleanup
    pub needs_cleanup: bool,
}

impl LabeledContainers {
    pub fn new(runtime: ContainerRuntime, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            runtime,
            needs_cleanup: true,
        }
    }

    /// Leave the containers running when this handle is dropped
    pub fn keep(&mut self) {
        self.needs_cleanup = false;
    }

    /// Ids of the containers currently carrying the label
    pub fn list(&self) -> Result<Vec<String>, ContainerError> {
        if !self.runtime.is_available() {
            return Err(ContainerError::NoRuntimeAvailable);
        }

        let filter = format!("label={}", self.label);
        let output = Command::new(self.runtime.command())
            .args(["ps", "-aq", "--filter", &filter])
            .output()?;

        if !output.status.success() {
            return Err(ContainerError::CommandFailed {
                command: format!("{} ps -aq --filter {}", self.runtime.command(), filter),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Remove every labeled container. Returns how many were removed.
    pub fn cleanup(&mut self) -> Result<usize, ContainerError> {
        if !self.runtime.is_available() {
            self.needs_cleanup = false;
            return Ok(0); // Nothing to clean up
        }

        let ids = self.list()?;
        if ids.is_empty() {
            self.needs_cleanup = false;
            return Ok(0);
        }

        let output = Command::new(self.runtime.command())
            .args(["rm", "-f"])
            .args(&ids)
            .output()
            .map_err(|e| ContainerError::CleanupFailed {
                label: self.label.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ContainerError::CleanupFailed {
                label: self.label.clone(),
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        self.needs_cleanup = false;
        Ok(ids.len())
    }
}

impl Drop for LabeledContainers {
    fn drop(&mut self) {
        if self.needs_cleanup && self.runtime.is_available() {
            if let Err(e) = self.cleanup() {
                warn!(label = %self.label, error = %e, "Container cleanup on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_runtime_command() {
        assert_eq!(ContainerRuntime::Podman.command(), "podman");
        assert_eq!(ContainerRuntime::Docker.command(), "docker");
        assert_eq!(ContainerRuntime::None.command(), "");
    }

    #[test]
    fn test_container_runtime_availability() {
        assert!(ContainerRuntime::Podman.is_available());
        assert!(ContainerRuntime::Docker.is_available());
        assert!(!ContainerRuntime::None.is_available());
    }

    #[test]
    fn test_runtime_display() {
        assert_eq!(ContainerRuntime::Podman.to_string(), "podman");
        assert_eq!(ContainerRuntime::None.to_string(), "none");
    }

    #[test]
    fn test_detect_runtime() {
        let runtime = detect_runtime();
        // We can't predict what will be available in test environment
        match runtime {
            ContainerRuntime::Podman | ContainerRuntime::Docker | ContainerRuntime::None => {}
        }
    }

    #[test]
    fn test_container_error_display() {
        let error = ContainerError::NoRuntimeAvailable;
        assert!(error.to_string().contains("No container runtime available"));

        let error = ContainerError::RuntimeNotInstalled {
            runtime: ContainerRuntime::Docker,
        };
        assert!(error.to_string().contains("'docker'"));
    }

    #[test]
    fn test_spawn_failure_keeps_io_error() {
        let error: ContainerError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "podman: not found").into();
        assert!(matches!(
            error,
            ContainerError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound
        ));
        assert!(error.to_string().contains("podman: not found"));
    }

    #[test]
    fn test_cleanup_without_runtime() {
        let mut containers =
            LabeledContainers::new(ContainerRuntime::None, "test-container=fedora");
        assert_eq!(containers.cleanup().unwrap(), 0);
        assert!(!containers.needs_cleanup);
    }

    #[test]
    fn test_list_without_runtime() {
        let containers = LabeledContainers::new(ContainerRuntime::None, "test-container=fedora");
        assert!(matches!(containers.list(), Err(ContainerError::NoRuntimeAvailable)));
    }

    #[test]
    fn test_keep_disables_cleanup() {
        let mut containers = LabeledContainers::new(ContainerRuntime::Podman, "test-container=ubi");
        assert!(containers.needs_cleanup);
        containers.keep();
        assert!(!containers.needs_cleanup);
    }
}
