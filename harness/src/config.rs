use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Optional configuration file looked up at the repository root
pub const CONFIG_FILE: &str = "harness.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which container engine the Dev Container CLI should drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimePreference {
    /// Podman if installed, Docker otherwise
    #[default]
    Auto,
    Podman,
    Docker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Repository root holding `src/<template>` and `test/<template>`
    pub repo_root: PathBuf,
    /// Scratch directory for materialized template instances
    pub work_dir: PathBuf,
    /// Per-test transcripts, relative to `repo_root` unless absolute
    pub log_dir: PathBuf,
    /// Failed combinations, relative to `repo_root` unless absolute
    pub results_file: PathBuf,
    /// Dev Container CLI executable
    pub devcontainer_cli: String,
    pub runtime: RuntimePreference,
    /// Leave containers running after a test for debugging
    pub keep_containers: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            work_dir: std::env::temp_dir().join("devcontainer-template-tests"),
            log_dir: PathBuf::from(".test-logs"),
            results_file: PathBuf::from(".test-results.txt"),
            devcontainer_cli: "devcontainer".to_string(),
            runtime: RuntimePreference::Auto,
            keep_containers: false,
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `<repo_root>/harness.toml` if present, defaults otherwise.
    ///
    /// `repo_root` always wins over a root set in the file.
    pub fn load_or_default(repo_root: &Path) -> Result<Self, ConfigError> {
        let path = repo_root.join(CONFIG_FILE);
        let config = if path.is_file() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        Ok(config.with_repo_root(repo_root))
    }

    pub fn with_repo_root(mut self, repo_root: impl Into<PathBuf>) -> Self {
        self.repo_root = repo_root.into();
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn with_results_file(mut self, results_file: impl Into<PathBuf>) -> Self {
        self.results_file = results_file.into();
        self
    }

    pub fn with_devcontainer_cli(mut self, cli: impl Into<String>) -> Self {
        self.devcontainer_cli = cli.into();
        self
    }

    pub fn with_runtime(mut self, runtime: RuntimePreference) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_keep_containers(mut self, keep: bool) -> Self {
        self.keep_containers = keep;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.repo_root.as_os_str().is_empty() {
            return Err("Repository root cannot be empty".to_string());
        }

        if self.work_dir.as_os_str().is_empty() {
            return Err("Work directory cannot be empty".to_string());
        }

        if self.log_dir.as_os_str().is_empty() {
            return Err("Log directory cannot be empty".to_string());
        }

        if self.results_file.as_os_str().is_empty() {
            return Err("Results file cannot be empty".to_string());
        }

        if self.devcontainer_cli.trim().is_empty() {
            return Err("Dev Container CLI command cannot be empty".to_string());
        }

        Ok(())
    }

    pub fn template_dir(&self, template: &str) -> PathBuf {
        self.repo_root.join("src").join(template)
    }

    pub fn test_dir(&self, template: &str) -> PathBuf {
        self.repo_root.join("test").join(template)
    }

    /// Shared helpers copied next to every test project
    pub fn test_utils_dir(&self) -> PathBuf {
        self.repo_root.join("test").join("test-utils")
    }

    pub fn log_path(&self) -> PathBuf {
        self.repo_root.join(&self.log_dir)
    }

    pub fn results_path(&self) -> PathBuf {
        self.repo_root.join(&self.results_file)
    }

    /// Scratch directory of one template instance
    pub fn instance_dir(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.log_dir, PathBuf::from(".test-logs"));
        assert_eq!(config.results_file, PathBuf::from(".test-results.txt"));
        assert_eq!(config.devcontainer_cli, "devcontainer");
        assert_eq!(config.runtime, RuntimePreference::Auto);
        assert!(!config.keep_containers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = HarnessConfig::new()
            .with_repo_root("/repo")
            .with_work_dir("/scratch")
            .with_devcontainer_cli("npx @devcontainers/cli")
            .with_runtime(RuntimePreference::Docker)
            .with_keep_containers(true);

        assert_eq!(config.template_dir("ubi"), PathBuf::from("/repo/src/ubi"));
        assert_eq!(config.test_dir("ubi"), PathBuf::from("/repo/test/ubi"));
        assert_eq!(
            config.test_utils_dir(),
            PathBuf::from("/repo/test/test-utils")
        );
        assert_eq!(config.log_path(), PathBuf::from("/repo/.test-logs"));
        assert_eq!(
            config.results_path(),
            PathBuf::from("/repo/.test-results.txt")
        );
        assert_eq!(
            config.instance_dir("ubi-9"),
            PathBuf::from("/scratch/ubi-9")
        );
        assert_eq!(config.runtime, RuntimePreference::Docker);
        assert!(config.keep_containers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let config = HarnessConfig::new()
            .with_repo_root("/repo")
            .with_log_dir("/var/log/templates")
            .with_results_file("/tmp/results.txt");
        assert_eq!(config.log_path(), PathBuf::from("/var/log/templates"));
        assert_eq!(config.results_path(), PathBuf::from("/tmp/results.txt"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = HarnessConfig::default();

        config.devcontainer_cli = " ".to_string();
        assert!(config.validate().is_err());

        config.devcontainer_cli = "devcontainer".to_string();
        config.log_dir = PathBuf::new();
        assert!(config.validate().is_err());

        config.log_dir = PathBuf::from(".test-logs");
        config.results_file = PathBuf::new();
        assert!(config.validate().is_err());

        config.results_file = PathBuf::from(".test-results.txt");
        config.repo_root = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "runtime = \"podman\"\nkeep_containers = true\nlog_dir = \"logs\"\n",
        )
        .unwrap();

        let config = HarnessConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.runtime, RuntimePreference::Podman);
        assert!(config.keep_containers);
        assert_eq!(config.log_path(), dir.path().join("logs"));
        assert_eq!(config.devcontainer_cli, "devcontainer");
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.repo_root, dir.path());
        assert_eq!(config.runtime, RuntimePreference::Auto);
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "runtime = \"lxc\"\n").unwrap();
        assert!(matches!(HarnessConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_serialization() {
        let config = HarnessConfig::default().with_runtime(RuntimePreference::Podman);
        let text = toml::to_string(&config).unwrap();
        let parsed: HarnessConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.runtime, RuntimePreference::Podman);
        assert_eq!(parsed.devcontainer_cli, config.devcontainer_cli);
    }
}
