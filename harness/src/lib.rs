pub mod config;
pub mod container;
pub mod devcontainer;
pub mod logs;
pub mod matrix;
pub mod results;
pub mod runner;

pub use config::{ConfigError, HarnessConfig, RuntimePreference, CONFIG_FILE};
pub use container::{
    detect_runtime, resolve_runtime, ContainerError, ContainerRuntime, LabeledContainers,
};
pub use devcontainer::{
    DevcontainerCli, DevcontainerError, DevcontainerExecutor, DevcontainerResult, ID_LABEL_KEY,
    TEST_PROJECT_DIR,
};
pub use logs::{LogDir, TestLog};
pub use matrix::{combinations, Combination, CombinationParseError, MatrixFilter};
pub use results::{ResultsError, ResultsFile};
pub use runner::{
    MatrixRunner, RunSummary, RunnerError, RunnerResult, TemplateExecutor, TemplateInstance,
    TemplateTester, TestOutcome,
};
