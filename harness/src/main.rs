use clap::{Args, Parser, Subcommand};
use harness::{
    combinations, ConfigError, DevcontainerExecutor, HarnessConfig, MatrixFilter, MatrixRunner,
    RuntimePreference, TemplateTester,
};
use std::path::{Path, PathBuf};
use template::{
    apply_derived_options, materialize, parse_override, OptionAssignment, TemplateDescriptor,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Build and smoke-test the Dev Container templates")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Repository root containing src/ and test/
    #[arg(long, global = true, default_value = ".")]
    repo_root: PathBuf,
    /// Config file (defaults to <repo-root>/harness.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Container runtime to drive
    #[arg(long, global = true, value_enum)]
    runtime: Option<RuntimePreference>,
    /// Dev Container CLI command, e.g. "npx @devcontainers/cli"
    #[arg(long, global = true)]
    devcontainer_cli: Option<String>,
    /// Scratch directory for template instances
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,
    /// Leave containers running after each test
    #[arg(long, global = true)]
    keep_containers: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and test one template, optionally overriding options
    TestTemplate {
        /// Template id (directory under src/)
        template: String,
        /// Option overrides as key=value
        options: Vec<String>,
    },
    /// Run the full combination matrix
    TestAll {
        #[arg(long)]
        skip_fedora: bool,
        #[arg(long)]
        skip_ubi: bool,
        #[arg(long)]
        skip_podman: bool,
        /// Only re-run the combinations recorded in the results file
        #[arg(long, conflicts_with_all = ["skip_fedora", "skip_ubi", "skip_podman"])]
        only_failed: bool,
    },
    /// Write a template instance without running it
    Materialize {
        /// Template id (directory under src/)
        template: String,
        /// Option overrides as key=value
        options: Vec<String>,
        /// Destination directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the combination matrix
    List {
        /// Emit JSON instead of results-file lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli.global)?;

    match cli.command {
        Commands::TestTemplate { template, options } => {
            let overrides = parse_overrides(&options)?;
            let executor = DevcontainerExecutor::from_config(&config);
            let tester = TemplateTester::new(config, executor);
            tester.test_template(&template, &overrides).await?;
        }
        Commands::TestAll {
            skip_fedora,
            skip_ubi,
            skip_podman,
            only_failed,
        } => {
            let filter = MatrixFilter {
                skip_fedora,
                skip_ubi,
                skip_podman,
            };
            run_matrix(config, filter, only_failed).await?;
        }
        Commands::Materialize {
            template,
            options,
            output,
        } => {
            materialize_template(&config, &template, &options, &output)?;
        }
        Commands::List { json } => {
            list_combinations(json)?;
        }
    }

    Ok(())
}

fn build_config(args: &GlobalArgs) -> Result<HarnessConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)?.with_repo_root(&args.repo_root),
        None => HarnessConfig::load_or_default(&args.repo_root)?,
    };

    if let Some(runtime) = args.runtime {
        config = config.with_runtime(runtime);
    }
    if let Some(cli) = &args.devcontainer_cli {
        config = config.with_devcontainer_cli(cli.as_str());
    }
    if let Some(work_dir) = &args.work_dir {
        config = config.with_work_dir(work_dir);
    }
    if args.keep_containers {
        config = config.with_keep_containers(true);
    }

    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

fn parse_overrides(tokens: &[String]) -> Result<Vec<(String, String)>, template::TemplateError> {
    tokens
        .iter()
        .map(String::as_str)
        .map(parse_override)
        .collect()
}

async fn run_matrix(
    config: HarnessConfig,
    filter: MatrixFilter,
    only_failed: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let executor = DevcontainerExecutor::from_config(&config);
    let runner = MatrixRunner::new(config, executor);

    let summary = if only_failed {
        runner.retry_failed().await?
    } else {
        runner.run(filter).await?
    };
    summary.print();

    if summary.is_success() {
        info!(total = summary.total(), "All combinations passed");
        Ok(())
    } else {
        let total = summary.total();
        let failed = total - summary.passed();
        error!(failed, total, "Template matrix failed");
        println!(
            "Failed combinations recorded in {}. Re-run them with --only-failed.",
            runner.results().path().display()
        );
        Err(format!("{failed} of {total} combinations failed").into())
    }
}

fn materialize_template(
    config: &HarnessConfig,
    template: &str,
    options: &[String],
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let overrides = parse_overrides(options)?;
    if output.exists() && output.read_dir()?.next().is_some() {
        let message = format!("{} already exists and is not empty", output.display());
        return Err(message.into());
    }
    let template_dir = config.template_dir(template);
    let descriptor = TemplateDescriptor::load(&template_dir)?;
    let mut assignment = OptionAssignment::resolve(&descriptor, &overrides)?;
    apply_derived_options(&descriptor.id, &mut assignment);

    let instance = materialize(&template_dir, output, &assignment)?;
    let root = instance.root.display();
    println!("✅ Materialized {} into {root}", descriptor.id);
    for (name, value) in assignment.iter() {
        println!("   {name}={value}");
    }
    Ok(())
}

fn list_combinations(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let all = combinations(MatrixFilter::default());
    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
    } else {
        for combination in &all {
            println!("{combination}");
        }
        println!("# {} combinations", all.len());
    }
    Ok(())
}
