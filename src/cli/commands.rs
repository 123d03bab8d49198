//! CLI command definitions for mlforge.
//!
//! Every command loads the project document from the working directory,
//! applies one registry operation, and saves the document back (mutating
//! commands only). Network commands build the engine client from
//! environment configuration.

use clap::Parser;
use indexmap::IndexMap;
use std::path::Path;
use tracing::info;

use crate::config::EngineConfig;
use crate::project::{Function, FunctionKind, Project};
use crate::submit::EngineClient;

/// Default branch for git synchronization.
const DEFAULT_BRANCH: &str = "main";

/// Pipeline project registry with git-backed persistence and remote submission.
#[derive(Parser)]
#[command(name = "mlforge")]
#[command(about = "Manage pipeline projects: functions, workflows, git sync, submission")]
#[command(version)]
#[command(
    long_about = "mlforge keeps a project's function and workflow definitions in a canonical\nproject.yaml, synchronizes them through git, and submits workflows to a\nremote pipeline-execution engine.\n\nExample usage:\n  mlforge init new-project --git\n  mlforge fn tstfunc --command handler.py\n  mlforge workflow main workflow.py\n  mlforge run main -p p1=3 --artifact-path output/path"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Project working directory.
    #[arg(short = 'C', long, default_value = ".", global = true)]
    pub dir: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new empty project in the working directory.
    Init(InitArgs),

    /// Register or replace a function definition.
    #[command(name = "fn")]
    Function(FunctionArgs),

    /// Register or replace a workflow referencing a pipeline file.
    Workflow(WorkflowArgs),

    /// Print the canonical project document.
    Show,

    /// Associate a remote repository URL with the project.
    Remote(RemoteArgs),

    /// Fetch and merge remote content into the working directory.
    Pull(PullArgs),

    /// Commit and push the project document plus any extra files.
    Push(PushArgs),

    /// Submit a registered workflow to the execution engine.
    Run(RunArgs),

    /// Submit a function spec to the engine's remote image builder.
    Deploy(DeployArgs),
}

/// Arguments for `mlforge init`.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Project name (unique, immutable after creation).
    pub name: String,

    /// Also initialize a git working tree in the directory.
    #[arg(long)]
    pub git: bool,

    /// Record a source reference (git URL + ref, or local path).
    #[arg(long)]
    pub source: Option<String>,
}

/// Arguments for `mlforge fn`.
#[derive(Parser, Debug)]
pub struct FunctionArgs {
    /// Function name within the project.
    pub name: String,

    /// Command or handler reference executed by the runtime.
    #[arg(long, conflicts_with = "url")]
    pub command: Option<String>,

    /// Fetch the function definition from a remote YAML descriptor instead.
    #[arg(long)]
    pub url: Option<String>,

    /// Function kind: job, serving, or other.
    #[arg(long, default_value = "job")]
    pub kind: String,

    /// Container image to run (may be set later by a build).
    #[arg(long)]
    pub image: Option<String>,

    /// Base image for the external builder.
    #[arg(long)]
    pub base_image: Option<String>,

    /// Build command, repeatable (e.g. --build-command "pip install pandas").
    #[arg(long = "build-command")]
    pub build_commands: Vec<String>,

    /// Source file to embed inline (base64) into the build spec.
    #[arg(long)]
    pub code_file: Option<String>,

    /// Environment override as key=value, repeatable.
    #[arg(short, long = "env")]
    pub env: Vec<String>,
}

/// Arguments for `mlforge workflow`.
#[derive(Parser, Debug)]
pub struct WorkflowArgs {
    /// Workflow name within the project.
    pub name: String,

    /// Pipeline definition file, relative to the project root.
    pub file: String,
}

/// Arguments for `mlforge remote`.
#[derive(Parser, Debug)]
pub struct RemoteArgs {
    /// Remote repository URL.
    pub url: String,
}

/// Arguments for `mlforge pull`.
#[derive(Parser, Debug)]
pub struct PullArgs {
    /// Branch to pull.
    #[arg(short, long, default_value = DEFAULT_BRANCH)]
    pub branch: String,
}

/// Arguments for `mlforge push`.
#[derive(Parser, Debug)]
pub struct PushArgs {
    /// Branch to push to.
    #[arg(short, long, default_value = DEFAULT_BRANCH)]
    pub branch: String,

    /// Commit message.
    #[arg(short, long, default_value = "Update project")]
    pub message: String,

    /// Extra files to stage alongside project.yaml.
    pub files: Vec<String>,
}

/// Arguments for `mlforge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Registered workflow name.
    pub workflow: String,

    /// Runtime argument as key=value, repeatable. Values parse as JSON
    /// scalars where possible, otherwise as strings.
    #[arg(short = 'p', long = "param")]
    pub params: Vec<String>,

    /// Target path for run artifacts.
    #[arg(long, default_value = "")]
    pub artifact_path: String,

    /// Engine base URL (overrides MLFORGE_ENGINE_URL).
    #[arg(long)]
    pub engine_url: Option<String>,
}

/// Arguments for `mlforge deploy`.
#[derive(Parser, Debug)]
pub struct DeployArgs {
    /// Registered function name.
    pub function: String,

    /// Engine base URL (overrides MLFORGE_ENGINE_URL).
    #[arg(long)]
    pub engine_url: Option<String>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Execute a parsed CLI invocation.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let dir = Path::new(&cli.dir);

    match cli.command {
        Commands::Init(args) => {
            let mut project = Project::create(&args.name, dir, args.git).await?;
            if let Some(source) = &args.source {
                project.set_source(source);
            }
            project.save()?;
            info!(name = %args.name, dir = %dir.display(), "project initialized");
        }

        Commands::Function(args) => {
            let mut project = Project::load(dir)?;
            let config = EngineConfig::from_env()?;

            if let Some(url) = &args.url {
                project
                    .set_function_from_url(&args.name, url, config.timeout)
                    .await?;
            } else {
                let function = build_function(&args)?;
                project.set_function(&args.name, function);
            }
            project.save()?;
            info!(name = %args.name, "function registered");
        }

        Commands::Workflow(args) => {
            let mut project = Project::load(dir)?;
            project.set_workflow(&args.name, &args.file);
            project.save()?;
            info!(name = %args.name, file = %args.file, "workflow registered");
        }

        Commands::Show => {
            let project = Project::load(dir)?;
            print!("{}", project.serialize()?);
        }

        Commands::Remote(args) => {
            let mut project = Project::load(dir)?;
            project.create_remote(&args.url).await?;
            project.save()?;
            info!(url = %args.url, "remote configured");
        }

        Commands::Pull(args) => {
            let project = Project::load(dir)?;
            project.pull(&args.branch).await?;
        }

        Commands::Push(args) => {
            let project = Project::load(dir)?;
            project.push(&args.branch, &args.message, &args.files).await?;
        }

        Commands::Run(args) => {
            let project = Project::load(dir)?;
            let backend = engine_client(args.engine_url.as_deref())?;
            let arguments = parse_params(&args.params)?;

            let run_id = project
                .run(&args.workflow, arguments, &args.artifact_path, &backend)
                .await?;
            println!("{}", run_id);
        }

        Commands::Deploy(args) => {
            let mut project = Project::load(dir)?;
            let backend = engine_client(args.engine_url.as_deref())?;

            let status = project.deploy_function(&args.function, &backend).await?;
            project.save()?;
            println!(
                "state: {}{}",
                status.state,
                status
                    .image
                    .map(|i| format!("\nimage: {}", i))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

/// Build an inline function definition from CLI arguments.
fn build_function(args: &FunctionArgs) -> anyhow::Result<Function> {
    let kind = match args.kind.as_str() {
        "job" => FunctionKind::Job,
        "serving" => FunctionKind::Serving,
        "other" => FunctionKind::Other,
        other => anyhow::bail!("unknown function kind '{}' (expected job, serving, other)", other),
    };

    let command = args.command.as_deref().unwrap_or_default();
    let mut function = Function::new(kind, command);

    if let Some(file) = &args.code_file {
        function = function.with_code_file(Path::new(file))?;
    }
    function.build_config(
        args.image.as_deref(),
        args.base_image.as_deref(),
        &args.build_commands,
    );
    for pair in &args.env {
        let (key, value) = split_kv(pair)?;
        function.set_env(key, value);
    }

    Ok(function)
}

/// Build the engine client from environment config plus an optional URL
/// override.
fn engine_client(url_override: Option<&str>) -> anyhow::Result<EngineClient> {
    let mut config = EngineConfig::from_env()?;
    if let Some(url) = url_override {
        config = config.with_base_url(url);
    }
    Ok(EngineClient::new(config)?)
}

/// Parse repeated key=value parameters into an argument mapping.
///
/// Values that parse as JSON scalars (numbers, booleans) keep their type;
/// anything else is passed through as a string.
fn parse_params(params: &[String]) -> anyhow::Result<IndexMap<String, serde_json::Value>> {
    let mut arguments = IndexMap::new();
    for pair in params {
        let (key, value) = split_kv(pair)?;
        let parsed = serde_json::from_str::<serde_json::Value>(value)
            .ok()
            .filter(|v| v.is_number() || v.is_boolean())
            .unwrap_or_else(|| serde_json::Value::String(value.to_string()));
        arguments.insert(key.to_string(), parsed);
    }
    Ok(arguments)
}

fn split_kv(pair: &str) -> anyhow::Result<(&str, &str)> {
    pair.split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected key=value, got '{}'", pair))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params_types() {
        let params = vec![
            "p1=3".to_string(),
            "flag=true".to_string(),
            "name=training".to_string(),
        ];
        let arguments = parse_params(&params).expect("params should parse");

        assert_eq!(arguments["p1"], serde_json::json!(3));
        assert_eq!(arguments["flag"], serde_json::json!(true));
        assert_eq!(arguments["name"], serde_json::json!("training"));
    }

    #[test]
    fn test_parse_params_rejects_bare_key() {
        let params = vec!["novalue".to_string()];
        assert!(parse_params(&params).is_err());
    }

    #[test]
    fn test_build_function_rejects_unknown_kind() {
        let args = FunctionArgs {
            name: "tstfunc".to_string(),
            command: Some("handler.py".to_string()),
            url: None,
            kind: "batch".to_string(),
            image: None,
            base_image: None,
            build_commands: vec![],
            code_file: None,
            env: vec![],
        };
        assert!(build_function(&args).is_err());
    }

    #[test]
    fn test_build_function_inline() {
        let args = FunctionArgs {
            name: "tstfunc".to_string(),
            command: Some("handler.py".to_string()),
            url: None,
            kind: "job".to_string(),
            image: None,
            base_image: Some("python:3.11".to_string()),
            build_commands: vec!["pip install pandas".to_string()],
            code_file: None,
            env: vec!["LOG_LEVEL=debug".to_string()],
        };
        let function = build_function(&args).expect("function should build");

        assert_eq!(function.kind, FunctionKind::Job);
        assert_eq!(function.command, "handler.py");
        assert_eq!(function.build.base_image.as_deref(), Some("python:3.11"));
        assert_eq!(function.env["LOG_LEVEL"], "debug");
    }
}
