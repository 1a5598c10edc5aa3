//! mfctl - Managed fields CLI tool
//!
//! Replays scripted apply/update/get/delete steps against an in-memory store
//! and inspects the field sets payloads claim.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use managed_fields::value::{self, Value};
use managed_fields::{
    ApplyCoordinator, ApplyRequest, CoordinatorConfig, CoordinatorError, InMemoryStore, UpdateRequest,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mfctl", version, about = "Managed fields CLI tool")]
struct Cli {
    /// Coordinator configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output location. Use '-' for stdout
    #[arg(short, long, global = true, default_value = "-")]
    output: String,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a script of steps against a fresh in-memory store
    Run { script: PathBuf },
    /// Print the field paths a YAML/JSON payload claims
    Fieldset {
        file: PathBuf,
        /// Print the fieldsV1 JSON form instead
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Script {
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Step {
    Apply(ApplyRequest),
    Update(UpdateRequest),
    Get { key: String },
    Delete { key: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => CoordinatorConfig::from_file(path)?,
        None => CoordinatorConfig::default(),
    };

    let mut output: Box<dyn Write> = if cli.output == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(
            fs::File::create(&cli.output)
                .map_err(|e| format!("Failed to create output file {:?}: {}", cli.output, e))?,
        )
    };

    match cli.command {
        Command::Run { script } => run_script(config, &script, &mut output).await?,
        Command::Fieldset { file, json } => fieldset(&config, &file, json, &mut output)?,
    }

    output.flush()?;
    Ok(())
}

async fn run_script(
    config: CoordinatorConfig,
    path: &Path,
    output: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read script {:?}: {}", path, e))?;
    let script: Script =
        serde_yaml::from_str(&content).map_err(|e| format!("Failed to parse script: {}", e))?;

    let coordinator = ApplyCoordinator::new(InMemoryStore::new(), config)?;
    let cancel = CancellationToken::new();

    for (n, step) in script.steps.into_iter().enumerate() {
        let step_no = n + 1;
        let (label, result) = match step {
            Step::Apply(request) => {
                let label = format!(
                    "apply {} by {}{}",
                    request.key,
                    request.manager,
                    if request.force { " (force)" } else { "" }
                );
                (label, coordinator.apply(&request, &cancel).await.map(Some))
            }
            Step::Update(request) => {
                let label = format!("update {} by {}", request.key, request.manager);
                (label, coordinator.update(&request, &cancel).await.map(Some))
            }
            Step::Get { key } => {
                let label = format!("get {}", key);
                (label, coordinator.get(&key, &cancel).await.map(Some))
            }
            Step::Delete { key } => {
                let label = format!("delete {}", key);
                (label, coordinator.delete(&key, &cancel).await.map(|_| None))
            }
        };

        writeln!(output, "# step {}: {}", step_no, label)?;
        match result {
            Ok(Some(object)) => {
                write!(output, "{}", serde_yaml::to_string(&object)?)?;
            }
            Ok(None) => writeln!(output, "deleted: true")?,
            Err(CoordinatorError::Conflict(conflicts)) => {
                error!(step = step_no, "{}", conflicts);
                writeln!(output, "conflicts:")?;
                for conflict in conflicts.iter() {
                    writeln!(output, "- owner: {}\n  path: '{}'", conflict.owner, conflict.path)?;
                }
            }
            Err(e) => return Err(format!("step {} ({}) failed: {}", step_no, label, e).into()),
        }
    }

    info!("script finished");
    Ok(())
}

fn fieldset(
    config: &CoordinatorConfig,
    file: &Path,
    json: bool,
    output: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let content =
        fs::read_to_string(file).map_err(|e| format!("Failed to read file {:?}: {}", file, e))?;
    let payload: Value =
        value::from_yaml(&content).map_err(|e| format!("Failed to parse file: {}", e))?;

    let set = config
        .structure()
        .to_field_set(&payload)
        .map_err(|e| format!("Failed to build fieldset: {}", e))?;

    if json {
        writeln!(output, "{}", String::from_utf8(set.to_json()?)?)?;
        return Ok(());
    }

    writeln!(output, "Fields:")?;
    for path in set.paths() {
        writeln!(output, "  {}", path)?;
    }
    Ok(())
}
