mod cli;

use std::sync::Arc;

use boardpack::config::Config;
use boardpack::job::{FjallJobStore, JobFields, JobStore};
use boardpack::observability;
use boardpack::Orchestrator;
use clap::Parser;
use cli::{Cli, Commands, RunArgs, SubmitArgs};
use serde_json::Value;
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    observability::init_tracing();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run(args) => run(config, args).await?,
        Commands::Submit(args) => submit(config, args).await?,
    }

    Ok(())
}

async fn run(config: Config, args: RunArgs) -> Result<(), AnyError> {
    let store = Arc::new(FjallJobStore::open(&config.store.path)?);
    let orchestrator = Orchestrator::new(config, store)?;

    let report = orchestrator.run(&args.uifn).await?;
    info!(
        uifn = %report.uifn,
        archive = %report.archive.path.display(),
        size = report.archive.size,
        entries = report.archive.entries,
        callback = ?report.callback,
        "Job complete"
    );
    Ok(())
}

async fn submit(config: Config, args: SubmitArgs) -> Result<(), AnyError> {
    let raw = tokio::fs::read_to_string(&args.file).await?;
    let fields = to_fields(serde_json::from_str(&raw)?)?;

    let store = FjallJobStore::open(&config.store.path)?;
    store.put(&args.uifn, fields).await?;
    info!(uifn = %args.uifn, "Job staged");
    Ok(())
}

/// Flatten a JSON object into string fields; nested values keep their JSON text
fn to_fields(value: Value) -> Result<JobFields, AnyError> {
    let Value::Object(object) = value else {
        return Err("job file must contain a JSON object".into());
    };

    Ok(object
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}
