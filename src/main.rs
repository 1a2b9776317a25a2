//! content-export CLI - runs one export with settings from JSON files.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::Parser;
use content_export::{Config, Exporter, GraphQlSource};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "content-export")]
#[command(version)]
#[command(about = "Export content items from a GraphQL content API into a local file tree")]
struct Cli {
    /// Base settings file
    #[arg(short, long, default_value = "appsettings.json")]
    config: PathBuf,

    /// Local overlay with secrets; ignored if it does not exist
    #[arg(short, long, default_value = "appsettings.local.json")]
    local: PathBuf,

    /// Only export these node type aliases (repeatable)
    #[arg(short = 't', long = "node-type")]
    node_types: Vec<String>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,content_export=debug".into())
}

/// Console output plus, when enabled, a plain-text log file for the run
fn init_logging(config: &Config) -> Result<Option<PathBuf>> {
    let console = tracing_subscriber::fmt::layer().with_filter(env_filter());

    if !config.log.file_enabled {
        tracing_subscriber::registry().with(console).init();
        return Ok(None);
    }

    let path = config.log_file_path(&chrono::Local::now());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();
    Ok(Some(path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config, Some(&cli.local))
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let log_file = init_logging(&config)?;
    if let Some(log_file) = &log_file {
        tracing::info!(path = %log_file.display(), "Writing run log");
    }

    if !cli.node_types.is_empty() {
        for alias in &cli.node_types {
            if !config.export.queries.contains_key(alias) {
                bail!("Unknown node type '{}'", alias);
            }
        }
        config
            .export
            .queries
            .retain(|alias, _| cli.node_types.contains(alias));
    }

    tracing::info!(
        endpoint = %config.graphql_endpoint()?,
        node_types = config.export.queries.len(),
        batch_size = config.export.batch_size,
        parallel_tasks = config.export.parallel_tasks,
        "Starting export"
    );

    let source = GraphQlSource::new(&config).context("Failed to create content source")?;
    let exporter = Exporter::new(Arc::new(source), config.export.clone());
    let summary = exporter.run().await;

    if summary.items_failed > 0 {
        tracing::warn!(failed = summary.items_failed, "Some items could not be exported");
    }

    Ok(())
}
