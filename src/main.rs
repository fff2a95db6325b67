use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use sms_import::app::{ExportUseCase, ImportEngine};
use sms_import::config::Config;
use sms_import::pipeline::ingestion::load_inputs;
use sms_import::storage::{Repository, SqliteRepository};
use sms_import::{logging, metrics, ImportReport};

#[derive(Parser)]
#[command(name = "sms_import")]
#[command(about = "Seattle Music Scene show import and reconciliation")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "import.toml")]
    config: PathBuf,

    /// Print the report as JSON instead of status lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what importing the given files would do, without writing
    Preview {
        /// Discovery JSON files, export documents, or directories of them
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Import the given files into the catalog
    Commit {
        /// Discovery JSON files, export documents, or directories of them
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Caller is an administrator: new venues are verified, new shows approved
        #[arg(long)]
        privileged: bool,
    },
    /// Write every catalog show as an export document
    Export {
        /// Output directory
        #[arg(long, default_value = "exports")]
        out: PathBuf,
    },
}

fn print_report(report: &ImportReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for entry in &report.per_record {
        println!("{}", entry.message);
        for warning in &entry.warnings {
            println!("    warning: {}", warning);
        }
    }
    let s = &report.summary;
    println!();
    println!("Summary ({}):", report.mode);
    println!("   Total: {}", s.total);
    println!("   Imported: {}", s.imported);
    println!("   Updated: {}", s.updated);
    println!("   Duplicates: {}", s.duplicates);
    println!("   Rejected: {}", s.rejected);
    println!("   Pending review: {}", s.pending_review);
    println!("   Errors: {}", s.errors);
    println!("   Skipped: {}", s.skipped);
    println!("   Can import all: {}", s.can_import_all);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let log_guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    if config.metrics.enabled {
        metrics::init_metrics(&config.metrics.listen_addr);
    }

    let repo: Arc<dyn Repository> = Arc::new(
        SqliteRepository::open(&config.storage.database_path).with_context(|| {
            format!(
                "failed to open catalog at {}",
                config.storage.database_path.display()
            )
        })?,
    );

    let clean = match cli.command {
        Commands::Preview { paths } => {
            let inputs = load_inputs(&paths).context("failed to load input records")?;
            let engine = ImportEngine::new(repo, &config);
            let report = engine.preview(&inputs).await;
            print_report(&report, cli.json)?;
            report.summary.can_import_all
        }
        Commands::Commit { paths, privileged } => {
            let inputs = load_inputs(&paths).context("failed to load input records")?;
            let engine = ImportEngine::new(repo, &config);

            // Outcome notifications stay outside the engine
            let mut events = engine.subscribe();
            let listener = tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            debug!(index = event.index, show_id = ?event.show_id, "{}", event.message)
                        }
                        Err(RecvError::Lagged(missed)) => warn!("Outcome listener missed {} events", missed),
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            let report = engine.commit(&inputs, privileged).await;
            drop(engine);
            if let Err(e) = listener.await {
                error!("Outcome listener failed: {}", e);
            }

            print_report(&report, cli.json)?;
            report.summary.can_import_all
        }
        Commands::Export { out } => {
            let export = ExportUseCase::new(repo);
            let documents = export.export_all(chrono::Utc::now()).await?;
            let written = ExportUseCase::write_all(&documents, &out)?;
            info!("Exported {} shows to {}", written.len(), out.display());
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&written)?);
            } else {
                for path in &written {
                    println!("{}", path.display());
                }
            }
            true
        }
    };

    if !clean {
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}
