mod commands;
mod dto;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genomix_pipeline::{AnalysisService, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "genomix", version, about = "Download and analyze bacterial genomes from NCBI")]
struct Cli {
    /// TOML configuration file. GENOMIX_* environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search NCBI for complete genomes of an organism.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        max_results: usize,
    },
    /// Show NCBI metadata for one accession.
    Info { accession: String },
    /// Download genomes if needed and analyze them, following progress.
    Analyze {
        #[arg(required = true)]
        accessions: Vec<String>,
    },
    /// Show one job's status.
    Status {
        job_id: i64,
        /// Include every recorded progress checkpoint.
        #[arg(long)]
        history: bool,
    },
    /// List analysis jobs, newest first.
    Jobs {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Print a job's stored results as JSON.
    Results {
        job_id: i64,
        /// codon_analysis, gene_stats, genome_stats or charts.
        #[arg(long = "type")]
        result_type: Option<String>,
    },
    /// Show how a job's results compare with the reference values.
    Validation { job_id: i64 },
    /// Revoke a job. Its task stops at the next checkpoint.
    Revoke {
        job_id: i64,
        /// Abort the task immediately instead.
        #[arg(long)]
        terminate: bool,
    },
    /// Delete a job and everything stored for it.
    Delete { job_id: i64 },
    /// List reference genomes used for validation.
    References { accession: Option<String> },
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&settings.log_level);
    let service = AnalysisService::from_settings(&settings).with_context(|| {
        format!(
            "failed to open data directory {}",
            settings.data_dir.display()
        )
    })?;

    let json = cli.json;
    match cli.command {
        Commands::Search { query, max_results } => {
            commands::search::search(&service, &query, max_results, json).await?
        }
        Commands::Info { accession } => commands::search::metadata(&service, &accession, json).await?,
        Commands::Analyze { accessions } => {
            commands::analysis::analyze(&service, &accessions, json).await?
        }
        Commands::Status { job_id, history } => {
            commands::analysis::status(&service, job_id, history, json)?
        }
        Commands::Jobs { limit, offset } => commands::jobs::list(&service, limit, offset, json)?,
        Commands::Results {
            job_id,
            result_type,
        } => commands::jobs::results(&service, job_id, result_type.as_deref())?,
        Commands::Validation { job_id } => commands::jobs::validation(&service, job_id, json)?,
        Commands::Revoke { job_id, terminate } => {
            commands::analysis::revoke(&service, job_id, terminate, json)?
        }
        Commands::Delete { job_id } => commands::analysis::delete(&service, job_id, json)?,
        Commands::References { accession } => {
            commands::references::list(&service, accession.as_deref(), json)?
        }
    }

    Ok(())
}
