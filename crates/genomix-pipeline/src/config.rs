//! Runtime settings, layered as defaults, then an optional TOML file, then
//! `GENOMIX_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "GENOMIX";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Contact address sent with every NCBI request. Required for network use.
    pub ncbi_email: Option<String>,
    pub ncbi_api_key: Option<String>,
    /// Requests per second.
    pub ncbi_rate_limit: u32,
    pub ncbi_base_url: String,
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/genomix.db`.
    pub database_path: Option<PathBuf>,
    /// Defaults to `<data_dir>/reference/reference_genomes.json`.
    pub reference_file: Option<PathBuf>,
    pub max_genome_size_mb: u64,
    pub cache_ttl_hours: u64,
    pub worker_count: usize,
    /// Treat a genome without extractable CDS features as a failed run.
    pub require_genes: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ncbi_email: None,
            ncbi_api_key: None,
            ncbi_rate_limit: 3,
            ncbi_base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            data_dir: PathBuf::from("./data"),
            database_path: None,
            reference_file: None,
            max_genome_size_mb: 50,
            cache_ttl_hours: 24,
            worker_count: 2,
            require_genes: false,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ncbi_rate_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "ncbi_rate_limit",
                reason: "must be at least 1 request per second".to_string(),
            });
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid {
                key: "worker_count",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn genomes_dir(&self) -> PathBuf {
        self.data_dir.join("genomes")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("genomix.db"))
    }

    pub fn reference_file(&self) -> PathBuf {
        self.reference_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("reference").join("reference_genomes.json"))
    }

    pub fn max_genome_bytes(&self) -> u64 {
        self.max_genome_size_mb * 1024 * 1024
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.ncbi_rate_limit.max(1)))
    }
}
