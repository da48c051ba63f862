//! Genome download, background analysis and job bookkeeping.
//!
//! [`AnalysisService`] is the entry point: it fetches genomes through a
//! [`GenomeSource`], queues analysis jobs on a [`TaskQueue`] and runs them
//! with an [`AnalysisPipeline`] that records progress in the store.

pub mod charts;
pub mod config;
pub mod error;
pub mod ncbi;
pub mod orchestrator;
pub mod queue;
pub mod rate_limit;
pub mod service;

pub use charts::{ChartInputs, ChartRenderer, SvgChartRenderer};
pub use config::{ConfigError, Settings};
pub use error::PipelineError;
pub use ncbi::{GenomeMetadata, GenomeSource, GenomeSummary, NcbiClient};
pub use orchestrator::AnalysisPipeline;
pub use queue::{CancelToken, RetryPolicy, TaskHandle, TaskKind, TaskQueue};
pub use service::{AnalysisService, AnalysisTicket};
