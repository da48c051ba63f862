//! Runs the analysis stages for one job and records their progress.

use std::path::PathBuf;
use std::sync::Arc;

use genomix_analysis::{
    Analyzer, CodonAnalyzer, GeneAnalyzer, GenomeAnalyzer, ObservedMetrics, Validator,
};
use genomix_store::{db, Database, Job, ResultType, StoreError};
use serde::Serialize;

use crate::charts::{ChartInputs, ChartRenderer};
use crate::queue::CancelToken;
use crate::PipelineError;

pub const MSG_STARTED: &str = "Starting analysis...";
pub const MSG_COMPLETED: &str = "Analysis completed successfully";
pub const MSG_FAILED: &str = "Analysis failed";
pub const MSG_REVOKED: &str = "Analysis revoked";

/// Progress committed after each stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Checkpoint {
    Codon,
    Gene,
    Genome,
    Validation,
    Charts,
}

impl Checkpoint {
    pub fn progress(self) -> f64 {
        match self {
            Checkpoint::Codon => 10.0,
            Checkpoint::Gene => 35.0,
            Checkpoint::Genome => 60.0,
            Checkpoint::Validation => 80.0,
            Checkpoint::Charts => 90.0,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Checkpoint::Codon => "Codon analysis complete",
            Checkpoint::Gene => "Gene analysis complete",
            Checkpoint::Genome => "Genome statistics complete",
            Checkpoint::Validation => "Validation complete",
            Checkpoint::Charts => "Charts generated",
        }
    }
}

pub struct AnalysisPipeline {
    db: Arc<Database>,
    validator: Arc<Validator>,
    charts: Arc<dyn ChartRenderer>,
    results_dir: PathBuf,
    require_genes: bool,
}

impl AnalysisPipeline {
    pub fn new(
        db: Arc<Database>,
        validator: Arc<Validator>,
        charts: Arc<dyn ChartRenderer>,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db,
            validator,
            charts,
            results_dir: results_dir.into(),
            require_genes: false,
        }
    }

    /// Treat a genome without extractable CDS features as a gene-stage failure.
    pub fn require_genes(mut self, require: bool) -> Self {
        self.require_genes = require;
        self
    }

    /// Run every stage for `job_id`. Blocks; call from a blocking thread.
    ///
    /// On error the job is marked failed with progress left at the last
    /// checkpoint, and the error is returned so the caller can retry. Only an
    /// attempt after the first may restart a failed job.
    pub fn run(&self, job_id: i64, attempt: u32, cancel: &CancelToken) -> Result<(), PipelineError> {
        match self.run_stages(job_id, attempt, cancel) {
            Ok(()) => {
                tracing::info!(job_id, "analysis completed");
                Ok(())
            }
            Err(err) => {
                let message = match err {
                    PipelineError::Revoked => MSG_REVOKED,
                    _ => MSG_FAILED,
                };
                tracing::error!(job_id, error = %err, "analysis failed");
                let marked = self
                    .db
                    .with_conn(|conn| db::mark_job_failed(conn, job_id, message, &err.to_string()));
                if let Err(store_err) = marked {
                    tracing::error!(job_id, error = %store_err, "could not record job failure");
                }
                Err(err)
            }
        }
    }

    fn run_stages(
        &self,
        job_id: i64,
        attempt: u32,
        cancel: &CancelToken,
    ) -> Result<(), PipelineError> {
        cancel.check()?;
        let started = self.db.with_conn(|conn| {
            let job = db::get_job(conn, job_id)?.ok_or(StoreError::JobNotFound(job_id))?;
            let genome = db::get_genome_by_accession(conn, &job.accession)?
                .ok_or_else(|| StoreError::GenomeNotFound(job.accession.clone()))?;
            db::mark_job_running(conn, job_id, attempt > 0)?;
            let cleared = db::clear_job_outputs(conn, job_id)?;
            if cleared > 0 {
                tracing::info!(job_id, cleared, "cleared outputs of an earlier attempt");
            }
            Ok((job, genome.file_path))
        });
        let (job, file_path) = match started {
            Err(StoreError::Revoked(_)) => return Err(PipelineError::Revoked),
            other => other?,
        };
        tracing::info!(job_id, accession = %job.accession, "{MSG_STARTED}");

        let record = genomix_formats::read_genbank_file(&file_path)?;

        let codon = CodonAnalyzer.run(&record)?;
        self.save(job_id, ResultType::CodonAnalysis, &codon)?;
        self.checkpoint(job_id, Checkpoint::Codon, cancel)?;

        let gene = GeneAnalyzer::new(self.require_genes).run(&record)?;
        self.save(job_id, ResultType::GeneStats, &gene)?;
        self.checkpoint(job_id, Checkpoint::Gene, cancel)?;

        let genome = GenomeAnalyzer::default().run(&record)?;
        self.save(job_id, ResultType::GenomeStats, &genome)?;
        self.checkpoint(job_id, Checkpoint::Genome, cancel)?;

        let observed = ObservedMetrics::from_results(Some(&codon), Some(&gene), Some(&genome));
        let outcome = self.validator.validate(&job.accession, &observed);
        let payload = serde_json::to_value(&outcome).map_err(StoreError::from)?;
        self.db.with_conn(|conn| {
            db::insert_validation(
                conn,
                job_id,
                &outcome.reference_accession,
                &payload,
                outcome.status.as_str(),
            )
        })?;
        tracing::info!(job_id, status = outcome.status.as_str(), "validation stored");
        self.checkpoint(job_id, Checkpoint::Validation, cancel)?;

        let inputs = ChartInputs {
            codon: Some(&codon),
            gene: Some(&gene),
            genome: Some(&genome),
        };
        let out_dir = self.results_dir.join(format!("job_{job_id}"));
        match self.charts.render(&inputs, &out_dir) {
            Ok(charts) if !charts.is_empty() => {
                if let Err(err) = self.save(job_id, ResultType::Charts, &charts) {
                    tracing::warn!(job_id, error = %err, "could not store chart paths");
                }
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(job_id, error = %err, "chart generation failed"),
        }
        self.checkpoint(job_id, Checkpoint::Charts, cancel)?;

        let completed = self
            .db
            .with_conn(|conn| db::mark_job_completed(conn, job_id, MSG_COMPLETED))?;
        if !completed {
            return Err(PipelineError::Revoked);
        }
        Ok(())
    }

    fn save<T: Serialize>(
        &self,
        job_id: i64,
        result_type: ResultType,
        value: &T,
    ) -> Result<(), PipelineError> {
        let data = serde_json::to_value(value).map_err(StoreError::from)?;
        self.db
            .with_conn(|conn| db::insert_result(conn, job_id, result_type, &data))?;
        Ok(())
    }

    /// Commit a checkpoint. A job that is no longer running was revoked
    /// from elsewhere.
    fn checkpoint(
        &self,
        job_id: i64,
        checkpoint: Checkpoint,
        cancel: &CancelToken,
    ) -> Result<(), PipelineError> {
        cancel.check()?;
        let accepted = self.db.with_conn(|conn| {
            db::update_job_progress(conn, job_id, checkpoint.progress(), checkpoint.message())
        })?;
        if !accepted {
            return Err(PipelineError::Revoked);
        }
        tracing::info!(job_id, progress = checkpoint.progress(), "{}", checkpoint.message());
        Ok(())
    }
}

/// Current state of a job, for callers that only hold an id.
pub fn load_job(db: &Database, job_id: i64) -> Result<Job, PipelineError> {
    db.with_conn(|conn| db::get_job(conn, job_id))?
        .ok_or(PipelineError::JobNotFound(job_id))
}
