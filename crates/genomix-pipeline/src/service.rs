use std::path::Path;
use std::sync::Arc;

use genomix_analysis::validate::ReferenceGenome;
use genomix_analysis::{ReferenceSet, Validator};
use genomix_store::{
    db, Database, Genome, Job, NewGenome, ProgressEntry, ResultType, StoredResult,
    ValidationRecord,
};
use uuid::Uuid;

use crate::charts::{ChartRenderer, SvgChartRenderer};
use crate::config::Settings;
use crate::ncbi::{validate_accession, GenomeMetadata, GenomeSource, GenomeSummary, NcbiClient};
use crate::orchestrator::{load_job, AnalysisPipeline, MSG_REVOKED};
use crate::queue::{RetryPolicy, TaskHandle, TaskKind, TaskQueue};
use crate::PipelineError;

/// A queued analysis.
pub struct AnalysisTicket {
    pub job: Job,
    handle: TaskHandle<()>,
}

impl AnalysisTicket {
    pub fn job_id(&self) -> i64 {
        self.job.id
    }

    pub fn task_id(&self) -> Uuid {
        self.handle.task_id()
    }

    /// Wait until the task has finished, including retries.
    pub async fn wait(self) -> Result<(), PipelineError> {
        self.handle.join().await
    }
}

pub struct AnalysisService {
    db: Arc<Database>,
    source: Arc<dyn GenomeSource>,
    validator: Arc<Validator>,
    pipeline: Arc<AnalysisPipeline>,
    queue: TaskQueue,
}

impl AnalysisService {
    pub fn new(settings: &Settings, db: Arc<Database>, source: Arc<dyn GenomeSource>) -> Self {
        let references = ReferenceSet::load(settings.reference_file());
        tracing::info!(references = references.len(), "reference dataset loaded");
        Self::with_parts(
            settings,
            db,
            source,
            Arc::new(Validator::new(references)),
            Arc::new(SvgChartRenderer),
        )
    }

    pub fn with_parts(
        settings: &Settings,
        db: Arc<Database>,
        source: Arc<dyn GenomeSource>,
        validator: Arc<Validator>,
        charts: Arc<dyn ChartRenderer>,
    ) -> Self {
        let pipeline = AnalysisPipeline::new(
            Arc::clone(&db),
            Arc::clone(&validator),
            charts,
            settings.results_dir(),
        )
        .require_genes(settings.require_genes);
        Self {
            db,
            source,
            validator,
            pipeline: Arc::new(pipeline),
            queue: TaskQueue::new(settings.worker_count),
        }
    }

    /// Open the database and the NCBI client named by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(settings.genomes_dir())?;
        std::fs::create_dir_all(settings.results_dir())?;
        let db_path = settings.database_path();
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let db = Arc::new(Database::open(&db_path)?);
        let source = Arc::new(NcbiClient::new(settings)?);
        Ok(Self::new(settings, db, source))
    }

    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<GenomeSummary>, PipelineError> {
        self.source.search(query, max_results).await
    }

    pub async fn genome_metadata(&self, accession: &str) -> Result<GenomeMetadata, PipelineError> {
        self.source.metadata(accession).await
    }

    /// The stored genome for `accession`, downloading and registering it
    /// first if needed.
    pub async fn ensure_genome(&self, accession: &str) -> Result<Genome, PipelineError> {
        validate_accession(accession)?;
        let existing = self
            .db
            .with_conn(|conn| db::get_genome_by_accession(conn, accession))?;
        if let Some(genome) = existing {
            if Path::new(&genome.file_path).exists() {
                tracing::info!(accession, genome_id = genome.id, "genome already exists");
                return Ok(genome);
            }
            tracing::warn!(accession, path = %genome.file_path, "genome file missing, downloading again");
        }

        let source = Arc::clone(&self.source);
        let acc = accession.to_string();
        let handle = self
            .queue
            .submit(TaskKind::Download, RetryPolicy::download(), move |_, _| {
                let source = Arc::clone(&source);
                let acc = acc.clone();
                async move {
                    let path = source.fetch(&acc).await?;
                    let metadata = source.metadata(&acc).await?;
                    Ok((path, metadata))
                }
            });
        let (path, metadata) = handle.join().await?;

        let new_genome = NewGenome {
            accession: accession.to_string(),
            organism: Some(if metadata.organism.is_empty() {
                "Unknown".to_string()
            } else {
                metadata.organism.clone()
            }),
            genome_size: i64::try_from(metadata.length).ok(),
            gc_content: None,
            file_path: path.display().to_string(),
            metadata: serde_json::to_value(&metadata).map_err(genomix_store::StoreError::from)?,
        };
        let genome = self.db.with_conn(|conn| {
            db::update_genome_file(conn, accession, &new_genome.file_path)?;
            db::insert_genome(conn, &new_genome)
        })?;
        tracing::info!(accession, genome_id = genome.id, "genome downloaded and saved");
        Ok(genome)
    }

    /// Create a pending job for `accession` and queue its analysis.
    pub async fn start_analysis(&self, accession: &str) -> Result<AnalysisTicket, PipelineError> {
        let genome = self.ensure_genome(accession).await?;
        let task_id = Uuid::new_v4();
        let job = self
            .db
            .with_conn(|conn| db::create_job(conn, genome.id, task_id))?;
        tracing::info!(job_id = job.id, %task_id, accession, "analysis queued");

        let pipeline = Arc::clone(&self.pipeline);
        let job_id = job.id;
        let handle = self.queue.submit_as(
            task_id,
            TaskKind::Analysis,
            RetryPolicy::analysis(),
            move |cancel, attempt| {
                let pipeline = Arc::clone(&pipeline);
                async move {
                    if attempt > 0 {
                        tracing::info!(job_id, attempt, "retrying analysis");
                    }
                    tokio::task::spawn_blocking(move || pipeline.run(job_id, attempt, &cancel))
                        .await
                        .map_err(|e| PipelineError::TaskPanicked(e.to_string()))?
                }
            },
        );
        Ok(AnalysisTicket { job, handle })
    }

    pub fn job(&self, job_id: i64) -> Result<Job, PipelineError> {
        load_job(&self.db, job_id)
    }

    pub fn list_jobs(&self, limit: u32, offset: u32) -> Result<Vec<Job>, PipelineError> {
        Ok(self.db.with_conn(|conn| db::list_jobs(conn, limit, offset))?)
    }

    pub fn results(&self, job_id: i64) -> Result<Vec<StoredResult>, PipelineError> {
        self.job(job_id)?;
        Ok(self.db.with_conn(|conn| db::get_results(conn, job_id))?)
    }

    pub fn result(
        &self,
        job_id: i64,
        result_type: ResultType,
    ) -> Result<Option<StoredResult>, PipelineError> {
        self.job(job_id)?;
        Ok(self
            .db
            .with_conn(|conn| db::get_result(conn, job_id, result_type))?)
    }

    pub fn validation(&self, job_id: i64) -> Result<Option<ValidationRecord>, PipelineError> {
        self.job(job_id)?;
        Ok(self.db.with_conn(|conn| db::get_validation(conn, job_id))?)
    }

    pub fn progress_history(&self, job_id: i64) -> Result<Vec<ProgressEntry>, PipelineError> {
        self.job(job_id)?;
        Ok(self
            .db
            .with_conn(|conn| db::job_progress_history(conn, job_id))?)
    }

    /// Delete a job and everything stored for it. A task still running for
    /// the job is revoked first.
    pub fn delete_job(&self, job_id: i64) -> Result<bool, PipelineError> {
        if let Ok(job) = self.job(job_id) {
            self.queue.revoke(job.task_id, true);
        }
        let deleted = self.db.with_conn(|conn| db::delete_job(conn, job_id))?;
        if deleted {
            tracing::info!(job_id, "job deleted");
        }
        Ok(deleted)
    }

    /// Revoke the job's task and record the revocation in the store, so a
    /// task owned by another process refuses to start or retry. A job that
    /// already completed is returned unchanged.
    pub fn revoke_job(&self, job_id: i64, terminate: bool) -> Result<Job, PipelineError> {
        let job = self.job(job_id)?;
        let in_process = self.queue.revoke(job.task_id, terminate);
        let marked = self.db.with_conn(|conn| {
            db::mark_job_revoked(conn, job_id, MSG_REVOKED, "Task revoked by user")
        })?;
        tracing::info!(job_id, task_id = %job.task_id, in_process, marked, "revoke requested");
        self.job(job_id)
    }

    pub fn references(&self) -> &ReferenceSet {
        self.validator.references()
    }

    pub fn reference(&self, accession: &str) -> Option<&ReferenceGenome> {
        self.validator.references().get(accession)
    }
}
