use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use genomix_pipeline::ncbi::{genome_path, organism_from_title, store_genbank, validate_accession};
use genomix_pipeline::{
    AnalysisService, GenomeMetadata, GenomeSource, GenomeSummary, NcbiClient, PipelineError,
    Settings,
};
use genomix_store::{Database, JobStatus, ResultType};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const MINI_GENOME: &str = include_str!("fixtures/mini_genome.gb");

const GENELESS_GENOME: &str = "\
LOCUS       NC_000002                 40 bp    DNA     linear   BCT 15-MAR-2024
DEFINITION  Testus nullus, complete genome.
ACCESSION   NC_000002
VERSION     NC_000002.1
FEATURES             Location/Qualifiers
     source          1..40
                     /organism=\"Testus nullus\"
ORIGIN
        1 atgaaataga tgcccgggta actgatttaa ggcgcgcatg
//
";

const REFERENCES: &str = r#"{
  "NC_000001.1": {
    "organism": "Testus minimus",
    "genome_size": 120,
    "gc_content": 54.17,
    "gene_count": 3,
    "avg_gene_length": 30,
    "stop_codon_frequencies": {"TAA": 0.5, "TAG": 0.25, "TGA": 0.25},
    "reference": "Doe & Roe, unpublished"
  }
}"#;

/// Serves GenBank text from memory and writes it like a real download would.
struct FixtureSource {
    genomes_dir: PathBuf,
    records: HashMap<&'static str, &'static str>,
    fetches: AtomicUsize,
}

impl FixtureSource {
    fn new(genomes_dir: &Path) -> Self {
        let records = HashMap::from([
            ("NC_000001.1", MINI_GENOME),
            ("NC_000002.1", GENELESS_GENOME),
        ]);
        Self {
            genomes_dir: genomes_dir.to_path_buf(),
            records,
            fetches: AtomicUsize::new(0),
        }
    }

    fn title(accession: &str) -> String {
        match accession {
            "NC_000002.1" => "Testus nullus, complete genome".to_string(),
            _ => "Testus minimus strain T1, complete genome".to_string(),
        }
    }
}

#[async_trait]
impl GenomeSource for FixtureSource {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<GenomeSummary>, PipelineError> {
        let mut hits: Vec<GenomeSummary> = self
            .records
            .keys()
            .filter(|acc| Self::title(acc).contains(query))
            .map(|acc| GenomeSummary {
                accession: acc.to_string(),
                title: Self::title(acc),
                organism: organism_from_title(&Self::title(acc)),
                length: 120,
                update_date: "2024/03/15".to_string(),
            })
            .collect();
        hits.sort_by(|a, b| a.accession.cmp(&b.accession));
        hits.truncate(max_results);
        Ok(hits)
    }

    async fn fetch(&self, accession: &str) -> Result<PathBuf, PipelineError> {
        validate_accession(accession)?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let text = self
            .records
            .get(accession)
            .ok_or_else(|| PipelineError::NotFound(accession.to_string()))?;
        let path = genome_path(&self.genomes_dir, accession);
        if !path.exists() {
            store_genbank(accession, text, &path, 1 << 20).await?;
        }
        Ok(path)
    }

    async fn metadata(&self, accession: &str) -> Result<GenomeMetadata, PipelineError> {
        if !self.records.contains_key(accession) {
            return Err(PipelineError::NotFound(accession.to_string()));
        }
        let title = Self::title(accession);
        Ok(GenomeMetadata {
            accession: accession.to_string(),
            organism: organism_from_title(&title),
            title,
            length: 120,
            create_date: "2024/03/15".to_string(),
            update_date: "2024/03/15".to_string(),
            taxonomy_id: Some(4242),
        })
    }
}

struct Harness {
    _dir: TempDir,
    settings: Settings,
    db: Arc<Database>,
    source: Arc<FixtureSource>,
    service: AnalysisService,
}

fn harness(require_genes: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let reference_file = dir.path().join("reference_genomes.json");
    std::fs::write(&reference_file, REFERENCES).unwrap();

    let settings = Settings {
        data_dir: dir.path().to_path_buf(),
        reference_file: Some(reference_file),
        worker_count: 1,
        require_genes,
        ..Default::default()
    };
    let db = Arc::new(Database::open_in_memory().unwrap());
    let source = Arc::new(FixtureSource::new(&settings.genomes_dir()));
    let service = AnalysisService::new(&settings, Arc::clone(&db), source.clone());
    Harness {
        _dir: dir,
        settings,
        db,
        source,
        service,
    }
}

#[tokio::test]
async fn test_analysis_runs_to_completion() {
    let h = harness(false);
    let ticket = h.service.start_analysis("NC_000001.1").await.unwrap();
    assert_eq!(ticket.job.status, JobStatus::Pending);
    assert_eq!(ticket.job.message.as_deref(), Some("Analysis queued"));
    let job_id = ticket.job_id();
    ticket.wait().await.unwrap();

    let job = h.service.job(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100.0);
    assert_eq!(job.message.as_deref(), Some("Analysis completed successfully"));
    assert!(job.completed_at.is_some());

    let progress: Vec<f64> = h
        .service
        .progress_history(job_id)
        .unwrap()
        .iter()
        .map(|p| p.progress)
        .collect();
    assert_eq!(progress, vec![0.0, 10.0, 35.0, 60.0, 80.0, 90.0, 100.0]);

    let types: Vec<ResultType> = h
        .service
        .results(job_id)
        .unwrap()
        .iter()
        .map(|r| r.result_type)
        .collect();
    assert_eq!(
        types,
        vec![
            ResultType::CodonAnalysis,
            ResultType::GeneStats,
            ResultType::GenomeStats,
            ResultType::Charts,
        ]
    );

    let genome = h
        .service
        .result(job_id, ResultType::GenomeStats)
        .unwrap()
        .unwrap();
    assert_eq!(genome.data["genome_size"], 120);
    assert_eq!(genome.data["gc_content"], 54.17);

    let charts = h.service.result(job_id, ResultType::Charts).unwrap().unwrap();
    let stop_chart = charts.data["stop_codon_frequency"].as_str().unwrap();
    assert!(Path::new(stop_chart).exists());
    assert!(stop_chart.contains(&format!("job_{job_id}")));

    let validation = h.service.validation(job_id).unwrap().unwrap();
    assert_eq!(validation.validation_status, "passed");
    assert_eq!(validation.reference_accession, "NC_000001.1");
    assert_eq!(validation.deviations["validations"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_downloaded_genome_is_reused() {
    let h = harness(false);
    let first = h.service.ensure_genome("NC_000001.1").await.unwrap();
    assert_eq!(first.organism.as_deref(), Some("Testus minimus strain T1"));
    assert_eq!(first.genome_size, Some(120));
    assert_eq!(first.metadata["taxonomy_id"], 4242);
    assert!(Path::new(&first.file_path).starts_with(h.settings.genomes_dir()));

    let again = h.service.ensure_genome("NC_000001.1").await.unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(h.source.fetches.load(Ordering::SeqCst), 1);

    // A vanished file is downloaded again and the row keeps its id.
    std::fs::remove_file(&first.file_path).unwrap();
    let restored = h.service.ensure_genome("NC_000001.1").await.unwrap();
    assert_eq!(restored.id, first.id);
    assert!(Path::new(&restored.file_path).exists());
    assert_eq!(h.source.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_jobs_share_a_genome() {
    let h = harness(false);
    let a = h.service.start_analysis("NC_000001.1").await.unwrap();
    let b = h.service.start_analysis("NC_000001.1").await.unwrap();
    assert_eq!(a.job.genome_id, b.job.genome_id);
    assert_ne!(a.task_id(), b.task_id());
    a.wait().await.unwrap();
    b.wait().await.unwrap();

    let jobs = h.service.list_jobs(10, 0).unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Completed));
    assert_eq!(h.service.list_jobs(10, 1).unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_gene_stage_failure_is_retried_then_recorded() {
    let h = harness(true);
    let ticket = h.service.start_analysis("NC_000002.1").await.unwrap();
    let job_id = ticket.job_id();

    let err = ticket.wait().await.unwrap_err();
    assert!(matches!(err, PipelineError::Analysis(_)), "{err}");

    let job = h.service.job(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.message.as_deref(), Some("Analysis failed"));
    assert!(job.error_message.unwrap().contains("no CDS features"));
    // frozen at the codon checkpoint
    assert_eq!(job.progress, 10.0);

    // three attempts, each starting over at 0
    let history = h.service.progress_history(job_id).unwrap();
    assert_eq!(history.len(), 6);

    // retries cleared the earlier attempts' output
    let results = h.service.results(job_id).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].result_type, ResultType::CodonAnalysis);
    assert!(h.service.validation(job_id).unwrap().is_none());
}

#[tokio::test]
async fn test_genome_without_reference_is_not_validated() {
    let h = harness(false);
    let ticket = h.service.start_analysis("NC_000002.1").await.unwrap();
    let job_id = ticket.job_id();
    ticket.wait().await.unwrap();

    let validation = h.service.validation(job_id).unwrap().unwrap();
    assert_eq!(validation.validation_status, "no_reference");
    assert_eq!(
        validation.deviations["message"],
        "No reference data available for NC_000002.1"
    );

    let gene = h.service.result(job_id, ResultType::GeneStats).unwrap().unwrap();
    assert_eq!(gene.data["statistics"]["error"], "No genes found");
}

#[tokio::test]
async fn test_revoke_marks_job_failed() {
    let h = harness(false);
    let ticket = h.service.start_analysis("NC_000001.1").await.unwrap();
    let job_id = ticket.job_id();

    // The analysis task has not been polled yet on this runtime.
    let job = h.service.revoke_job(job_id, false).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.message.as_deref(), Some("Analysis revoked"));

    assert!(matches!(ticket.wait().await, Err(PipelineError::Revoked)));
    assert!(h.service.results(job_id).unwrap().is_empty());
    assert_eq!(h.service.job(job_id).unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn test_revoke_from_another_service_sticks() {
    let h = harness(false);
    let ticket = h.service.start_analysis("NC_000001.1").await.unwrap();
    let job_id = ticket.job_id();

    // A second process sharing the database does not own the queued task.
    let other = AnalysisService::new(&h.settings, Arc::clone(&h.db), h.source.clone());
    let job = other.revoke_job(job_id, false).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.message.as_deref(), Some("Analysis revoked"));
    assert!(job.revoked_at.is_some());

    assert!(matches!(ticket.wait().await, Err(PipelineError::Revoked)));
    let job = h.service.job(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.message.as_deref(), Some("Analysis revoked"));
    assert!(job.started_at.is_none());
    assert!(h.service.results(job_id).unwrap().is_empty());
    assert!(h.service.progress_history(job_id).unwrap().is_empty());
}

#[tokio::test]
async fn test_revoke_finished_job_keeps_status() {
    let h = harness(false);
    let ticket = h.service.start_analysis("NC_000001.1").await.unwrap();
    let job_id = ticket.job_id();
    ticket.wait().await.unwrap();

    let job = h.service.revoke_job(job_id, true).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(matches!(
        h.service.revoke_job(9999, false),
        Err(PipelineError::JobNotFound(9999))
    ));
}

#[tokio::test]
async fn test_delete_job_cascades() {
    let h = harness(false);
    let ticket = h.service.start_analysis("NC_000001.1").await.unwrap();
    let job_id = ticket.job_id();
    ticket.wait().await.unwrap();

    assert!(h.service.delete_job(job_id).unwrap());
    assert!(matches!(h.service.job(job_id), Err(PipelineError::JobNotFound(_))));
    assert!(matches!(h.service.results(job_id), Err(PipelineError::JobNotFound(_))));
    assert!(!h.service.delete_job(job_id).unwrap());
}

#[tokio::test]
async fn test_bad_accessions_never_reach_the_source() {
    let h = harness(false);
    for bad in ["../../etc/passwd", "NC_000001.1/../x", ""] {
        let err = h.service.start_analysis(bad).await.err().unwrap();
        assert!(matches!(err, PipelineError::InvalidAccession(_)), "{bad}: {err}");
    }
    assert_eq!(h.source.fetches.load(Ordering::SeqCst), 0);
    assert!(h.service.list_jobs(10, 0).unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_accession_creates_no_job() {
    let h = harness(false);
    let err = h.service.start_analysis("NC_999999.1").await.err().unwrap();
    assert!(matches!(err, PipelineError::NotFound(_)), "{err}");
    assert!(h.service.list_jobs(10, 0).unwrap().is_empty());
}

#[tokio::test]
async fn test_search_and_references() {
    let h = harness(false);
    let hits = h.service.search("Testus", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].accession, "NC_000001.1");
    assert_eq!(hits[0].organism, "Testus minimus strain T1");

    assert_eq!(h.service.references().accessions(), vec!["NC_000001.1"]);
    assert_eq!(
        h.service.reference("NC_000001.1").unwrap().organism,
        "Testus minimus"
    );
    assert!(h.service.reference("NC_000002.1").is_none());
}

#[tokio::test]
async fn test_ncbi_fetch_uses_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        ncbi_email: Some("lab@example.org".to_string()),
        // nothing listens here; a request would fail
        ncbi_base_url: "http://127.0.0.1:9".to_string(),
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let path = genome_path(&settings.genomes_dir(), "NC_000001.1");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, MINI_GENOME).unwrap();

    let client = NcbiClient::new(&settings).unwrap();
    assert_eq!(client.fetch("NC_000001.1").await.unwrap(), path);
    assert!(matches!(
        client.fetch("../NC_000001.1").await,
        Err(PipelineError::InvalidAccession(_))
    ));
}
