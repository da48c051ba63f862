//! Flat, printable views of service types.

use genomix_analysis::validate::ReferenceGenome;
use genomix_store::{Job, ProgressEntry, StoredResult, ValidationRecord};
use serde::Serialize;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize)]
pub struct JobDto {
    pub id: i64,
    pub accession: String,
    pub task_id: String,
    pub status: String,
    pub progress: f64,
    pub message: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub revoked_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressDto {
    pub progress: f64,
    pub message: Option<String>,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultDto {
    pub result_type: String,
    pub data: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDto {
    pub reference_accession: String,
    pub status: String,
    pub outcome: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceDto {
    pub accession: String,
    pub organism: String,
    pub genome_size: Option<f64>,
    pub gc_content: Option<f64>,
    pub gene_count: Option<f64>,
    pub citation: String,
}

impl From<&Job> for JobDto {
    fn from(job: &Job) -> Self {
        JobDto {
            id: job.id,
            accession: job.accession.clone(),
            task_id: job.task_id.to_string(),
            status: job.status.to_string(),
            progress: job.progress,
            message: job.message.clone(),
            error_message: job.error_message.clone(),
            created_at: job.created_at.format(TIME_FORMAT).to_string(),
            started_at: job.started_at.map(|t| t.format(TIME_FORMAT).to_string()),
            completed_at: job.completed_at.map(|t| t.format(TIME_FORMAT).to_string()),
            revoked_at: job.revoked_at.map(|t| t.format(TIME_FORMAT).to_string()),
        }
    }
}

impl From<&ProgressEntry> for ProgressDto {
    fn from(entry: &ProgressEntry) -> Self {
        ProgressDto {
            progress: entry.progress,
            message: entry.message.clone(),
            recorded_at: entry.recorded_at.format(TIME_FORMAT).to_string(),
        }
    }
}

impl From<&StoredResult> for ResultDto {
    fn from(result: &StoredResult) -> Self {
        ResultDto {
            result_type: result.result_type.to_string(),
            data: result.data.clone(),
            created_at: result.created_at.format(TIME_FORMAT).to_string(),
        }
    }
}

impl From<&ValidationRecord> for ValidationDto {
    fn from(record: &ValidationRecord) -> Self {
        ValidationDto {
            reference_accession: record.reference_accession.clone(),
            status: record.validation_status.clone(),
            outcome: record.deviations.clone(),
        }
    }
}

impl ReferenceDto {
    pub fn new(accession: &str, reference: &ReferenceGenome) -> Self {
        ReferenceDto {
            accession: accession.to_string(),
            organism: reference.organism.clone(),
            genome_size: reference.genome_size,
            gc_content: reference.gc_content,
            gene_count: reference.gene_count,
            citation: reference.citation.clone(),
        }
    }
}
