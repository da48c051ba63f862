use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl std::str::FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownVariant {
                kind: "job status",
                value: other.to_string(),
            }),
        }
    }
}

/// Tag of a stored result bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    CodonAnalysis,
    GeneStats,
    GenomeStats,
    Charts,
}

impl ResultType {
    pub const ALL: [ResultType; 4] = [
        ResultType::CodonAnalysis,
        ResultType::GeneStats,
        ResultType::GenomeStats,
        ResultType::Charts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::CodonAnalysis => "codon_analysis",
            ResultType::GeneStats => "gene_stats",
            ResultType::GenomeStats => "genome_stats",
            ResultType::Charts => "charts",
        }
    }
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResultType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResultType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "result type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub id: i64,
    pub accession: String,
    pub organism: Option<String>,
    pub genome_size: Option<i64>,
    pub gc_content: Option<f64>,
    pub file_path: String,
    /// Source metadata as returned by the genome service.
    pub metadata: serde_json::Value,
    pub downloaded_at: DateTime<Utc>,
}

/// Fields supplied when registering a downloaded genome.
#[derive(Debug, Clone, Default)]
pub struct NewGenome {
    pub accession: String,
    pub organism: Option<String>,
    pub genome_size: Option<i64>,
    pub gc_content: Option<f64>,
    pub file_path: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub genome_id: i64,
    pub accession: String,
    pub task_id: Uuid,
    pub status: JobStatus,
    pub progress: f64,
    pub message: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once the job was revoked. A revoked job stays `failed`.
    pub revoked_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: i64,
    pub job_id: i64,
    pub result_type: ResultType,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: i64,
    pub job_id: i64,
    pub reference_accession: String,
    /// Full validation outcome.
    pub deviations: serde_json::Value,
    pub validation_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub progress: f64,
    pub message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
