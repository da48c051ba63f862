use genomix_analysis::validate::ValidationDataError;
use genomix_analysis::AnalysisError;
use genomix_formats::ParseError;
use genomix_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The genome service could not be reached or answered with garbage.
    #[error("upstream service error: {0}")]
    Upstream(String),
    #[error("genome {0} not found")]
    NotFound(String),
    #[error("invalid accession: {0:?}")]
    InvalidAccession(String),
    #[error("genome {accession} is {size} bytes, over the {limit} byte limit")]
    GenomeTooLarge {
        accession: String,
        size: u64,
        limit: u64,
    },
    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("could not read genome record: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    ValidationData(#[from] ValidationDataError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("job {0} not found")]
    JobNotFound(i64),
    #[error("task was revoked")]
    Revoked,
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

impl PipelineError {
    /// Whether the task queue should run the task again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Upstream(_)
                | PipelineError::Analysis(_)
                | PipelineError::Parse(_)
                | PipelineError::Store(_)
                | PipelineError::Io(_)
        )
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        PipelineError::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PipelineError::Upstream("timeout".into()).is_retryable());
        assert!(PipelineError::Analysis(AnalysisError::NoGenes("x".into())).is_retryable());
        assert!(!PipelineError::NotFound("NC_0".into()).is_retryable());
        assert!(!PipelineError::Revoked.is_retryable());
        assert!(!PipelineError::InvalidAccession("../x".into()).is_retryable());
    }
}
