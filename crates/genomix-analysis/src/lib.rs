//! Codon, gene and genome-wide analyses over a parsed [`GenomeRecord`], plus
//! tolerance-based validation against reference values.

pub mod codon;
pub mod gene;
pub mod genome;
pub mod stats;
pub mod validate;

use genomix_core::GenomeRecord;
use serde::Serialize;
use thiserror::Error;

pub use codon::{CodonAnalysis, CodonAnalyzer};
pub use gene::{GeneAnalysis, GeneAnalyzer, GeneSummary};
pub use genome::{GenomeAnalyzer, GenomeStatistics};
pub use validate::{ObservedMetrics, ReferenceSet, ValidationOutcome, Validator};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("genome record {0} has an empty sequence")]
    EmptySequence(String),
    #[error("no CDS features could be extracted from {0}")]
    NoGenes(String),
}

/// One analysis over a genome record.
pub trait Analyzer {
    type Output: Serialize;

    fn name(&self) -> &'static str;

    /// Reject records the analysis cannot run on.
    fn validate_input(&self, record: &GenomeRecord) -> Result<(), AnalysisError> {
        if record.is_empty() {
            return Err(AnalysisError::EmptySequence(record.display_id().to_string()));
        }
        Ok(())
    }

    fn analyze(&self, record: &GenomeRecord) -> Result<Self::Output, AnalysisError>;

    /// Validate, then analyze.
    fn run(&self, record: &GenomeRecord) -> Result<Self::Output, AnalysisError> {
        self.validate_input(record)?;
        tracing::info!(analyzer = self.name(), genome = record.display_id(), "starting analysis");
        let output = self.analyze(record)?;
        tracing::info!(analyzer = self.name(), genome = record.display_id(), "analysis completed");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genomix_core::Topology;

    #[test]
    fn test_run_rejects_empty_sequence() {
        let rec = GenomeRecord::new("empty", "", Topology::Linear);
        for result in [
            CodonAnalyzer.run(&rec).map(|_| ()),
            GeneAnalyzer::default().run(&rec).map(|_| ()),
            GenomeAnalyzer::default().run(&rec).map(|_| ()),
        ] {
            assert!(matches!(result, Err(AnalysisError::EmptySequence(id)) if id == "empty"));
        }
    }
}
