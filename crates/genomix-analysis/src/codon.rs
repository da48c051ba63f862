use genomix_core::codon::{
    compare_start_codons_with_genes, count_start_codons, count_stop_codons,
    StartCodonComparison, StartCodonSummary, StopCodonSummary,
};
use genomix_core::GenomeRecord;
use serde::{Deserialize, Serialize};

use crate::{AnalysisError, Analyzer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodonAnalysis {
    pub start_codons: StartCodonSummary,
    pub stop_codons: StopCodonSummary,
    pub genome_length: usize,
    /// Genome-wide ATG count against annotated CDS features.
    pub gene_comparison: StartCodonComparison,
}

/// Start and stop codon counts over the whole forward strand.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodonAnalyzer;

impl Analyzer for CodonAnalyzer {
    type Output = CodonAnalysis;

    fn name(&self) -> &'static str {
        "codon"
    }

    fn analyze(&self, record: &GenomeRecord) -> Result<CodonAnalysis, AnalysisError> {
        let start_codons = count_start_codons(&record.sequence);
        let stop_codons = count_stop_codons(&record.sequence);
        let gene_comparison = compare_start_codons_with_genes(
            start_codons.total_count,
            record.coding_features().count(),
        );

        Ok(CodonAnalysis {
            start_codons,
            stop_codons,
            genome_length: record.len(),
            gene_comparison,
        })
    }
}
