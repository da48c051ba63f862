use genomix_core::operations::{
    gc_percent, gc_sliding_window, nucleotide_composition, GcProfile, NucleotideComposition,
};
use genomix_core::rounding::round2_serialize;
use genomix_core::GenomeRecord;
use serde::{Deserialize, Serialize};

use crate::gene::coding_lengths;
use crate::{AnalysisError, Analyzer};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeStatistics {
    pub organism: String,
    pub accession: String,
    pub genome_size: usize,
    #[serde(serialize_with = "round2_serialize")]
    pub gc_content: f64,
    pub nucleotide_composition: NucleotideComposition,
    /// CDS features that extracted cleanly.
    pub gene_count: usize,
    pub coding_length: usize,
    #[serde(serialize_with = "round2_serialize")]
    pub coding_density: f64,
    #[serde(serialize_with = "round2_serialize")]
    pub average_gene_length: f64,
    pub gc_profile: GcProfile,
}

#[derive(Debug, Clone, Copy)]
pub struct GenomeAnalyzer {
    pub window_size: usize,
    pub step: usize,
}

impl Default for GenomeAnalyzer {
    fn default() -> Self {
        Self {
            window_size: 1000,
            step: 500,
        }
    }
}

impl Analyzer for GenomeAnalyzer {
    type Output = GenomeStatistics;

    fn name(&self) -> &'static str {
        "genome"
    }

    fn analyze(&self, record: &GenomeRecord) -> Result<GenomeStatistics, AnalysisError> {
        let genome_size = record.len();
        let lengths = coding_lengths(record);
        let gene_count = lengths.len();
        let coding_length: usize = lengths.iter().sum();

        let coding_density = if genome_size > 0 {
            coding_length as f64 / genome_size as f64 * 100.0
        } else {
            0.0
        };
        let average_gene_length = if gene_count > 0 {
            coding_length as f64 / gene_count as f64
        } else {
            0.0
        };

        Ok(GenomeStatistics {
            organism: record
                .organism
                .clone()
                .unwrap_or_else(|| record.description.clone()),
            accession: record.display_id().to_string(),
            genome_size,
            gc_content: gc_percent(&record.sequence),
            nucleotide_composition: nucleotide_composition(&record.sequence),
            gene_count,
            coding_length,
            coding_density,
            average_gene_length,
            gc_profile: gc_sliding_window(&record.sequence, self.window_size, self.step),
        })
    }
}
