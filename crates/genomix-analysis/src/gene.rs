use genomix_core::operations::gc_percent;
use genomix_core::rounding::round2_serialize;
use genomix_core::{Feature, GenomeRecord, LocationError};
use serde::{Deserialize, Serialize};

use crate::stats::{GcStats, LengthDistribution, LengthStats, StrandDistribution};
use crate::{AnalysisError, Analyzer};

/// Gene summaries kept in a stored result.
pub const GENE_SAMPLE_SIZE: usize = 50;

/// Bin width of the gene length histogram, in bp.
pub const LENGTH_BIN_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSummary {
    pub gene_name: String,
    pub locus_tag: String,
    pub product: String,
    pub location: String,
    pub start: usize,
    pub end: usize,
    /// Length of the extracted subsequence.
    pub length: usize,
    #[serde(serialize_with = "round2_serialize")]
    pub gc_content: f64,
    pub strand: char,
}

impl GeneSummary {
    fn from_feature(feature: &Feature, record: &GenomeRecord) -> Result<Self, LocationError> {
        let bases = feature.extract(record)?;
        Ok(Self {
            gene_name: feature.qualifier_or("gene", "Unknown").to_string(),
            locus_tag: feature.qualifier_or("locus_tag", "").to_string(),
            product: feature.qualifier_or("product", "Unknown protein").to_string(),
            location: feature.location_string(),
            start: feature.start(),
            end: feature.end(),
            length: bases.len(),
            gc_content: gc_percent(&bases),
            strand: feature.strand.symbol(),
        })
    }
}

/// Summarise every CDS feature in record order. Features whose location
/// cannot be extracted are logged and left out.
pub fn extract_genes(record: &GenomeRecord) -> Vec<GeneSummary> {
    record
        .coding_features()
        .filter_map(|feature| match GeneSummary::from_feature(feature, record) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(
                    genome = record.display_id(),
                    feature = %feature.name,
                    error = %e,
                    "skipping CDS feature"
                );
                None
            }
        })
        .collect()
}

/// Lengths of the CDS features that extract cleanly. Skipped features are
/// already reported by [`extract_genes`], so nothing is logged here.
pub fn coding_lengths(record: &GenomeRecord) -> Vec<usize> {
    record
        .coding_features()
        .filter_map(|feature| feature.extract(record).ok())
        .map(|bases| bases.len())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneStats {
    pub total_genes: usize,
    pub length_stats: LengthStats,
    pub gc_content_stats: GcStats,
    pub strand_distribution: StrandDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneStatistics {
    Computed(GeneStats),
    NoGenes { total_genes: usize, error: String },
}

impl GeneStatistics {
    pub fn no_genes() -> Self {
        GeneStatistics::NoGenes {
            total_genes: 0,
            error: "No genes found".to_string(),
        }
    }

    pub fn stats(&self) -> Option<&GeneStats> {
        match self {
            GeneStatistics::Computed(stats) => Some(stats),
            GeneStatistics::NoGenes { .. } => None,
        }
    }
}

pub fn gene_statistics(genes: &[GeneSummary]) -> GeneStatistics {
    let lengths: Vec<usize> = genes.iter().map(|g| g.length).collect();
    let gc: Vec<f64> = genes.iter().map(|g| g.gc_content).collect();

    let (Some(length_stats), Some(gc_content_stats)) =
        (LengthStats::from_lengths(&lengths), GcStats::from_percentages(&gc))
    else {
        return GeneStatistics::no_genes();
    };

    let forward = genes.iter().filter(|g| g.strand == '+').count();
    GeneStatistics::Computed(GeneStats {
        total_genes: genes.len(),
        length_stats,
        gc_content_stats,
        strand_distribution: StrandDistribution::new(forward, genes.len() - forward),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneAnalysis {
    /// First [`GENE_SAMPLE_SIZE`] genes.
    pub genes: Vec<GeneSummary>,
    pub total_genes: usize,
    pub statistics: GeneStatistics,
    pub length_distribution: LengthDistribution,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeneAnalyzer {
    /// Fail instead of reporting "no genes found".
    pub require_genes: bool,
}

impl GeneAnalyzer {
    pub fn new(require_genes: bool) -> Self {
        Self { require_genes }
    }
}

impl Analyzer for GeneAnalyzer {
    type Output = GeneAnalysis;

    fn name(&self) -> &'static str {
        "gene"
    }

    fn analyze(&self, record: &GenomeRecord) -> Result<GeneAnalysis, AnalysisError> {
        let mut genes = extract_genes(record);
        if genes.is_empty() && self.require_genes {
            return Err(AnalysisError::NoGenes(record.display_id().to_string()));
        }

        let statistics = gene_statistics(&genes);
        let lengths: Vec<usize> = genes.iter().map(|g| g.length).collect();
        let length_distribution = LengthDistribution::from_lengths(&lengths, LENGTH_BIN_SIZE);
        let total_genes = genes.len();
        genes.truncate(GENE_SAMPLE_SIZE);

        tracing::debug!(genome = record.display_id(), total_genes, "genes extracted");

        Ok(GeneAnalysis {
            genes,
            total_genes,
            statistics,
            length_distribution,
        })
    }
}
