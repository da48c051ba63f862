//! Comparison of analysis results against published reference values.
//!
//! Each metric gets a tolerance band in percent. A metric passes when its
//! relative deviation is within the band, warns up to twice the band and fails
//! beyond that. The overall status is the worst metric status.

use std::collections::BTreeMap;
use std::path::Path;

use genomix_core::codon::STOP_CODONS;
use genomix_core::rounding::round2_serialize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codon::CodonAnalysis;
use crate::gene::GeneAnalysis;
use crate::genome::GenomeStatistics;

#[derive(Debug, Error)]
pub enum ValidationDataError {
    #[error("failed to read reference file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed reference file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Published values for one genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGenome {
    #[serde(default = "unknown_organism")]
    pub organism: String,
    #[serde(default)]
    pub genome_size: Option<f64>,
    #[serde(default)]
    pub gc_content: Option<f64>,
    #[serde(default)]
    pub gene_count: Option<f64>,
    #[serde(default)]
    pub avg_gene_length: Option<f64>,
    /// Fractions of all stop codons, keyed by codon.
    #[serde(default)]
    pub stop_codon_frequencies: BTreeMap<String, f64>,
    #[serde(default, rename = "reference")]
    pub citation: String,
}

fn unknown_organism() -> String {
    "Unknown".to_string()
}

/// Reference genomes keyed by accession.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceSet {
    entries: BTreeMap<String, ReferenceGenome>,
}

impl ReferenceSet {
    pub fn from_json(json: &str) -> Result<Self, ValidationDataError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, ValidationDataError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load the reference file, falling back to an empty set when it is
    /// missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "reference file not found");
            return Self::default();
        }
        match Self::try_load(path) {
            Ok(set) => {
                tracing::info!(path = %path.display(), references = set.len(), "loaded reference genomes");
                set
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "error loading reference file");
                Self::default()
            }
        }
    }

    pub fn insert(&mut self, accession: impl Into<String>, reference: ReferenceGenome) {
        self.entries.insert(accession.into(), reference);
    }

    pub fn get(&self, accession: &str) -> Option<&ReferenceGenome> {
        self.entries.get(accession)
    }

    pub fn accessions(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Allowed deviation per metric, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TolerancePolicy {
    pub genome_size: f64,
    pub gc_content: f64,
    pub gene_count: f64,
    pub avg_gene_length: f64,
    pub stop_codon: f64,
}

impl Default for TolerancePolicy {
    fn default() -> Self {
        Self {
            genome_size: 1.0,
            gc_content: 0.5,
            gene_count: 5.0,
            avg_gene_length: 10.0,
            stop_codon: 5.0,
        }
    }
}

/// Raw metric values taken from a run's result bundles. Any of them may be
/// missing when the corresponding bundle is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedMetrics {
    pub genome_size: Option<f64>,
    pub gc_content: Option<f64>,
    pub gene_count: Option<f64>,
    pub avg_gene_length: Option<f64>,
    /// Percent of all stop codons, keyed by codon.
    pub stop_codon_percent: BTreeMap<String, f64>,
}

impl ObservedMetrics {
    pub fn from_results(
        codon: Option<&CodonAnalysis>,
        gene: Option<&GeneAnalysis>,
        genome: Option<&GenomeStatistics>,
    ) -> Self {
        let mut observed = Self::default();

        if let Some(genome) = genome {
            observed.genome_size = Some(genome.genome_size as f64);
            observed.gc_content = Some(genome.gc_content);
        }
        if let Some(gene) = gene {
            observed.gene_count = Some(gene.total_genes as f64);
            observed.avg_gene_length = gene.statistics.stats().map(|s| s.length_stats.mean);
        }
        if let Some(codon) = codon {
            observed.stop_codon_percent = codon
                .stop_codons
                .codons
                .iter()
                .map(|(codon, count)| (codon.clone(), count.frequency_percent))
                .collect();
        }

        observed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    Passed,
    Warning,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Passed,
    Warning,
    Failed,
    Unknown,
    NoReference,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Passed => "passed",
            OverallStatus::Warning => "warning",
            OverallStatus::Failed => "failed",
            OverallStatus::Unknown => "unknown",
            OverallStatus::NoReference => "no_reference",
        }
    }
}

impl From<MetricStatus> for OverallStatus {
    fn from(status: MetricStatus) -> Self {
        match status {
            MetricStatus::Passed => OverallStatus::Passed,
            MetricStatus::Warning => OverallStatus::Warning,
            MetricStatus::Failed => OverallStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValidation {
    pub key: String,
    pub metric: String,
    #[serde(serialize_with = "round2_serialize")]
    pub observed: f64,
    #[serde(serialize_with = "round2_serialize")]
    pub expected: f64,
    #[serde(serialize_with = "round2_serialize")]
    pub deviation_percent: f64,
    pub tolerance_percent: f64,
    pub status: MetricStatus,
    pub passed: bool,
}

pub fn deviation_percent(observed: f64, expected: f64) -> f64 {
    if expected == 0.0 {
        0.0
    } else {
        ((observed - expected) * 100.0 / expected).abs()
    }
}

pub fn validate_metric(
    key: impl Into<String>,
    name: impl Into<String>,
    observed: f64,
    expected: f64,
    tolerance_percent: f64,
) -> MetricValidation {
    let deviation = deviation_percent(observed, expected);
    let passed = deviation <= tolerance_percent;
    let status = if passed {
        MetricStatus::Passed
    } else if deviation <= tolerance_percent * 2.0 {
        MetricStatus::Warning
    } else {
        MetricStatus::Failed
    };

    MetricValidation {
        key: key.into(),
        metric: name.into(),
        observed,
        expected,
        deviation_percent: deviation,
        tolerance_percent,
        status,
        passed,
    }
}

/// Worst metric status, or `Unknown` when nothing was compared.
pub fn overall_status(validations: &[MetricValidation]) -> OverallStatus {
    validations
        .iter()
        .map(|v| v.status)
        .max()
        .map_or(OverallStatus::Unknown, OverallStatus::from)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub status: OverallStatus,
    pub validated: bool,
    pub reference_accession: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_organism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_citation: Option<String>,
    #[serde(default)]
    pub validations: Vec<MetricValidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct Validator {
    references: ReferenceSet,
    tolerances: TolerancePolicy,
}

impl Validator {
    pub fn new(references: ReferenceSet) -> Self {
        Self {
            references,
            tolerances: TolerancePolicy::default(),
        }
    }

    pub fn with_tolerances(mut self, tolerances: TolerancePolicy) -> Self {
        self.tolerances = tolerances;
        self
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    pub fn validate(&self, accession: &str, observed: &ObservedMetrics) -> ValidationOutcome {
        let Some(reference) = self.references.get(accession) else {
            return ValidationOutcome {
                status: OverallStatus::NoReference,
                validated: false,
                reference_accession: accession.to_string(),
                reference_organism: None,
                reference_citation: None,
                validations: Vec::new(),
                message: Some(format!("No reference data available for {accession}")),
            };
        };

        tracing::info!(accession, "validating results against reference");

        let tol = &self.tolerances;
        let scalar_metrics = [
            ("genome_size", "Genome Size", observed.genome_size, reference.genome_size, tol.genome_size),
            ("gc_content", "GC Content", observed.gc_content, reference.gc_content, tol.gc_content),
            ("gene_count", "Gene Count", observed.gene_count, reference.gene_count, tol.gene_count),
            (
                "avg_gene_length",
                "Average Gene Length",
                observed.avg_gene_length,
                reference.avg_gene_length,
                tol.avg_gene_length,
            ),
        ];

        let mut validations: Vec<MetricValidation> = scalar_metrics
            .into_iter()
            .filter_map(|(key, name, obs, exp, tolerance)| {
                Some(validate_metric(key, name, obs?, exp?, tolerance))
            })
            .collect();

        for codon in STOP_CODONS {
            let (Some(percent), Some(expected)) = (
                observed.stop_codon_percent.get(codon),
                reference.stop_codon_frequencies.get(codon),
            ) else {
                continue;
            };
            // Compared in percent so a boundary deviation stays exact;
            // reported as fractions like the reference.
            let metric = validate_metric(
                format!("stop_codon_{codon}"),
                format!("Stop Codon {codon} Frequency"),
                *percent,
                expected * 100.0,
                tol.stop_codon,
            );
            validations.push(MetricValidation {
                observed: percent / 100.0,
                expected: *expected,
                ..metric
            });
        }

        let status = overall_status(&validations);
        tracing::debug!(accession, status = status.as_str(), metrics = validations.len(), "validation finished");

        ValidationOutcome {
            status,
            validated: true,
            reference_accession: accession.to_string(),
            reference_organism: Some(reference.organism.clone()),
            reference_citation: Some(reference.citation.clone()),
            validations,
            message: None,
        }
    }
}
