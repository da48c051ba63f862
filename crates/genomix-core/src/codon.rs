use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rounding::{round2, round2_serialize};

/// Translation start codon counted genome-wide.
pub const START_CODON: &str = "ATG";

/// Standard-code stop codons.
pub const STOP_CODONS: [&str; 3] = ["TAA", "TAG", "TGA"];

/// Number of start-codon positions kept in a summary.
pub const MAX_STORED_POSITIONS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartCodonSummary {
    pub codon: String,
    pub total_count: usize,
    /// First [`MAX_STORED_POSITIONS`] 0-based positions.
    pub positions: Vec<usize>,
    #[serde(serialize_with = "round2_serialize")]
    pub density_per_kb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopCodonCount {
    pub count: usize,
    /// Share of all stop codons found, not of sequence length.
    #[serde(serialize_with = "round2_serialize")]
    pub frequency_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopCodonSummary {
    pub codons: BTreeMap<String, StopCodonCount>,
    pub total_stop_codons: usize,
    #[serde(serialize_with = "round2_serialize")]
    pub density_per_kb: f64,
}

impl StopCodonSummary {
    pub fn get(&self, codon: &str) -> Option<&StopCodonCount> {
        self.codons.get(codon)
    }
}

/// Every 0-based offset at which `codon` starts. Adjacent hits are each
/// reported; matching is case-insensitive.
pub fn codon_positions(sequence: &str, codon: &str) -> Vec<usize> {
    let needle = codon.as_bytes();
    if needle.is_empty() || sequence.len() < needle.len() {
        return Vec::new();
    }
    sequence
        .as_bytes()
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| window.eq_ignore_ascii_case(needle))
        .map(|(pos, _)| pos)
        .collect()
}

fn density_per_kb(count: usize, length: usize) -> f64 {
    if length == 0 {
        0.0
    } else {
        count as f64 / length as f64 * 1000.0
    }
}

pub fn count_start_codons(sequence: &str) -> StartCodonSummary {
    let mut positions = codon_positions(sequence, START_CODON);
    let total_count = positions.len();
    positions.truncate(MAX_STORED_POSITIONS);

    StartCodonSummary {
        codon: START_CODON.to_string(),
        total_count,
        positions,
        density_per_kb: density_per_kb(total_count, sequence.len()),
    }
}

pub fn count_stop_codons(sequence: &str) -> StopCodonSummary {
    let counts: Vec<(&str, usize)> = STOP_CODONS
        .iter()
        .map(|codon| (*codon, codon_positions(sequence, codon).len()))
        .collect();
    let total: usize = counts.iter().map(|(_, n)| n).sum();

    let codons = counts
        .into_iter()
        .map(|(codon, count)| {
            let frequency_percent = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            (
                codon.to_string(),
                StopCodonCount {
                    count,
                    frequency_percent,
                },
            )
        })
        .collect();

    StopCodonSummary {
        codons,
        total_stop_codons: total,
        density_per_kb: density_per_kb(total, sequence.len()),
    }
}

/// How many genome-wide ATGs there are per annotated gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartCodonComparison {
    pub start_codons: usize,
    pub annotated_genes: usize,
    #[serde(serialize_with = "round2_serialize")]
    pub ratio: f64,
    pub interpretation: String,
}

pub fn compare_start_codons_with_genes(start_codons: usize, gene_count: usize) -> StartCodonComparison {
    let ratio = if gene_count > 0 {
        start_codons as f64 / gene_count as f64
    } else {
        0.0
    };
    let interpretation = match round2(ratio) {
        r if r < 1.0 => "Fewer ATG codons than genes (unexpected)",
        r if r < 2.0 => "Close to 1:1 ratio (most ATGs are gene starts)",
        r if r < 5.0 => "Moderate ratio (some ATGs are not gene starts)",
        _ => "High ratio (many ATGs are not gene starts)",
    };
    StartCodonComparison {
        start_codons,
        annotated_genes: gene_count,
        ratio,
        interpretation: interpretation.to_string(),
    }
}
