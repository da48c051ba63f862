use serde::{Deserialize, Serialize};

use crate::rounding::{round2, round2_serialize};

/// Complement a single DNA base
pub fn complement_base(base: char) -> char {
    match base.to_ascii_uppercase() {
        'A' => 'T',
        'T' => 'A',
        'G' => 'C',
        'C' => 'G',
        'R' => 'Y',
        'Y' => 'R',
        'S' => 'S',
        'W' => 'W',
        'K' => 'M',
        'M' => 'K',
        'B' => 'V',
        'V' => 'B',
        'D' => 'H',
        'H' => 'D',
        'N' => 'N',
        other => other,
    }
}

/// Reverse complement of a DNA sequence
pub fn reverse_complement(seq: &str) -> String {
    seq.chars().rev().map(complement_base).collect()
}

/// Calculate GC content as a fraction (0.0 to 1.0)
///
/// S counts as G/C and W as A/T. Other ambiguity codes, N included, are left
/// out of the denominator.
pub fn gc_content(seq: &str) -> f64 {
    let (gc, resolved) = seq.bytes().fold((0usize, 0usize), |(gc, resolved), c| {
        match c.to_ascii_uppercase() {
            b'G' | b'C' | b'S' => (gc + 1, resolved + 1),
            b'A' | b'T' | b'U' | b'W' => (gc, resolved + 1),
            _ => (gc, resolved),
        }
    });
    if resolved == 0 {
        return 0.0;
    }
    gc as f64 / resolved as f64
}

/// GC content as a percentage (0.0 to 100.0)
pub fn gc_percent(seq: &str) -> f64 {
    gc_content(seq) * 100.0
}

/// GC percentage in sliding windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcProfile {
    /// Centre of each window.
    pub positions: Vec<usize>,
    #[serde(serialize_with = "crate::rounding::round2_serialize_vec")]
    pub gc_values: Vec<f64>,
    pub window_size: usize,
    pub step: usize,
}

/// Calculate windowed GC content
pub fn gc_sliding_window(seq: &str, window_size: usize, step: usize) -> GcProfile {
    let mut profile = GcProfile {
        positions: Vec::new(),
        gc_values: Vec::new(),
        window_size,
        step,
    };
    if seq.len() < window_size || window_size == 0 || step == 0 {
        return profile;
    }

    let mut pos = 0;
    while pos + window_size <= seq.len() {
        let window = &seq[pos..pos + window_size];
        profile.positions.push(pos + window_size / 2);
        profile.gc_values.push(gc_percent(window));
        pos += step;
    }

    profile
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseCount {
    pub count: usize,
    #[serde(serialize_with = "round2_serialize")]
    pub percentage: f64,
}

impl BaseCount {
    fn new(count: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self { count, percentage }
    }
}

/// Per-base counts over A/T/G/C. Other symbols (N, IUPAC codes) count towards
/// the length but not towards any base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NucleotideComposition {
    #[serde(rename = "A")]
    pub a: BaseCount,
    #[serde(rename = "T")]
    pub t: BaseCount,
    #[serde(rename = "G")]
    pub g: BaseCount,
    #[serde(rename = "C")]
    pub c: BaseCount,
    #[serde(rename = "AT_content", serialize_with = "round2_serialize")]
    pub at_content: f64,
    #[serde(rename = "GC_content", serialize_with = "round2_serialize")]
    pub gc_content: f64,
}

pub fn nucleotide_composition(seq: &str) -> NucleotideComposition {
    let total = seq.len();
    let (mut a, mut t, mut g, mut c) = (0usize, 0usize, 0usize, 0usize);
    for base in seq.bytes() {
        match base.to_ascii_uppercase() {
            b'A' => a += 1,
            b'T' => t += 1,
            b'G' => g += 1,
            b'C' => c += 1,
            _ => {}
        }
    }

    let a = BaseCount::new(a, total);
    let t = BaseCount::new(t, total);
    let g = BaseCount::new(g, total);
    let c = BaseCount::new(c, total);

    NucleotideComposition {
        at_content: round2(a.percentage) + round2(t.percentage),
        gc_content: round2(g.percentage) + round2(c.percentage),
        a,
        t,
        g,
        c,
    }
}
