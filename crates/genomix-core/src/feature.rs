use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::operations::reverse_complement;
use crate::sequence::GenomeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Source,
    Gene,
    Cds,
    Mrna,
    Trna,
    Rrna,
    Ncrna,
    RepeatRegion,
    MobileElement,
    Regulatory,
    Misc,
    #[serde(other)]
    Other,
}

impl FeatureType {
    pub fn from_genbank_key(key: &str) -> Self {
        match key.to_lowercase().as_str() {
            "source" => FeatureType::Source,
            "gene" => FeatureType::Gene,
            "cds" => FeatureType::Cds,
            "mrna" => FeatureType::Mrna,
            "trna" => FeatureType::Trna,
            "rrna" => FeatureType::Rrna,
            "ncrna" | "tmrna" => FeatureType::Ncrna,
            "repeat_region" => FeatureType::RepeatRegion,
            "mobile_element" => FeatureType::MobileElement,
            "regulatory" | "promoter" | "terminator" | "rbs" => FeatureType::Regulatory,
            "misc_feature" | "misc_binding" | "misc_difference" | "misc_recomb"
            | "misc_structure" | "misc_signal" | "misc_rna" => FeatureType::Misc,
            _ => FeatureType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strand {
    Forward,
    Reverse,
    None,
}

impl Strand {
    /// `+` for forward, `-` otherwise.
    pub fn symbol(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse | Strand::None => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("empty location {start}..{end}")]
    Empty { start: usize, end: usize },
    #[error("location {start}..{end} is outside a {len} bp sequence")]
    OutOfBounds { start: usize, end: usize, len: usize },
    #[error("location {start}..{end} wraps the origin of a linear sequence")]
    WrapsLinear { start: usize, end: usize },
}

/// Represents the location of a feature on the sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Location {
    /// Simple range: start..end
    Simple { start: usize, end: usize },
    /// Join of multiple ranges: join(1..100, 200..300)
    Join { ranges: Vec<(usize, usize)> },
    /// Complement of a location
    Complement { inner: Box<Location> },
}

impl Location {
    pub fn simple(start: usize, end: usize) -> Self {
        Location::Simple { start, end }
    }

    pub fn start(&self) -> usize {
        match self {
            Location::Simple { start, .. } => *start,
            Location::Join { ranges } => ranges.iter().map(|r| r.0).min().unwrap_or(0),
            Location::Complement { inner } => inner.start(),
        }
    }

    pub fn end(&self) -> usize {
        match self {
            Location::Simple { end, .. } => *end,
            Location::Join { ranges } => ranges.iter().map(|r| r.1).max().unwrap_or(0),
            Location::Complement { inner } => inner.end(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Location::Simple { start, end } => end.saturating_sub(*start),
            Location::Join { ranges } => ranges.iter().map(|(s, e)| e.saturating_sub(*s)).sum(),
            Location::Complement { inner } => inner.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pull the bases covered by this location out of `record`.
    ///
    /// Join parts are concatenated in the order given; a complement is
    /// reverse-complemented. Ranges that cross the origin are only accepted
    /// on circular records.
    pub fn extract(&self, record: &GenomeRecord) -> Result<String, LocationError> {
        match self {
            Location::Simple { start, end } => extract_range(record, *start, *end),
            Location::Join { ranges } => {
                if ranges.is_empty() {
                    return Err(LocationError::Empty { start: 0, end: 0 });
                }
                let mut joined = String::new();
                for (start, end) in ranges {
                    joined.push_str(&extract_range(record, *start, *end)?);
                }
                Ok(joined)
            }
            Location::Complement { inner } => Ok(reverse_complement(&inner.extract(record)?)),
        }
    }
}

impl std::fmt::Display for Location {
    /// GenBank-style, 1-based inclusive coordinates.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Simple { start, end } => write!(f, "{}..{}", start + 1, end),
            Location::Join { ranges } => {
                let parts: Vec<String> = ranges
                    .iter()
                    .map(|(s, e)| format!("{}..{}", s + 1, e))
                    .collect();
                write!(f, "join({})", parts.join(","))
            }
            Location::Complement { inner } => write!(f, "complement({})", inner),
        }
    }
}

fn extract_range(record: &GenomeRecord, start: usize, end: usize) -> Result<String, LocationError> {
    let len = record.len();
    if start == end {
        return Err(LocationError::Empty { start, end });
    }
    if start > len || end > len {
        return Err(LocationError::OutOfBounds { start, end, len });
    }
    record
        .wrapped_subsequence(start, end)
        .ok_or(LocationError::WrapsLinear { start, end })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Qualifier {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub feature_type: FeatureType,
    pub location: Location,
    pub strand: Strand,
    #[serde(default)]
    pub qualifiers: Vec<Qualifier>,
}

impl Feature {
    pub fn new(
        name: impl Into<String>,
        feature_type: FeatureType,
        start: usize,
        end: usize,
        strand: Strand,
    ) -> Self {
        Self {
            name: name.into(),
            feature_type,
            location: Location::simple(start, end),
            strand,
            qualifiers: Vec::new(),
        }
    }

    pub fn start(&self) -> usize {
        self.location.start()
    }

    pub fn end(&self) -> usize {
        self.location.end()
    }

    pub fn get_qualifier(&self, key: &str) -> Option<&str> {
        self.qualifiers
            .iter()
            .find(|q| q.key == key)
            .map(|q| q.value.as_str())
    }

    pub fn qualifier_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_qualifier(key).unwrap_or(default)
    }

    pub fn add_qualifier(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.qualifiers.push(Qualifier {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Strand-aware subsequence: reverse-strand features come back
    /// reverse-complemented.
    pub fn extract(&self, record: &GenomeRecord) -> Result<String, LocationError> {
        let bases = self.location.extract(record)?;
        Ok(match self.strand {
            Strand::Reverse => reverse_complement(&bases),
            _ => bases,
        })
    }

    /// Location rendered the way GenBank writes it, including the strand.
    pub fn location_string(&self) -> String {
        match self.strand {
            Strand::Reverse => format!("complement({})", self.location),
            _ => self.location.to_string(),
        }
    }
}
