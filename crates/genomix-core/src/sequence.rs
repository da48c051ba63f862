use serde::{Deserialize, Serialize};

use crate::feature::{Feature, FeatureType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Linear,
    Circular,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Linear => write!(f, "linear"),
            Topology::Circular => write!(f, "circular"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default)]
    pub molecule_type: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Taxonomic lineage from the ORGANISM block, most general first.
    #[serde(default)]
    pub taxonomy: Vec<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub number: u32,
    pub authors: Option<String>,
    pub title: Option<String>,
    pub journal: Option<String>,
    pub pubmed: Option<String>,
}

/// One annotated genome as loaded from a GenBank flat file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeRecord {
    /// LOCUS name.
    pub name: String,
    #[serde(default)]
    pub accession: Option<String>,
    #[serde(default)]
    pub organism: Option<String>,
    /// DEFINITION line, trailing period removed.
    #[serde(default)]
    pub description: String,
    pub topology: Topology,
    pub sequence: String,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

impl GenomeRecord {
    pub fn new(name: impl Into<String>, sequence: impl Into<String>, topology: Topology) -> Self {
        Self {
            name: name.into(),
            accession: None,
            organism: None,
            description: String::new(),
            topology,
            sequence: sequence.into().to_uppercase(),
            features: Vec::new(),
            metadata: RecordMetadata::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn is_circular(&self) -> bool {
        self.topology == Topology::Circular
    }

    /// Accession if the record carries one, otherwise the LOCUS name.
    pub fn display_id(&self) -> &str {
        self.accession.as_deref().unwrap_or(&self.name)
    }

    /// Get a subsequence, handling circular wrapping.
    /// Returns `None` when the range falls outside the record.
    pub fn subsequence(&self, start: usize, end: usize) -> Option<&str> {
        if start <= end {
            self.sequence.get(start..end)
        } else {
            None
        }
    }

    /// Like [`subsequence`](Self::subsequence) but allows ranges that wrap the
    /// origin of a circular record.
    pub fn wrapped_subsequence(&self, start: usize, end: usize) -> Option<String> {
        if start <= end {
            return self.subsequence(start, end).map(str::to_string);
        }
        if !self.is_circular() || start > self.len() || end > self.len() {
            return None;
        }
        let mut result = self.sequence[start..].to_string();
        result.push_str(&self.sequence[..end]);
        Some(result)
    }

    pub fn add_feature(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Coding-region features in record order.
    pub fn coding_features(&self) -> impl Iterator<Item = &Feature> {
        self.features
            .iter()
            .filter(|f| f.feature_type == FeatureType::Cds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Strand;

    #[test]
    fn test_new_record_uppercases() {
        let rec = GenomeRecord::new("test", "atcgATCG", Topology::Linear);
        assert_eq!(rec.name, "test");
        assert_eq!(rec.sequence, "ATCGATCG");
        assert_eq!(rec.len(), 8);
        assert!(!rec.is_circular());
        assert_eq!(rec.display_id(), "test");
    }

    #[test]
    fn test_circular_subsequence() {
        let rec = GenomeRecord::new("circ", "AACCGGTT", Topology::Circular);
        assert_eq!(rec.subsequence(2, 6), Some("CCGG"));
        assert_eq!(rec.wrapped_subsequence(6, 2).as_deref(), Some("TTAA"));
    }

    #[test]
    fn test_linear_no_wrap() {
        let rec = GenomeRecord::new("lin", "AACCGGTT", Topology::Linear);
        assert_eq!(rec.wrapped_subsequence(6, 2), None);
        assert_eq!(rec.subsequence(4, 20), None);
    }

    #[test]
    fn test_coding_features_filter() {
        let mut rec = GenomeRecord::new("g", "ATGAAATAA", Topology::Linear);
        rec.add_feature(Feature::new("src", FeatureType::Source, 0, 9, Strand::Forward));
        rec.add_feature(Feature::new("cds", FeatureType::Cds, 0, 9, Strand::Forward));
        let names: Vec<_> = rec.coding_features().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["cds"]);
    }
}
