use std::io::Write;

use genomix_analysis::validate::{OverallStatus, ReferenceSet};
use genomix_analysis::{
    Analyzer, CodonAnalyzer, GeneAnalyzer, GenomeAnalyzer, ObservedMetrics, Validator,
};
use genomix_formats::genbank;
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

const MINI_GENOME: &str = include_str!("fixtures/mini_genome.gb");

const REFERENCES: &str = r#"{
  "NC_TEST01.1": {
    "organism": "Testus minimus",
    "genome_size": 120,
    "gc_content": 54.17,
    "gene_count": 3,
    "avg_gene_length": 30,
    "stop_codon_frequencies": {"TAA": 0.5, "TAG": 0.25, "TGA": 0.25},
    "reference": "Doe & Roe, unpublished"
  }
}"#;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_reference_file() {
    let file = write_temp(REFERENCES);
    let set = ReferenceSet::load(file.path());
    assert_eq!(set.accessions(), vec!["NC_TEST01.1"]);
    assert_eq!(set.get("NC_TEST01.1").unwrap().citation, "Doe & Roe, unpublished");
}

#[test]
fn test_missing_or_malformed_reference_file_is_empty() {
    assert!(ReferenceSet::load("/no/such/reference.json").is_empty());

    let file = write_temp("{ not json");
    assert!(ReferenceSet::try_load(file.path()).is_err());
    assert!(ReferenceSet::load(file.path()).is_empty());
}

#[test]
fn test_fixture_validates_against_its_reference() {
    let record = genbank::parse(MINI_GENOME).unwrap();
    let codon = CodonAnalyzer.run(&record).unwrap();
    let gene = GeneAnalyzer::default().run(&record).unwrap();
    let genome = GenomeAnalyzer::default().run(&record).unwrap();

    let observed = ObservedMetrics::from_results(Some(&codon), Some(&gene), Some(&genome));
    let validator = Validator::new(ReferenceSet::from_json(REFERENCES).unwrap());
    let outcome = validator.validate("NC_TEST01.1", &observed);

    assert_eq!(outcome.status, OverallStatus::Passed);
    assert_eq!(outcome.validations.len(), 7);
    assert!(outcome.validations.iter().all(|v| v.passed));
}

#[test]
fn test_partial_results_compare_only_present_metrics() {
    let record = genbank::parse(MINI_GENOME).unwrap();
    let genome = GenomeAnalyzer::default().run(&record).unwrap();

    let observed = ObservedMetrics::from_results(None, None, Some(&genome));
    let validator = Validator::new(ReferenceSet::from_json(REFERENCES).unwrap());
    let outcome = validator.validate("NC_TEST01.1", &observed);

    let keys: Vec<&str> = outcome.validations.iter().map(|v| v.key.as_str()).collect();
    assert_eq!(keys, vec!["genome_size", "gc_content"]);
}
