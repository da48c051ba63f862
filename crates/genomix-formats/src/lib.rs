pub mod detect;
pub mod genbank;

use std::path::Path;

use genomix_core::GenomeRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    GenBank,
    Unknown,
}

/// Parse content based on detected format. Only GenBank carries the
/// annotation the analyses need, so anything else is rejected.
pub fn parse_file(content: &str) -> Result<GenomeRecord, ParseError> {
    match detect::detect_format(content) {
        FileFormat::GenBank => genbank::parse(content),
        FileFormat::Unknown => Err(ParseError::InvalidFormat(
            "expected a GenBank record starting with LOCUS".to_string(),
        )),
    }
}

/// Read and parse a GenBank file from disk.
pub fn read_genbank_file(path: impl AsRef<Path>) -> Result<GenomeRecord, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_file(&content)
}
