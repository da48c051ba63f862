use crate::FileFormat;

/// Auto-detect file format from content
pub fn detect_format(content: &str) -> FileFormat {
    if content.trim_start().starts_with("LOCUS") {
        FileFormat::GenBank
    } else {
        FileFormat::Unknown
    }
}

/// True when `content` looks like a GenBank flat file that ends with the
/// `//` record terminator, which a truncated download lacks.
pub fn is_complete_genbank(content: &str) -> bool {
    detect_format(content) == FileFormat::GenBank
        && content.lines().any(|l| l.trim_end() == "//")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_genbank() {
        assert_eq!(
            detect_format("LOCUS       NC_000913    4641652 bp"),
            FileFormat::GenBank
        );
    }

    #[test]
    fn test_detect_fasta_is_unknown() {
        assert_eq!(detect_format(">seq1\nATCGATCG"), FileFormat::Unknown);
    }

    #[test]
    fn test_detect_error_page() {
        assert_eq!(
            detect_format("<html><body>Error</body></html>"),
            FileFormat::Unknown
        );
    }

    #[test]
    fn test_truncated_genbank_is_incomplete() {
        assert!(is_complete_genbank("LOCUS       x\nORIGIN\n        1 acgt\n//\n"));
        assert!(!is_complete_genbank("LOCUS       x\nORIGIN\n        1 acgt\n"));
    }
}
