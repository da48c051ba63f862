//! Genome source backed by the NCBI E-utilities.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use genomix_formats::detect::is_complete_genbank;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::config::{ConfigError, Settings};
use crate::rate_limit::IntervalGate;
use crate::PipelineError;

/// One hit from a genome search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeSummary {
    pub accession: String,
    pub title: String,
    pub organism: String,
    pub length: u64,
    pub update_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeMetadata {
    pub accession: String,
    pub title: String,
    pub organism: String,
    pub length: u64,
    pub create_date: String,
    pub update_date: String,
    pub taxonomy_id: Option<u64>,
}

/// Where genome records come from.
#[async_trait]
pub trait GenomeSource: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<GenomeSummary>, PipelineError>;

    /// Download the GenBank record for `accession` and return its local path.
    /// A record already on disk is returned without contacting the service.
    async fn fetch(&self, accession: &str) -> Result<PathBuf, PipelineError>;

    async fn metadata(&self, accession: &str) -> Result<GenomeMetadata, PipelineError>;
}

fn accession_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{1,6}_?[0-9]+(\.[0-9]+)?$").expect("accession pattern is valid")
    })
}

/// Reject anything that is not a plain accession, so it can be used as a
/// file name and a query parameter.
pub fn validate_accession(accession: &str) -> Result<(), PipelineError> {
    if accession_pattern().is_match(accession) {
        Ok(())
    } else {
        Err(PipelineError::InvalidAccession(accession.to_string()))
    }
}

/// Organism name from a record title: everything before the first comma.
pub fn organism_from_title(title: &str) -> String {
    title.split(',').next().unwrap_or(title).trim().to_string()
}

/// Local cache path for a genome record.
pub fn genome_path(genomes_dir: &Path, accession: &str) -> PathBuf {
    genomes_dir.join(format!("{accession}.gb"))
}

/// Validate a downloaded GenBank text and write it to `path` through a
/// temporary file, so readers never see a partial record.
pub async fn store_genbank(
    accession: &str,
    text: &str,
    path: &Path,
    max_bytes: u64,
) -> Result<(), PipelineError> {
    let size = text.len() as u64;
    if size > max_bytes {
        return Err(PipelineError::GenomeTooLarge {
            accession: accession.to_string(),
            size,
            limit: max_bytes,
        });
    }
    if !is_complete_genbank(text) {
        return Err(PipelineError::Upstream(format!(
            "response for {accession} is not a complete GenBank record"
        )));
    }
    let record = genomix_formats::genbank::parse(text)?;
    if record.is_empty() {
        return Err(PipelineError::Upstream(format!(
            "GenBank record for {accession} has no sequence"
        )));
    }

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let tmp = path.with_extension(format!("gb.{}.part", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, text).await?;
    // Concurrent first downloads both land here; the last rename wins.
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

pub struct NcbiClient {
    http: reqwest::Client,
    base_url: String,
    email: Option<String>,
    api_key: Option<String>,
    genomes_dir: PathBuf,
    max_genome_bytes: u64,
    cache_ttl: Duration,
    gate: IntervalGate,
    metadata_cache: Mutex<HashMap<String, (Instant, GenomeMetadata)>>,
}

impl NcbiClient {
    pub fn new(settings: &Settings) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("genomix/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.ncbi_base_url.trim_end_matches('/').to_string(),
            email: settings.ncbi_email.clone().filter(|e| !e.trim().is_empty()),
            api_key: settings.ncbi_api_key.clone().filter(|k| !k.is_empty()),
            genomes_dir: settings.genomes_dir(),
            max_genome_bytes: settings.max_genome_bytes(),
            cache_ttl: settings.cache_ttl(),
            gate: IntervalGate::new(settings.min_request_interval()),
            metadata_cache: Mutex::new(HashMap::new()),
        })
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<reqwest::Response, PipelineError> {
        let email = self.email.as_deref().ok_or_else(|| ConfigError::Invalid {
            key: "ncbi_email",
            reason: "an e-mail address is required for NCBI requests".to_string(),
        })?;
        self.gate.wait().await;

        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("tool", "genomix"));
        query.push(("email", email));
        if let Some(key) = &self.api_key {
            query.push(("api_key", key));
        }

        let url = format!("{}/{endpoint}", self.base_url);
        tracing::debug!(%url, "NCBI request");
        let response = self.http.get(&url).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Upstream(format!("{endpoint} returned HTTP {status}")));
        }
        Ok(response)
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, PipelineError> {
        Ok(self.get(endpoint, params).await?.json().await?)
    }

    async fn summaries(&self, ids: &str) -> Result<Vec<Value>, PipelineError> {
        let body = self
            .get_json(
                "esummary.fcgi",
                &[("db", "nuccore"), ("id", ids), ("retmode", "json")],
            )
            .await?;
        Ok(parse_esummary(&body))
    }

    fn cached_metadata(&self, accession: &str) -> Option<GenomeMetadata> {
        let cache = self.metadata_cache.lock().ok()?;
        cache
            .get(accession)
            .filter(|(at, _)| at.elapsed() < self.cache_ttl)
            .map(|(_, meta)| meta.clone())
    }
}

fn parse_esummary(body: &Value) -> Vec<Value> {
    let Some(result) = body.get("result") else {
        return Vec::new();
    };
    result
        .get("uids")
        .and_then(Value::as_array)
        .map(|uids| {
            uids.iter()
                .filter_map(Value::as_str)
                .filter_map(|uid| result.get(uid))
                .filter(|doc| doc.get("error").is_none())
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn str_field(doc: &Value, key: &str) -> String {
    doc.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn u64_field(doc: &Value, key: &str) -> Option<u64> {
    match doc.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn summary_from_doc(doc: &Value) -> GenomeSummary {
    let title = str_field(doc, "title");
    GenomeSummary {
        accession: str_field(doc, "accessionversion"),
        organism: organism_from_title(&title),
        title,
        length: u64_field(doc, "slen").unwrap_or(0),
        update_date: str_field(doc, "updatedate"),
    }
}

fn metadata_from_doc(accession: &str, doc: &Value) -> GenomeMetadata {
    let title = str_field(doc, "title");
    let found = str_field(doc, "accessionversion");
    GenomeMetadata {
        accession: if found.is_empty() { accession.to_string() } else { found },
        organism: organism_from_title(&title),
        title,
        length: u64_field(doc, "slen").unwrap_or(0),
        create_date: str_field(doc, "createdate"),
        update_date: str_field(doc, "updatedate"),
        taxonomy_id: u64_field(doc, "taxid"),
    }
}

#[async_trait]
impl GenomeSource for NcbiClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<GenomeSummary>, PipelineError> {
        tracing::info!(query, "searching NCBI");
        let term = format!("{query}[Organism] AND complete genome[Title]");
        let retmax = max_results.to_string();
        let body = self
            .get_json(
                "esearch.fcgi",
                &[
                    ("db", "nuccore"),
                    ("term", &term),
                    ("retmax", &retmax),
                    ("sort", "relevance"),
                    ("retmode", "json"),
                ],
            )
            .await?;

        let ids: Vec<&str> = body
            .pointer("/esearchresult/idlist")
            .and_then(Value::as_array)
            .ok_or_else(|| PipelineError::Upstream("esearch response has no idlist".to_string()))?
            .iter()
            .filter_map(Value::as_str)
            .collect();
        if ids.is_empty() {
            tracing::info!(query, "no results");
            return Ok(Vec::new());
        }

        let results: Vec<GenomeSummary> = self
            .summaries(&ids.join(","))
            .await?
            .iter()
            .map(summary_from_doc)
            .collect();
        tracing::info!(query, found = results.len(), "search finished");
        Ok(results)
    }

    async fn fetch(&self, accession: &str) -> Result<PathBuf, PipelineError> {
        validate_accession(accession)?;
        let path = genome_path(&self.genomes_dir, accession);
        if tokio::fs::try_exists(&path).await? {
            tracing::info!(accession, path = %path.display(), "genome already downloaded");
            return Ok(path);
        }

        tracing::info!(accession, "downloading genome");
        let response = self
            .get(
                "efetch.fcgi",
                &[
                    ("db", "nuccore"),
                    ("id", accession),
                    ("rettype", "gb"),
                    ("retmode", "text"),
                ],
            )
            .await?;
        if let Some(len) = response.content_length() {
            if len > self.max_genome_bytes {
                return Err(PipelineError::GenomeTooLarge {
                    accession: accession.to_string(),
                    size: len,
                    limit: self.max_genome_bytes,
                });
            }
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(PipelineError::NotFound(accession.to_string()));
        }

        store_genbank(accession, &text, &path, self.max_genome_bytes).await?;
        tracing::info!(accession, path = %path.display(), "genome downloaded");
        Ok(path)
    }

    async fn metadata(&self, accession: &str) -> Result<GenomeMetadata, PipelineError> {
        validate_accession(accession)?;
        if let Some(meta) = self.cached_metadata(accession) {
            return Ok(meta);
        }

        let docs = self.summaries(accession).await?;
        let doc = docs
            .first()
            .ok_or_else(|| PipelineError::NotFound(accession.to_string()))?;
        let meta = metadata_from_doc(accession, doc);

        if let Ok(mut cache) = self.metadata_cache.lock() {
            cache.insert(accession.to_string(), (Instant::now(), meta.clone()));
        }
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_accession() {
        for ok in ["NC_000913.3", "NC_000913", "U00096", "CP000001.1", "AB123"] {
            assert!(validate_accession(ok).is_ok(), "{ok}");
        }
        for bad in ["", "../etc/passwd", "NC_000913.3/x", "NC 000913", "1234", "TOOLONGPREFIX_1"] {
            assert!(validate_accession(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_organism_from_title() {
        assert_eq!(
            organism_from_title("Escherichia coli str. K-12 substr. MG1655, complete genome"),
            "Escherichia coli str. K-12 substr. MG1655"
        );
        assert_eq!(organism_from_title("Plasmid pX"), "Plasmid pX");
    }

    #[test]
    fn test_parse_esummary() {
        let body = json!({
            "header": {},
            "result": {
                "uids": ["556503834"],
                "556503834": {
                    "uid": "556503834",
                    "title": "Escherichia coli str. K-12 substr. MG1655, complete genome",
                    "accessionversion": "NC_000913.3",
                    "slen": 4641652,
                    "createdate": "2001/10/15",
                    "updatedate": "2024/03/01",
                    "taxid": 511145
                }
            }
        });
        let docs = parse_esummary(&body);
        assert_eq!(docs.len(), 1);

        let summary = summary_from_doc(&docs[0]);
        assert_eq!(summary.accession, "NC_000913.3");
        assert_eq!(summary.organism, "Escherichia coli str. K-12 substr. MG1655");
        assert_eq!(summary.length, 4_641_652);

        let meta = metadata_from_doc("NC_000913.3", &docs[0]);
        assert_eq!(meta.taxonomy_id, Some(511145));
        assert_eq!(meta.create_date, "2001/10/15");
    }

    #[test]
    fn test_parse_esummary_error_entry() {
        let body = json!({"result": {"uids": ["1"], "1": {"error": "cannot get document summary"}}});
        assert!(parse_esummary(&body).is_empty());
        assert!(parse_esummary(&json!({"error": "bad"})).is_empty());
    }

    #[tokio::test]
    async fn test_requests_require_email() {
        let client = NcbiClient::new(&Settings::default()).unwrap();
        assert!(matches!(
            client.search("Escherichia coli", 5).await,
            Err(PipelineError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_store_genbank_rejects_bad_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X1.gb");

        let html = "<html>Service unavailable</html>";
        assert!(matches!(
            store_genbank("X1", html, &path, 1024).await,
            Err(PipelineError::Upstream(_))
        ));

        let truncated = "LOCUS       X1   4 bp    DNA     linear\nORIGIN\n        1 acgt\n";
        assert!(store_genbank("X1", truncated, &path, 1024).await.is_err());

        let big = "LOCUS       X1\n".repeat(200);
        assert!(matches!(
            store_genbank("X1", &big, &path, 1024).await,
            Err(PipelineError::GenomeTooLarge { .. })
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_store_genbank_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = genome_path(&dir.path().join("genomes"), "X1");
        let text = "LOCUS       X1   4 bp    DNA     linear\nORIGIN\n        1 acgt\n//\n";
        store_genbank("X1", text, &path, 1024).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
