use anyhow::{Context, Result};
use genomix_pipeline::AnalysisService;
use genomix_store::ResultType;

use super::print_json;
use crate::dto::{JobDto, ResultDto, ValidationDto};

pub fn list(service: &AnalysisService, limit: u32, offset: u32, json: bool) -> Result<()> {
    let jobs: Vec<JobDto> = service
        .list_jobs(limit, offset)?
        .iter()
        .map(JobDto::from)
        .collect();

    if json {
        return print_json(&jobs);
    }
    if jobs.is_empty() {
        println!("No analysis jobs.");
        return Ok(());
    }
    println!(
        "{:>6}  {:<16} {:<10} {:>6}  {:<19}  MESSAGE",
        "ID", "ACCESSION", "STATUS", "PROG", "CREATED"
    );
    for job in &jobs {
        println!(
            "{:>6}  {:<16} {:<10} {:>5.1}%  {:<19}  {}",
            job.id,
            job.accession,
            job.status,
            job.progress,
            job.created_at,
            job.message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Print stored result bundles, optionally only one type. Results are always
/// JSON documents, so they print as JSON in both modes.
pub fn results(service: &AnalysisService, job_id: i64, result_type: Option<&str>) -> Result<()> {
    let results: Vec<ResultDto> = match result_type {
        Some(name) => {
            let result_type: ResultType = name.parse().with_context(|| {
                let known: Vec<&str> = ResultType::ALL.iter().map(|t| t.as_str()).collect();
                format!("expected one of {}", known.join(", "))
            })?;
            service
                .result(job_id, result_type)?
                .iter()
                .map(ResultDto::from)
                .collect()
        }
        None => service.results(job_id)?.iter().map(ResultDto::from).collect(),
    };
    print_json(&results)
}

pub fn validation(service: &AnalysisService, job_id: i64, json: bool) -> Result<()> {
    let Some(record) = service.validation(job_id)? else {
        anyhow::bail!("job {job_id} has no validation yet");
    };
    let dto = ValidationDto::from(&record);
    if json {
        return print_json(&dto);
    }

    println!("reference: {}", dto.reference_accession);
    println!("status:    {}", dto.status);
    if let Some(message) = dto.outcome.get("message").and_then(|m| m.as_str()) {
        println!("message:   {message}");
    }
    let rows = dto
        .outcome
        .get("validations")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    if rows.is_empty() {
        return Ok(());
    }
    println!();
    println!(
        "{:<28} {:>14} {:>14} {:>9} {:>9}  STATUS",
        "METRIC", "OBSERVED", "EXPECTED", "DEV %", "TOL %"
    );
    for row in &rows {
        let num = |key: &str| row.get(key).and_then(|v| v.as_f64()).unwrap_or(f64::NAN);
        println!(
            "{:<28} {:>14.4} {:>14.4} {:>9.2} {:>9.2}  {}",
            row.get("metric").and_then(|v| v.as_str()).unwrap_or("?"),
            num("observed"),
            num("expected"),
            num("deviation_percent"),
            num("tolerance_percent"),
            row.get("status").and_then(|v| v.as_str()).unwrap_or("?"),
        );
    }
    Ok(())
}
