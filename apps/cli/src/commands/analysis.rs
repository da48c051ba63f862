use std::time::Duration;

use anyhow::{Context, Result};
use genomix_pipeline::{AnalysisService, AnalysisTicket};

use super::print_json;
use crate::dto::{JobDto, ProgressDto};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Queue one analysis per accession and follow them until they finish.
/// The tasks live in this process, so the command always waits.
pub async fn analyze(service: &AnalysisService, accessions: &[String], json: bool) -> Result<()> {
    let mut tickets = Vec::with_capacity(accessions.len());
    for accession in accessions {
        let ticket = service
            .start_analysis(accession)
            .await
            .with_context(|| format!("could not start analysis of {accession}"))?;
        if !json {
            println!(
                "job {} queued for {} (task {})",
                ticket.job_id(),
                accession,
                ticket.task_id()
            );
        }
        tickets.push(ticket);
    }

    let mut failures = 0;
    let mut finished = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        let job_id = ticket.job_id();
        if let Err(err) = follow(service, ticket, json).await {
            failures += 1;
            if !json {
                eprintln!("job {job_id} failed: {err}");
            }
        }
        finished.push(JobDto::from(&service.job(job_id)?));
    }

    if json {
        print_json(&finished)?;
    }
    if failures > 0 {
        anyhow::bail!("{failures} of {} analyses failed", finished.len());
    }
    Ok(())
}

async fn follow(service: &AnalysisService, ticket: AnalysisTicket, quiet: bool) -> Result<()> {
    let job_id = ticket.job_id();
    let wait = ticket.wait();
    tokio::pin!(wait);

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut last_progress = -1.0;
    loop {
        tokio::select! {
            outcome = &mut wait => {
                return outcome.with_context(|| format!("analysis job {job_id}"));
            }
            _ = ticker.tick() => {
                if quiet {
                    continue;
                }
                let job = service.job(job_id)?;
                if job.progress > last_progress {
                    last_progress = job.progress;
                    println!(
                        "job {job_id}: {:>5.1}%  {}",
                        job.progress,
                        job.message.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }
}

pub fn status(service: &AnalysisService, job_id: i64, history: bool, json: bool) -> Result<()> {
    let job = service.job(job_id)?;
    let dto = JobDto::from(&job);
    let entries: Vec<ProgressDto> = if history {
        service
            .progress_history(job_id)?
            .iter()
            .map(ProgressDto::from)
            .collect()
    } else {
        Vec::new()
    };

    if json {
        return if history {
            print_json(&serde_json::json!({ "job": dto, "history": entries }))
        } else {
            print_json(&dto)
        };
    }

    println!("job:       {}", dto.id);
    println!("accession: {}", dto.accession);
    println!("task:      {}", dto.task_id);
    println!("status:    {}", dto.status);
    println!("progress:  {:.1}%", dto.progress);
    if let Some(message) = &dto.message {
        println!("message:   {message}");
    }
    if let Some(error) = &dto.error_message {
        println!("error:     {error}");
    }
    println!("created:   {}", dto.created_at);
    if let Some(started) = &dto.started_at {
        println!("started:   {started}");
    }
    if let Some(completed) = &dto.completed_at {
        println!("completed: {completed}");
    }
    if let Some(revoked) = &dto.revoked_at {
        println!("revoked:   {revoked}");
    }
    if history {
        println!();
        for entry in &entries {
            println!(
                "{}  {:>5.1}%  {}",
                entry.recorded_at,
                entry.progress,
                entry.message.as_deref().unwrap_or("")
            );
        }
    }
    Ok(())
}

pub fn revoke(service: &AnalysisService, job_id: i64, terminate: bool, json: bool) -> Result<()> {
    let job = service
        .revoke_job(job_id, terminate)
        .with_context(|| format!("could not revoke job {job_id}"))?;
    let dto = JobDto::from(&job);
    if json {
        return print_json(&dto);
    }
    println!("job {}: {} ({})", dto.id, dto.status, dto.message.unwrap_or_default());
    Ok(())
}

pub fn delete(service: &AnalysisService, job_id: i64, json: bool) -> Result<()> {
    let deleted = service.delete_job(job_id)?;
    if json {
        return print_json(&serde_json::json!({ "job_id": job_id, "deleted": deleted }));
    }
    if deleted {
        println!("job {job_id} deleted");
        Ok(())
    } else {
        anyhow::bail!("job {job_id} not found")
    }
}
