use chrono::Utc;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::model::{
    Genome, Job, JobStatus, NewGenome, ProgressEntry, ResultType, StoredResult, ValidationRecord,
};
use crate::StoreError;

/// Create all tables if they do not exist and turn on foreign keys.
pub fn init_db(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS genomes (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            accession     TEXT NOT NULL UNIQUE,
            organism      TEXT,
            genome_size   INTEGER,
            gc_content    REAL,
            file_path     TEXT NOT NULL,
            metadata      TEXT NOT NULL DEFAULT '{}',
            downloaded_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS jobs (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            genome_id     INTEGER NOT NULL REFERENCES genomes(id) ON DELETE CASCADE,
            task_id       TEXT NOT NULL UNIQUE,
            status        TEXT NOT NULL,
            progress      REAL NOT NULL DEFAULT 0,
            message       TEXT,
            error_message TEXT,
            created_at    TEXT NOT NULL,
            started_at    TEXT,
            completed_at  TEXT,
            revoked_at    TEXT,
            updated_at    TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS results (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id      INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            result_type TEXT NOT NULL,
            data        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS validations (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id              INTEGER NOT NULL UNIQUE REFERENCES jobs(id) ON DELETE CASCADE,
            reference_accession TEXT NOT NULL,
            deviations          TEXT NOT NULL,
            validation_status   TEXT NOT NULL,
            created_at          TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS job_progress (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id      INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            progress    REAL NOT NULL,
            message     TEXT,
            recorded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_genome ON jobs(genome_id);
        CREATE INDEX IF NOT EXISTS idx_results_job ON results(job_id, result_type);
        CREATE INDEX IF NOT EXISTS idx_progress_job ON job_progress(job_id);",
    )?;
    add_missing_column(conn, "jobs", "revoked_at", "TEXT")
}

/// Bring a table created by an older schema up to date.
fn add_missing_column(
    conn: &Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(());
        }
    }
    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Genomes
// ---------------------------------------------------------------------------

/// Register a genome. An existing row for the same accession is kept and
/// returned unchanged.
pub fn insert_genome(conn: &Connection, genome: &NewGenome) -> Result<Genome, StoreError> {
    conn.execute(
        "INSERT INTO genomes
            (accession, organism, genome_size, gc_content, file_path, metadata, downloaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(accession) DO NOTHING",
        params![
            genome.accession,
            genome.organism,
            genome.genome_size,
            genome.gc_content,
            genome.file_path,
            serde_json::to_string(&genome.metadata)?,
            Utc::now(),
        ],
    )?;
    get_genome_by_accession(conn, &genome.accession)?
        .ok_or_else(|| StoreError::GenomeNotFound(genome.accession.clone()))
}

/// Point a genome at a freshly downloaded file.
pub fn update_genome_file(
    conn: &Connection,
    accession: &str,
    file_path: &str,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE genomes SET file_path = ?2, downloaded_at = ?3 WHERE accession = ?1",
        params![accession, file_path, Utc::now()],
    )?;
    Ok(changed > 0)
}

pub fn get_genome_by_accession(
    conn: &Connection,
    accession: &str,
) -> Result<Option<Genome>, StoreError> {
    let genome = conn
        .query_row(
            "SELECT id, accession, organism, genome_size, gc_content, file_path, metadata,
                    downloaded_at
             FROM genomes WHERE accession = ?1",
            params![accession],
            row_to_genome,
        )
        .optional()?;
    Ok(genome)
}

fn row_to_genome(row: &Row) -> rusqlite::Result<Genome> {
    Ok(Genome {
        id: row.get(0)?,
        accession: row.get(1)?,
        organism: row.get(2)?,
        genome_size: row.get(3)?,
        gc_content: row.get(4)?,
        file_path: row.get(5)?,
        metadata: json_column(row, 6)?,
        downloaded_at: row.get(7)?,
    })
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

const JOB_COLUMNS: &str = "j.id, j.genome_id, g.accession, j.task_id, j.status, j.progress,
     j.message, j.error_message, j.created_at, j.started_at, j.completed_at, j.revoked_at,
     j.updated_at";

/// Create a pending job for a genome.
pub fn create_job(conn: &Connection, genome_id: i64, task_id: Uuid) -> Result<Job, StoreError> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO jobs (genome_id, task_id, status, progress, message, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, 'Analysis queued', ?4, ?4)",
        params![genome_id, task_id.to_string(), JobStatus::Pending.as_str(), now],
    )?;
    let id = conn.last_insert_rowid();
    get_job(conn, id)?.ok_or(StoreError::JobNotFound(id))
}

pub fn get_job(conn: &Connection, id: i64) -> Result<Option<Job>, StoreError> {
    let job = conn
        .query_row(
            &format!(
                "SELECT {JOB_COLUMNS} FROM jobs j JOIN genomes g ON g.id = j.genome_id
                 WHERE j.id = ?1"
            ),
            params![id],
            row_to_job,
        )
        .optional()?;
    Ok(job)
}

/// Most recent jobs first.
pub fn list_jobs(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<Job>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs j JOIN genomes g ON g.id = j.genome_id
         ORDER BY j.id DESC LIMIT ?1 OFFSET ?2"
    ))?;
    let rows = stmt.query_map(params![limit, offset], row_to_job)?;
    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(row?);
    }
    Ok(jobs)
}

/// Start a run. A `pending` job becomes `running` at 0%; a `failed` job only
/// does so when `retry` is set. A revoked job never runs again.
pub fn mark_job_running(conn: &Connection, id: i64, retry: bool) -> Result<(), StoreError> {
    let now = Utc::now();
    let changed = conn.execute(
        "UPDATE jobs
         SET status = 'running', progress = 0, message = 'Starting analysis...',
             error_message = NULL, started_at = ?2, completed_at = NULL, updated_at = ?2
         WHERE id = ?1 AND revoked_at IS NULL
           AND (status = 'pending' OR (?3 AND status = 'failed'))",
        params![id, now, retry],
    )?;
    if changed == 0 {
        return Err(transition_error(conn, id, JobStatus::Running)?);
    }
    record_progress(conn, id, 0.0, Some("Starting analysis..."))
}

/// Move a running job's progress forward. Returns false when the update was
/// rejected because the job is not running or `progress` would go backwards.
pub fn update_job_progress(
    conn: &Connection,
    id: i64,
    progress: f64,
    message: &str,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE jobs SET progress = ?2, message = ?3, updated_at = ?4
         WHERE id = ?1 AND status = 'running' AND progress <= ?2",
        params![id, progress, message, Utc::now()],
    )?;
    if changed == 0 {
        tracing::debug!(job_id = id, progress, "progress update rejected");
        return Ok(false);
    }
    record_progress(conn, id, progress, Some(message))?;
    Ok(true)
}

pub fn mark_job_completed(conn: &Connection, id: i64, message: &str) -> Result<bool, StoreError> {
    let now = Utc::now();
    let changed = conn.execute(
        "UPDATE jobs
         SET status = 'completed', progress = 100, message = ?2, completed_at = ?3, updated_at = ?3
         WHERE id = ?1 AND status = 'running'",
        params![id, message, now],
    )?;
    if changed > 0 {
        record_progress(conn, id, 100.0, Some(message))?;
    }
    Ok(changed > 0)
}

/// Fail a job that has not finished. Progress is left where it stopped.
pub fn mark_job_failed(
    conn: &Connection,
    id: i64,
    message: &str,
    error: &str,
) -> Result<bool, StoreError> {
    let now = Utc::now();
    let changed = conn.execute(
        "UPDATE jobs
         SET status = 'failed', message = ?2, error_message = ?3, completed_at = ?4, updated_at = ?4
         WHERE id = ?1 AND status IN ('pending', 'running')",
        params![id, message, error, now],
    )?;
    Ok(changed > 0)
}

/// Record that a job was revoked. Pending and running jobs become `failed`;
/// a failed job waiting for a retry keeps its error but is flagged so the
/// retry is refused. Completed and already revoked jobs are left alone.
pub fn mark_job_revoked(
    conn: &Connection,
    id: i64,
    message: &str,
    error: &str,
) -> Result<bool, StoreError> {
    let now = Utc::now();
    let changed = conn.execute(
        "UPDATE jobs
         SET message = ?2,
             error_message = CASE WHEN status = 'failed' THEN COALESCE(error_message, ?3)
                                  ELSE ?3 END,
             status = 'failed',
             completed_at = COALESCE(completed_at, ?4), revoked_at = ?4, updated_at = ?4
         WHERE id = ?1 AND revoked_at IS NULL AND status IN ('pending', 'running', 'failed')",
        params![id, message, error, now],
    )?;
    Ok(changed > 0)
}

/// Delete a job together with its results, validation and progress history.
pub fn delete_job(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

fn record_progress(
    conn: &Connection,
    id: i64,
    progress: f64,
    message: Option<&str>,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO job_progress (job_id, progress, message, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![id, progress, message, Utc::now()],
    )?;
    Ok(())
}

pub fn job_progress_history(conn: &Connection, id: i64) -> Result<Vec<ProgressEntry>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT progress, message, recorded_at FROM job_progress
         WHERE job_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        Ok(ProgressEntry {
            progress: row.get(0)?,
            message: row.get(1)?,
            recorded_at: row.get(2)?,
        })
    })?;
    let mut history = Vec::new();
    for row in rows {
        history.push(row?);
    }
    Ok(history)
}

fn transition_error(conn: &Connection, id: i64, to: JobStatus) -> Result<StoreError, StoreError> {
    match get_job(conn, id)? {
        Some(job) if job.revoked_at.is_some() => Ok(StoreError::Revoked(id)),
        Some(job) => Ok(StoreError::InvalidTransition {
            job_id: id,
            from: job.status,
            to,
        }),
        None => Ok(StoreError::JobNotFound(id)),
    }
}

fn row_to_job(row: &Row) -> rusqlite::Result<Job> {
    let task_id: String = row.get(3)?;
    let status: String = row.get(4)?;
    Ok(Job {
        id: row.get(0)?,
        genome_id: row.get(1)?,
        accession: row.get(2)?,
        task_id: Uuid::parse_str(&task_id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        status: status
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        progress: row.get(5)?,
        message: row.get(6)?,
        error_message: row.get(7)?,
        created_at: row.get(8)?,
        started_at: row.get(9)?,
        completed_at: row.get(10)?,
        revoked_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

// ---------------------------------------------------------------------------
// Results and validations
// ---------------------------------------------------------------------------

pub fn insert_result(
    conn: &Connection,
    job_id: i64,
    result_type: ResultType,
    data: &serde_json::Value,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO results (job_id, result_type, data, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![job_id, result_type.as_str(), serde_json::to_string(data)?, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_results(conn: &Connection, job_id: i64) -> Result<Vec<StoredResult>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, job_id, result_type, data, created_at FROM results
         WHERE job_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![job_id], row_to_result)?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Latest result of one type for a job.
pub fn get_result(
    conn: &Connection,
    job_id: i64,
    result_type: ResultType,
) -> Result<Option<StoredResult>, StoreError> {
    let result = conn
        .query_row(
            "SELECT id, job_id, result_type, data, created_at FROM results
             WHERE job_id = ?1 AND result_type = ?2 ORDER BY id DESC LIMIT 1",
            params![job_id, result_type.as_str()],
            row_to_result,
        )
        .optional()?;
    Ok(result)
}

fn row_to_result(row: &Row) -> rusqlite::Result<StoredResult> {
    let result_type: String = row.get(2)?;
    Ok(StoredResult {
        id: row.get(0)?,
        job_id: row.get(1)?,
        result_type: result_type
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        data: json_column(row, 3)?,
        created_at: row.get(4)?,
    })
}

/// Store the validation for a job, replacing any earlier one.
pub fn insert_validation(
    conn: &Connection,
    job_id: i64,
    reference_accession: &str,
    deviations: &serde_json::Value,
    validation_status: &str,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO validations
            (job_id, reference_accession, deviations, validation_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(job_id) DO UPDATE SET
            reference_accession = excluded.reference_accession,
            deviations = excluded.deviations,
            validation_status = excluded.validation_status,
            created_at = excluded.created_at",
        params![
            job_id,
            reference_accession,
            serde_json::to_string(deviations)?,
            validation_status,
            Utc::now(),
        ],
    )?;
    let id = conn.query_row(
        "SELECT id FROM validations WHERE job_id = ?1",
        params![job_id],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn get_validation(
    conn: &Connection,
    job_id: i64,
) -> Result<Option<ValidationRecord>, StoreError> {
    let record = conn
        .query_row(
            "SELECT id, job_id, reference_accession, deviations, validation_status, created_at
             FROM validations WHERE job_id = ?1",
            params![job_id],
            |row| {
                Ok(ValidationRecord {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    reference_accession: row.get(2)?,
                    deviations: json_column(row, 3)?,
                    validation_status: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

/// Remove results and validation written by an earlier run of the job.
/// Returns the number of rows removed.
pub fn clear_job_outputs(conn: &Connection, job_id: i64) -> Result<usize, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let results = tx.execute("DELETE FROM results WHERE job_id = ?1", params![job_id])?;
    let validations = tx.execute("DELETE FROM validations WHERE job_id = ?1", params![job_id])?;
    tx.commit()?;
    Ok(results + validations)
}

fn json_column(row: &Row, idx: usize) -> rusqlite::Result<serde_json::Value> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    fn genome(conn: &Connection) -> Genome {
        insert_genome(
            conn,
            &NewGenome {
                accession: "NC_000913.3".to_string(),
                organism: Some("Escherichia coli".to_string()),
                genome_size: Some(4_641_652),
                file_path: "data/genomes/NC_000913.3.gb".to_string(),
                metadata: json!({"title": "Escherichia coli str. K-12"}),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_init_is_idempotent() {
        let conn = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_update_genome_file() {
        let conn = test_db();
        genome(&conn);
        assert!(update_genome_file(&conn, "NC_000913.3", "/tmp/new.gb").unwrap());
        assert!(!update_genome_file(&conn, "NC_MISSING.1", "/tmp/x.gb").unwrap());
        let found = get_genome_by_accession(&conn, "NC_000913.3").unwrap().unwrap();
        assert_eq!(found.file_path, "/tmp/new.gb");
    }

    #[test]
    fn test_insert_genome_keeps_existing_row() {
        let conn = test_db();
        let first = genome(&conn);
        let again = insert_genome(
            &conn,
            &NewGenome {
                accession: "NC_000913.3".to_string(),
                file_path: "elsewhere.gb".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.file_path, "data/genomes/NC_000913.3.gb");
        assert_eq!(again.metadata["title"], "Escherichia coli str. K-12");
    }

    #[test]
    fn test_job_lifecycle() {
        let conn = test_db();
        let g = genome(&conn);
        let job = create_job(&conn, g.id, Uuid::new_v4()).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.accession, "NC_000913.3");

        mark_job_running(&conn, job.id, false).unwrap();
        assert!(update_job_progress(&conn, job.id, 10.0, "Codon analysis complete").unwrap());
        assert!(mark_job_completed(&conn, job.id, "Analysis completed").unwrap());

        let done = get_job(&conn, job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100.0);
        assert!(done.completed_at.is_some());

        let history: Vec<f64> = job_progress_history(&conn, job.id)
            .unwrap()
            .iter()
            .map(|p| p.progress)
            .collect();
        assert_eq!(history, vec![0.0, 10.0, 100.0]);
    }

    #[test]
    fn test_progress_regression_rejected() {
        let conn = test_db();
        let g = genome(&conn);
        let job = create_job(&conn, g.id, Uuid::new_v4()).unwrap();
        mark_job_running(&conn, job.id, false).unwrap();
        assert!(update_job_progress(&conn, job.id, 35.0, "Gene analysis complete").unwrap());
        assert!(!update_job_progress(&conn, job.id, 10.0, "late").unwrap());
        assert_eq!(get_job(&conn, job.id).unwrap().unwrap().progress, 35.0);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let conn = test_db();
        let g = genome(&conn);
        let job = create_job(&conn, g.id, Uuid::new_v4()).unwrap();
        mark_job_running(&conn, job.id, false).unwrap();
        mark_job_completed(&conn, job.id, "done").unwrap();

        assert!(!mark_job_failed(&conn, job.id, "Analysis revoked", "Analysis revoked").unwrap());
        assert!(!update_job_progress(&conn, job.id, 100.0, "again").unwrap());
        assert!(matches!(
            mark_job_running(&conn, job.id, true),
            Err(StoreError::InvalidTransition { from: JobStatus::Completed, .. })
        ));
    }

    #[test]
    fn test_failed_job_can_restart() {
        let conn = test_db();
        let g = genome(&conn);
        let job = create_job(&conn, g.id, Uuid::new_v4()).unwrap();
        mark_job_running(&conn, job.id, false).unwrap();
        update_job_progress(&conn, job.id, 35.0, "Gene analysis complete").unwrap();
        assert!(mark_job_failed(&conn, job.id, "Analysis failed", "boom").unwrap());

        let failed = get_job(&conn, job.id).unwrap().unwrap();
        assert_eq!(failed.progress, 35.0);
        assert_eq!(failed.error_message.as_deref(), Some("boom"));

        assert!(matches!(
            mark_job_running(&conn, job.id, false),
            Err(StoreError::InvalidTransition { from: JobStatus::Failed, .. })
        ));
        mark_job_running(&conn, job.id, true).unwrap();
        let restarted = get_job(&conn, job.id).unwrap().unwrap();
        assert_eq!(restarted.progress, 0.0);
        assert!(restarted.error_message.is_none());
    }

    #[test]
    fn test_revoked_job_never_restarts() {
        let conn = test_db();
        let g = genome(&conn);

        let queued = create_job(&conn, g.id, Uuid::new_v4()).unwrap();
        assert!(mark_job_revoked(&conn, queued.id, "Analysis revoked", "Task revoked by user").unwrap());
        let revoked = get_job(&conn, queued.id).unwrap().unwrap();
        assert_eq!(revoked.status, JobStatus::Failed);
        assert_eq!(revoked.message.as_deref(), Some("Analysis revoked"));
        assert!(revoked.revoked_at.is_some());
        assert!(matches!(
            mark_job_running(&conn, queued.id, false),
            Err(StoreError::Revoked(id)) if id == queued.id
        ));

        // failed and waiting for a retry
        let backoff = create_job(&conn, g.id, Uuid::new_v4()).unwrap();
        mark_job_running(&conn, backoff.id, false).unwrap();
        mark_job_failed(&conn, backoff.id, "Analysis failed", "boom").unwrap();
        assert!(mark_job_revoked(&conn, backoff.id, "Analysis revoked", "Task revoked by user").unwrap());
        assert!(!mark_job_revoked(&conn, backoff.id, "Analysis revoked", "again").unwrap());
        let flagged = get_job(&conn, backoff.id).unwrap().unwrap();
        assert_eq!(flagged.message.as_deref(), Some("Analysis revoked"));
        assert_eq!(flagged.error_message.as_deref(), Some("boom"));
        assert!(matches!(
            mark_job_running(&conn, backoff.id, true),
            Err(StoreError::Revoked(_))
        ));

        let done = create_job(&conn, g.id, Uuid::new_v4()).unwrap();
        mark_job_running(&conn, done.id, false).unwrap();
        mark_job_completed(&conn, done.id, "done").unwrap();
        assert!(!mark_job_revoked(&conn, done.id, "Analysis revoked", "late").unwrap());
        assert!(get_job(&conn, done.id).unwrap().unwrap().revoked_at.is_none());
    }

    #[test]
    fn test_results_and_validation() {
        let conn = test_db();
        let g = genome(&conn);
        let job = create_job(&conn, g.id, Uuid::new_v4()).unwrap();

        insert_result(&conn, job.id, ResultType::CodonAnalysis, &json!({"genome_length": 10}))
            .unwrap();
        insert_result(&conn, job.id, ResultType::GeneStats, &json!({"total_genes": 3})).unwrap();
        assert_eq!(get_results(&conn, job.id).unwrap().len(), 2);

        let gene = get_result(&conn, job.id, ResultType::GeneStats).unwrap().unwrap();
        assert_eq!(gene.data["total_genes"], 3);
        assert!(get_result(&conn, job.id, ResultType::Charts).unwrap().is_none());

        insert_validation(&conn, job.id, "NC_000913.3", &json!({}), "warning").unwrap();
        insert_validation(&conn, job.id, "NC_000913.3", &json!({}), "passed").unwrap();
        let validation = get_validation(&conn, job.id).unwrap().unwrap();
        assert_eq!(validation.validation_status, "passed");

        assert_eq!(clear_job_outputs(&conn, job.id).unwrap(), 3);
        assert!(get_results(&conn, job.id).unwrap().is_empty());
        assert!(get_validation(&conn, job.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_job_cascades() {
        let conn = test_db();
        let g = genome(&conn);
        let job = create_job(&conn, g.id, Uuid::new_v4()).unwrap();
        mark_job_running(&conn, job.id, false).unwrap();
        insert_result(&conn, job.id, ResultType::GenomeStats, &json!({})).unwrap();
        insert_validation(&conn, job.id, "NC_000913.3", &json!({}), "passed").unwrap();

        assert!(delete_job(&conn, job.id).unwrap());
        assert!(get_job(&conn, job.id).unwrap().is_none());

        let orphans: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM results) + (SELECT COUNT(*) FROM validations)
                      + (SELECT COUNT(*) FROM job_progress)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
        assert!(!delete_job(&conn, job.id).unwrap());
    }

    #[test]
    fn test_list_jobs_newest_first() {
        let conn = test_db();
        let g = genome(&conn);
        let a = create_job(&conn, g.id, Uuid::new_v4()).unwrap();
        let b = create_job(&conn, g.id, Uuid::new_v4()).unwrap();
        let ids: Vec<i64> = list_jobs(&conn, 10, 0).unwrap().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
        assert_eq!(list_jobs(&conn, 1, 1).unwrap()[0].id, a.id);
    }
}
