//! SQLite persistence for genomes, analysis jobs and their outputs.
//!
//! Queries are free functions over a borrowed [`rusqlite::Connection`] in
//! [`db`]; [`Database`] owns a connection behind a mutex so it can be shared
//! between worker tasks.

pub mod db;
pub mod model;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use thiserror::Error;

pub use model::{
    Genome, Job, JobStatus, NewGenome, ProgressEntry, ResultType, StoredResult, ValidationRecord,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid stored payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("job {0} not found")]
    JobNotFound(i64),
    #[error("genome {0} not found")]
    GenomeNotFound(String),
    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: i64,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("job {0} was revoked")]
    Revoked(i64),
    #[error("database connection lock poisoned")]
    Poisoned,
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) the database file and its schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        db::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genomix.db");
        let db = Database::open(&path).unwrap();
        let genome = db
            .with_conn(|conn| {
                db::insert_genome(
                    conn,
                    &NewGenome {
                        accession: "NC_TEST01.1".to_string(),
                        file_path: "x.gb".to_string(),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        drop(db);

        let reopened = Database::open(&path).unwrap();
        let found = reopened
            .with_conn(|conn| db::get_genome_by_accession(conn, "NC_TEST01.1"))
            .unwrap();
        assert_eq!(found.map(|g| g.id), Some(genome.id));
    }
}
