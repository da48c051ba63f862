use std::sync::Arc;
use std::thread;

use genomix_store::{db, Database, JobStatus, NewGenome, ResultType};
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

fn seeded() -> (Database, i64) {
    let database = Database::open_in_memory().unwrap();
    let job_id = database
        .with_conn(|conn| {
            let genome = db::insert_genome(
                conn,
                &NewGenome {
                    accession: "NC_TEST01.1".to_string(),
                    organism: Some("Testus minimus".to_string()),
                    genome_size: Some(120),
                    file_path: "genomes/NC_TEST01.1.gb".to_string(),
                    metadata: json!({}),
                    ..Default::default()
                },
            )?;
            let job = db::create_job(conn, genome.id, Uuid::new_v4())?;
            db::mark_job_running(conn, job.id, false)?;
            Ok(job.id)
        })
        .unwrap();
    (database, job_id)
}

#[test]
fn test_concurrent_progress_never_regresses() {
    let (database, job_id) = seeded();
    let database = Arc::new(database);

    let handles: Vec<_> = [10.0, 35.0, 60.0, 80.0, 90.0]
        .into_iter()
        .map(|progress| {
            let database = Arc::clone(&database);
            thread::spawn(move || {
                database
                    .with_conn(|conn| db::update_job_progress(conn, job_id, progress, "step"))
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let history: Vec<f64> = database
        .with_conn(|conn| db::job_progress_history(conn, job_id))
        .unwrap()
        .into_iter()
        .map(|entry| entry.progress)
        .collect();
    assert!(history.windows(2).all(|w| w[0] < w[1]));

    let job = database.with_conn(|conn| db::get_job(conn, job_id)).unwrap().unwrap();
    assert_eq!(job.progress, 90.0);
    assert_eq!(job.status, JobStatus::Running);
}

#[test]
fn test_rerun_after_clearing_outputs_has_no_duplicates() {
    let (database, job_id) = seeded();
    for _ in 0..2 {
        database
            .with_conn(|conn| {
                db::clear_job_outputs(conn, job_id)?;
                for result_type in [
                    ResultType::CodonAnalysis,
                    ResultType::GeneStats,
                    ResultType::GenomeStats,
                ] {
                    db::insert_result(conn, job_id, result_type, &json!({}))?;
                }
                Ok(())
            })
            .unwrap();
    }
    let results = database.with_conn(|conn| db::get_results(conn, job_id)).unwrap();
    assert_eq!(results.len(), 3);
}
