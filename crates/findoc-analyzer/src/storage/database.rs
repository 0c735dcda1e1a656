//! SQLite job store
//!
//! Terminal transitions are conditional updates on `status = 'processing'`,
//! so a completed or failed row cannot be overwritten.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use super::JobStore;
use crate::error::{Error, Result};
use crate::types::{Job, JobStatus};

/// SQLite-backed [`JobStore`]
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::persistence(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate(true)?;
        Ok(store)
    }

    /// Create an in-memory database (for tests and one-shot runs)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::persistence(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate(false)?;
        Ok(store)
    }

    /// Run database migrations
    fn migrate(&self, on_disk: bool) -> Result<()> {
        let conn = self.conn.lock();

        if on_disk {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                "#,
            )
            .map_err(|e| Error::persistence(format!("Failed to set pragmas: {}", e)))?;
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS analysis_results (
                id TEXT PRIMARY KEY,
                file_name TEXT NOT NULL,
                query TEXT NOT NULL,
                result TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_analysis_results_status ON analysis_results(status);
            CREATE INDEX IF NOT EXISTS idx_analysis_results_created_at ON analysis_results(created_at);
            "#,
        )
        .map_err(|e| Error::persistence(format!("Failed to create schema: {}", e)))?;

        Ok(())
    }

    /// Move a `processing` row to a terminal status
    fn finish(&self, id: &str, status: JobStatus, result: &str) -> Result<()> {
        let conn = self.conn.lock();

        let changed = conn.execute(
            "UPDATE analysis_results SET status = ?2, result = ?3 WHERE id = ?1 AND status = 'processing'",
            params![id, status.as_str(), result],
        )?;

        if changed == 1 {
            return Ok(());
        }

        match current_status(&conn, id)? {
            None => Err(Error::JobNotFound(id.to_string())),
            Some(from) => Err(Error::InvalidTransition {
                job_id: id.to_string(),
                from: from.to_string(),
                to: status.to_string(),
            }),
        }
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, job: &Job) -> Result<()> {
        if job.status != JobStatus::Processing {
            return Err(Error::InvalidTransition {
                job_id: job.id.clone(),
                from: "new".to_string(),
                to: job.status.to_string(),
            });
        }

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO analysis_results (id, file_name, query, result, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                job.id,
                job.file_name,
                job.query,
                job.result,
                job.status.as_str(),
                job.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::persistence(format!("Failed to create job {}: {}", job.id, e)))?;

        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, file_name, query, result, status, created_at FROM analysis_results WHERE id = ?1",
        )?;

        let job = stmt
            .query_row(params![id], row_to_job)
            .optional()
            .map_err(|e| Error::persistence(format!("Failed to get job {}: {}", id, e)))?;

        job.transpose()
    }

    fn complete(&self, id: &str, result: &str) -> Result<()> {
        self.finish(id, JobStatus::Completed, result)
    }

    fn fail(&self, id: &str, message: &str) -> Result<()> {
        self.finish(id, JobStatus::Failed, message)
    }

    fn reset_for_rerun(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();

        let changed = conn.execute(
            "UPDATE analysis_results SET status = 'processing', result = '' \
             WHERE id = ?1 AND status IN ('completed', 'failed')",
            params![id],
        )?;

        if changed == 1 {
            return Ok(());
        }

        match current_status(&conn, id)? {
            None => Err(Error::JobNotFound(id.to_string())),
            Some(from) => Err(Error::InvalidTransition {
                job_id: id.to_string(),
                from: from.to_string(),
                to: JobStatus::Processing.to_string(),
            }),
        }
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<Job>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, file_name, query, result, status, created_at FROM analysis_results \
             ORDER BY created_at DESC LIMIT ?1",
        )?;

        let jobs = stmt
            .query_map(params![limit as i64], row_to_job)
            .map_err(|e| Error::persistence(format!("Failed to list jobs: {}", e)))?
            .map(|row| row.map_err(Error::from).and_then(|job| job))
            .collect::<Result<Vec<_>>>()?;

        Ok(jobs)
    }
}

fn current_status(conn: &Connection, id: &str) -> Result<Option<JobStatus>> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM analysis_results WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    status.map(|s| s.parse()).transpose()
}

/// Row to job; an unknown status surfaces as a persistence error
fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Result<Job>> {
    let id: String = row.get(0)?;
    let file_name: String = row.get(1)?;
    let query: String = row.get(2)?;
    let result: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;

    let status = match status_str.parse::<JobStatus>() {
        Ok(status) => status,
        Err(e) => return Ok(Err(e)),
    };

    Ok(Ok(Job {
        id,
        file_name,
        query,
        result,
        status,
        created_at: parse_timestamp(&created_at_str),
    }))
}

/// RFC 3339, or SQLite's `CURRENT_TIMESTAMP` format for rows written outside this store
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_job(id: &str) -> SqliteJobStore {
        let store = SqliteJobStore::in_memory().unwrap();
        store.create(&Job::with_id(id, "q3.pdf", "Summarize")).unwrap();
        store
    }

    #[test]
    fn test_create_and_get() {
        let store = store_with_job("J1");

        let job = store.get("J1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.file_name, "q3.pdf");
        assert!(job.result.is_empty());
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_terminal_rows_are_immutable() {
        let store = store_with_job("J1");
        store.complete("J1", "report").unwrap();

        let err = store.fail("J1", "late failure").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition { ref from, ref to, .. } if from == "completed" && to == "failed"
        ));
        assert!(store.complete("J1", "other").is_err());

        let job = store.get("J1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, "report");
    }

    #[test]
    fn test_unknown_job() {
        let store = SqliteJobStore::in_memory().unwrap();
        assert!(matches!(store.complete("nope", "x"), Err(Error::JobNotFound(_))));
        assert!(matches!(store.reset_for_rerun("nope"), Err(Error::JobNotFound(_))));
    }

    #[test]
    fn test_reset_for_rerun() {
        let store = store_with_job("J1");
        assert!(store.reset_for_rerun("J1").is_err());

        store.fail("J1", "NotFound").unwrap();
        store.reset_for_rerun("J1").unwrap();

        let job = store.get("J1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.result.is_empty());

        store.complete("J1", "second run").unwrap();
    }

    #[test]
    fn test_duplicate_id_rejected_and_list_recent() {
        let store = store_with_job("J1");
        assert!(matches!(
            store.create(&Job::with_id("J1", "b.pdf", "q")),
            Err(Error::PersistenceFailure(_))
        ));

        store.create(&Job::with_id("J2", "c.pdf", "q")).unwrap();
        let recent = store.list_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(store.list_recent(1).unwrap().len(), 1);
    }

    #[test]
    fn test_list_recent_reports_unreadable_rows() {
        let store = SqliteJobStore::in_memory().unwrap();
        store.create(&Job::with_id("J1", "a.pdf", "q")).unwrap();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO analysis_results (id, file_name, query, status) \
                 VALUES ('J2', X'00FF', 'q', 'processing')",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.list_recent(10),
            Err(Error::PersistenceFailure(_))
        ));
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobs.db");

        {
            let store = SqliteJobStore::new(&path).unwrap();
            store.create(&Job::with_id("J1", "a.pdf", "q")).unwrap();
            store.complete("J1", "done").unwrap();
        }

        let reopened = SqliteJobStore::new(&path).unwrap();
        assert_eq!(reopened.get("J1").unwrap().unwrap().result, "done");
    }
}
