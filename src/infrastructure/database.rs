use crate::domain::SubmissionRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Identifier already exists: {0}")]
    Conflict(String),

    #[error("Submission not found: {0}")]
    NotFound(String),

    #[error("Submissions table is missing or incomplete: {0}")]
    Schema(String),

    #[error("Permission denied by store: {0}")]
    Permission(String),

    #[error("Store unreachable: {0}")]
    Transport(String),

    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Conflict(_) => "conflict",
            StoreError::NotFound(_) => "not_found",
            StoreError::Schema(_) => "schema",
            StoreError::Permission(_) => "permission",
            StoreError::Transport(_) => "transport",
            StoreError::Backend(_) => "backend",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let detail = message.clone().unwrap_or_else(|| err.to_string());
                match failure.code {
                    ErrorCode::ConstraintViolation => StoreError::Conflict(detail),
                    ErrorCode::PermissionDenied
                    | ErrorCode::ReadOnly
                    | ErrorCode::AuthorizationForStatementDenied => StoreError::Permission(detail),
                    ErrorCode::CannotOpen | ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                        StoreError::Transport(detail)
                    }
                    _ if detail.contains("no such table") || detail.contains("no such column") => {
                        StoreError::Schema(detail)
                    }
                    _ => StoreError::Backend(detail),
                }
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// The single way into persistent storage.
///
/// `fetch_by_identifier` reports a missing record as `Ok(None)`; the other
/// operations use `StoreError::NotFound`.
pub trait SubmissionStore: Send + Sync {
    fn insert<'a>(&'a self, record: &'a SubmissionRecord) -> StoreFuture<'a, SubmissionRecord>;

    fn fetch_by_identifier<'a>(
        &'a self,
        identifier: &'a str,
    ) -> StoreFuture<'a, Option<SubmissionRecord>>;

    fn exists_by_identifier<'a>(&'a self, identifier: &'a str) -> StoreFuture<'a, bool>;

    /// Attaches the rendered certificate. Fails with `Conflict` when the
    /// record already carries one.
    fn update_rendered_image<'a>(
        &'a self,
        identifier: &'a str,
        image: &'a str,
    ) -> StoreFuture<'a, SubmissionRecord>;

    fn count(&self) -> StoreFuture<'_, usize>;
}

const SELECT_COLUMNS: &str = "SELECT ndn, title, student_name, institution, faculty, department,
        submission_type, ncvs_compliance, academic_report, submission_date,
        contribution_amount, certificate_image
     FROM submissions";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        debug!("Opened SQLite store at {}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS submissions (
                ndn TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                student_name TEXT NOT NULL,
                institution TEXT NOT NULL,
                faculty TEXT NOT NULL,
                department TEXT NOT NULL,
                submission_type TEXT NOT NULL,
                ncvs_compliance TEXT NOT NULL,
                academic_report TEXT NOT NULL,
                submission_date TEXT NOT NULL,
                contribution_amount TEXT NOT NULL,
                certificate_image TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_submission_date ON submissions(submission_date)",
            [],
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))
    }

    fn row_to_record(row: &rusqlite::Row) -> Result<SubmissionRecord, rusqlite::Error> {
        let submitted: String = row.get(9)?;
        let submission_timestamp = DateTime::parse_from_rfc3339(&submitted)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(SubmissionRecord {
            identifier: row.get(0)?,
            title: row.get(1)?,
            student_name: row.get(2)?,
            institution: row.get(3)?,
            faculty: row.get(4)?,
            department: row.get(5)?,
            submission_type: row.get(6)?,
            compliance_status: row.get(7)?,
            academic_report_status: row.get(8)?,
            submission_timestamp,
            contribution_amount: row.get(10)?,
            rendered_image: row.get(11)?,
        })
    }

    fn select(conn: &Connection, identifier: &str) -> Result<Option<SubmissionRecord>, StoreError> {
        let record = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE ndn = ?1"),
                params![identifier],
                Self::row_to_record,
            )
            .optional()?;

        Ok(record)
    }

    fn exists(conn: &Connection, identifier: &str) -> Result<bool, StoreError> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM submissions WHERE ndn = ?1)",
            params![identifier],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    fn insert_sync(&self, record: &SubmissionRecord) -> Result<SubmissionRecord, StoreError> {
        let conn = self.lock()?;

        let inserted = conn.execute(
            "INSERT INTO submissions (ndn, title, student_name, institution, faculty, department,
                submission_type, ncvs_compliance, academic_report, submission_date,
                contribution_amount, certificate_image)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &record.identifier,
                &record.title,
                &record.student_name,
                &record.institution,
                &record.faculty,
                &record.department,
                &record.submission_type,
                &record.compliance_status,
                &record.academic_report_status,
                record
                    .submission_timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                &record.contribution_amount,
                &record.rendered_image,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::Conflict(record.identifier.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        Self::select(&conn, &record.identifier)?
            .ok_or_else(|| StoreError::Backend("inserted row could not be read back".to_string()))
    }

    fn update_image_sync(
        &self,
        identifier: &str,
        image: &str,
    ) -> Result<SubmissionRecord, StoreError> {
        let conn = self.lock()?;

        let changed = conn.execute(
            "UPDATE submissions SET certificate_image = ?2
             WHERE ndn = ?1 AND certificate_image IS NULL",
            params![identifier, image],
        )?;

        if changed == 0 {
            return if Self::exists(&conn, identifier)? {
                Err(StoreError::Conflict(format!(
                    "{identifier} already has a rendered image"
                )))
            } else {
                Err(StoreError::NotFound(identifier.to_string()))
            };
        }

        Self::select(&conn, identifier)?.ok_or_else(|| StoreError::NotFound(identifier.to_string()))
    }
}

impl SubmissionStore for SqliteStore {
    fn insert<'a>(&'a self, record: &'a SubmissionRecord) -> StoreFuture<'a, SubmissionRecord> {
        Box::pin(async move { self.insert_sync(record) })
    }

    fn fetch_by_identifier<'a>(
        &'a self,
        identifier: &'a str,
    ) -> StoreFuture<'a, Option<SubmissionRecord>> {
        Box::pin(async move {
            let conn = self.lock()?;
            Self::select(&conn, identifier)
        })
    }

    fn exists_by_identifier<'a>(&'a self, identifier: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let conn = self.lock()?;
            Self::exists(&conn, identifier)
        })
    }

    fn update_rendered_image<'a>(
        &'a self,
        identifier: &'a str,
        image: &'a str,
    ) -> StoreFuture<'a, SubmissionRecord> {
        Box::pin(async move { self.update_image_sync(identifier, image) })
    }

    fn count(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let conn = self.lock()?;
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}
