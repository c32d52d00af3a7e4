//! Raw SQL for the `jobs` and `transcripts` tables.
//!
//! Status transitions are guarded in SQL (`WHERE status = ...`) so a caller
//! holding a stale view of a job cannot overwrite a newer state. Each
//! guarded function reports whether a row was actually changed.

use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};

use super::{Database, DatabaseError};

/// One `jobs` row with enums and JSON still in their stored form.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: i64,
    pub video_id: String,
    pub source_url: String,
    pub source_kind: String,
    pub status: String,
    pub priority: i32,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
    pub processed_at: Option<String>,
    pub available_at: String,
    pub claim_token: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            video_id: row.get("video_id")?,
            source_url: row.get("source_url")?,
            source_kind: row.get("source_kind")?,
            status: row.get("status")?,
            priority: row.get("priority")?,
            attempts: row.get("attempts")?,
            last_error: row.get("last_error")?,
            metadata: row.get("metadata")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            processed_at: row.get("processed_at")?,
            available_at: row.get("available_at")?,
            claim_token: row.get("claim_token")?,
        })
    }
}

/// Values for a job about to be inserted.
#[derive(Debug, Clone)]
pub struct NewJobRow<'a> {
    pub video_id: &'a str,
    pub source_url: &'a str,
    pub source_kind: &'a str,
    pub priority: i32,
    pub metadata: &'a str,
    pub now: &'a str,
}

/// Column filters for [`query`]; `None` matches everything.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<String>,
    pub source_kind: Option<String>,
    pub video_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a job unless an active (pending or processing) job for the same
/// video already exists.
///
/// Returns `(id, inserted)`; when `inserted` is false the id belongs to the
/// existing job.
pub fn insert_unless_active(
    db: &Database,
    job: &NewJobRow<'_>,
) -> Result<(i64, bool), DatabaseError> {
    db.with_conn(|conn| {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM jobs WHERE video_id = ?1
                 AND status IN ('pending', 'processing') ORDER BY id LIMIT 1",
                params![job.video_id],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            tx.commit()?;
            return Ok((id, false));
        }

        tx.execute(
            "INSERT INTO jobs (video_id, source_url, source_kind, status, priority, attempts,
             metadata, created_at, updated_at, available_at)
             VALUES (?1, ?2, ?3, 'pending', ?4, 0, ?5, ?6, ?6, ?6)",
            params![
                job.video_id,
                job.source_url,
                job.source_kind,
                job.priority,
                job.metadata,
                job.now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok((id, true))
    })
}

/// Atomically claims up to `limit` claimable pending jobs.
///
/// The selection and the status flip happen in one conditional `UPDATE`,
/// so two overlapping claimers can never receive the same row. Rows are
/// returned in dequeue order.
pub fn claim_pending(
    db: &Database,
    limit: u32,
    now: &str,
    claim_token: &str,
) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let mut rows = {
            let mut stmt = tx.prepare(
                "UPDATE jobs
                 SET status = 'processing', attempts = attempts + 1,
                     updated_at = ?1, claim_token = ?2
                 WHERE id IN (
                     SELECT id FROM jobs
                     WHERE status = 'pending' AND available_at <= ?1
                     ORDER BY priority ASC, created_at ASC, id ASC
                     LIMIT ?3
                 ) AND status = 'pending'
                 RETURNING *",
            )?;
            let rows = stmt
                .query_map(params![now, claim_token, limit], JobRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        tx.commit()?;

        // RETURNING does not guarantee any particular order.
        rows.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(rows)
    })
}

/// Moves a processing job to a terminal status.
///
/// Only the holder of `claim_token` may finish the job; a worker whose
/// claim was recovered and handed to someone else changes nothing.
pub fn finish(
    db: &Database,
    id: i64,
    claim_token: &str,
    status: &str,
    last_error: Option<&str>,
    metadata: Option<&str>,
    now: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = ?3, last_error = ?4,
             metadata = COALESCE(?5, metadata),
             updated_at = ?6, processed_at = ?6, claim_token = NULL
             WHERE id = ?1 AND status = 'processing' AND claim_token = ?2",
            params![id, claim_token, status, last_error, metadata, now],
        )?;
        Ok(changed == 1)
    })
}

/// Returns a processing job to `pending`, keeping its attempt count and
/// deferring the next claim until `available_at`.
pub fn release(
    db: &Database,
    id: i64,
    claim_token: &str,
    last_error: &str,
    metadata: &str,
    available_at: &str,
    now: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'pending', last_error = ?3, metadata = ?4,
             available_at = ?5, updated_at = ?6, claim_token = NULL
             WHERE id = ?1 AND status = 'processing' AND claim_token = ?2",
            params![id, claim_token, last_error, metadata, available_at, now],
        )?;
        Ok(changed == 1)
    })
}

/// Writes checkpoint metadata for a job still held under `claim_token`.
/// Also refreshes `updated_at`, which keeps the job out of stale recovery.
pub fn checkpoint(
    db: &Database,
    id: i64,
    claim_token: &str,
    metadata: &str,
    now: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET metadata = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'processing' AND claim_token = ?2",
            params![id, claim_token, metadata, now],
        )?;
        Ok(changed == 1)
    })
}

/// Resets a failed or skipped job to `pending` with a fresh attempt budget.
///
/// Refuses when another active job already exists for the same video.
pub fn reset_for_retry(db: &Database, id: i64, now: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'pending', attempts = 0, last_error = NULL,
             processed_at = NULL, available_at = ?2, updated_at = ?2, claim_token = NULL
             WHERE id = ?1 AND status IN ('error', 'skipped')
             AND NOT EXISTS (
                 SELECT 1 FROM jobs AS other
                 WHERE other.video_id = jobs.video_id
                 AND other.id != jobs.id
                 AND other.status IN ('pending', 'processing')
             )",
            params![id, now],
        )?;
        Ok(changed == 1)
    })
}

/// Takes back jobs stuck in `processing` since before `cutoff`.
///
/// Jobs with attempts left go back to `pending`; jobs that already used
/// `max_attempts` end in `error`. Returns `(requeued, abandoned)`.
pub fn recover_stale(
    db: &Database,
    cutoff: &str,
    now: &str,
    max_attempts: u32,
) -> Result<(usize, usize), DatabaseError> {
    db.with_conn(|conn| {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let abandoned = tx.execute(
            "UPDATE jobs SET status = 'error', claim_token = NULL,
             last_error = 'interrupted on its last attempt',
             updated_at = ?2, processed_at = ?2
             WHERE status = 'processing' AND updated_at < ?1 AND attempts >= ?3",
            params![cutoff, now, max_attempts],
        )?;
        let requeued = tx.execute(
            "UPDATE jobs SET status = 'pending', claim_token = NULL,
             last_error = 'recovered after an interrupted run',
             available_at = ?2, updated_at = ?2
             WHERE status = 'processing' AND updated_at < ?1",
            params![cutoff, now],
        )?;
        tx.commit()?;
        Ok((requeued, abandoned))
    })
}

/// Overwrites the metadata JSON of a job that is not being processed.
pub fn update_metadata(
    db: &Database,
    id: i64,
    metadata: &str,
    now: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET metadata = ?2, updated_at = ?3
             WHERE id = ?1 AND status != 'processing'",
            params![id, metadata, now],
        )?;
        Ok(changed == 1)
    })
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], JobRow::from_row)
            .optional()?;
        Ok(row)
    })
}

const FILTER_WHERE: &str = "WHERE (?1 IS NULL OR status = ?1)
       AND (?2 IS NULL OR source_kind = ?2)
       AND (?3 IS NULL OR video_id = ?3)";

/// Jobs matching `filter`, newest first, with the unpaginated match count.
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    let status = filter.status.as_deref();
    let source_kind = filter.source_kind.as_deref();
    let video_id = filter.video_id.as_deref();
    let limit = i64::try_from(filter.limit.unwrap_or(100)).unwrap_or(i64::MAX);
    let offset = i64::try_from(filter.offset.unwrap_or(0)).unwrap_or(i64::MAX);

    db.with_conn(|conn| {
        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM jobs {FILTER_WHERE}"),
            params![status, source_kind, video_id],
            |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM jobs {FILTER_WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT ?4 OFFSET ?5"
        ))?;
        let rows = stmt
            .query_map(
                params![status, source_kind, video_id, limit, offset],
                JobRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Counts jobs grouped by status. Statuses without jobs are absent.
pub fn count_by_status(db: &Database) -> Result<Vec<(String, u64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let counts = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    })
}

/// Deletes a job (and its transcript). Returns whether a row was removed.
pub fn delete(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(changed == 1)
    })
}

/// Deletes every job with the given status. Returns the number removed.
pub fn delete_by_status(db: &Database, status: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| Ok(conn.execute("DELETE FROM jobs WHERE status = ?1", params![status])?))
}

/// Stores (or replaces) the transcript text for a job held under
/// `claim_token`. Returns false when the claim is no longer current.
pub fn upsert_transcript(
    db: &Database,
    job_id: i64,
    claim_token: &str,
    video_id: &str,
    text: &str,
    now: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "INSERT INTO transcripts (job_id, video_id, text, fetched_at)
             SELECT ?1, ?3, ?4, ?5 WHERE EXISTS (
                 SELECT 1 FROM jobs WHERE id = ?1 AND claim_token = ?2
             )
             ON CONFLICT(job_id) DO UPDATE SET text = excluded.text,
               fetched_at = excluded.fetched_at",
            params![job_id, claim_token, video_id, text, now],
        )?;
        Ok(changed == 1)
    })
}

/// Loads the stored transcript text for a job.
pub fn find_transcript(db: &Database, job_id: i64) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let text = conn
            .query_row(
                "SELECT text FROM transcripts WHERE job_id = ?1",
                params![job_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(text)
    })
}
