//! Schema migrations.
//!
//! `schema_version` holds one row per applied step. Each step runs inside its
//! own transaction together with its bookkeeping row, so a crash mid-upgrade
//! leaves the database at the last complete version.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

struct Step {
    version: u32,
    name: &'static str,
    action: Action,
}

enum Action {
    Sql(&'static str),
    /// `ALTER TABLE .. ADD COLUMN`, a no-op when the column is already there.
    AddColumn {
        table: &'static str,
        column: &'static str,
        sql: &'static str,
    },
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "jobs",
        action: Action::Sql(include_str!("sql/001_create_jobs.sql")),
    },
    Step {
        version: 2,
        name: "transcripts",
        action: Action::Sql(include_str!("sql/002_create_transcripts.sql")),
    },
    Step {
        version: 3,
        name: "jobs.claim_token",
        action: Action::AddColumn {
            table: "jobs",
            column: "claim_token",
            sql: include_str!("sql/003_add_claim_token.sql"),
        },
    },
];

/// Latest schema version this build knows about.
pub fn latest_version() -> u32 {
    STEPS.last().map(|s| s.version).unwrap_or(0)
}

/// Brings the schema up to [`latest_version`].
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    let applied = applied_version(conn)?;
    let pending: Vec<&Step> = STEPS.iter().filter(|s| s.version > applied).collect();
    if pending.is_empty() {
        return Ok(());
    }

    for step in pending {
        apply(conn, step).map_err(|e| match e {
            DatabaseError::Migration { .. } => e,
            other => DatabaseError::Migration {
                version: step.version,
                reason: other.to_string(),
            },
        })?;
        log::debug!("Schema at v{} ({})", step.version, step.name);
    }

    log::info!("Schema upgraded from v{} to v{}", applied, latest_version());
    Ok(())
}

/// Highest recorded version, 0 on a fresh database.
pub fn applied_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT IFNULL(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?)
}

fn apply(conn: &Connection, step: &Step) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    match &step.action {
        Action::Sql(sql) => tx.execute_batch(sql)?,
        Action::AddColumn { table, column, sql } => {
            if has_column(&tx, table, column)? {
                log::debug!("{}.{} already present", table, column);
            } else {
                tx.execute_batch(sql)?;
            }
        }
    }
    tx.execute(
        "INSERT INTO schema_version (version, name) VALUES (?1, ?2)",
        params![step.version, step.name],
    )?;
    tx.commit()?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let valid = !table.is_empty() && table.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if !valid {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("refusing to inspect table {:?}", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt.query_map([], |row| row.get::<_, String>("name"))?;
    for name in columns {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        conn
    }

    #[test]
    fn test_fresh_database_reaches_latest() {
        let conn = blank();
        run_all(&conn).unwrap();
        assert_eq!(applied_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn test_second_run_is_noop() {
        let conn = blank();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();
        let rows: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, STEPS.len() as u32);
    }

    #[test]
    fn test_jobs_table_has_queue_columns() {
        let conn = blank();
        run_all(&conn).unwrap();
        for column in ["available_at", "claim_token", "priority", "attempts"] {
            assert!(has_column(&conn, "jobs", column).unwrap(), "{column}");
        }
    }

    #[test]
    fn test_existing_column_is_tolerated() {
        let conn = blank();
        conn.execute_batch(include_str!("sql/001_create_jobs.sql"))
            .unwrap();
        conn.execute_batch("ALTER TABLE jobs ADD COLUMN claim_token TEXT;")
            .unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, name TEXT NOT NULL,
             applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP);
             INSERT INTO schema_version (version, name) VALUES (1, 'jobs');",
        )
        .unwrap();

        run_all(&conn).unwrap();
        assert_eq!(applied_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn test_table_name_is_checked() {
        let conn = blank();
        assert!(has_column(&conn, "jobs; DROP TABLE jobs", "id").is_err());
        assert!(has_column(&conn, "", "id").is_err());
    }

    #[test]
    fn test_transcripts_deleted_with_job() {
        let conn = blank();
        run_all(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO jobs (video_id, source_url, source_kind, created_at, updated_at, available_at)
             VALUES ('v1', 'u', 'youtube', 't', 't', 't');
             INSERT INTO transcripts (job_id, video_id, text, fetched_at)
             VALUES (1, 'v1', 'hello', 't');
             DELETE FROM jobs WHERE id = 1;",
        )
        .unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM transcripts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
