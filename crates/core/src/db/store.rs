use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::db::{RunMetadata, RunRecord, RunStatus};
use crate::model::{FunctionSummary, SignatureMatch};
use crate::params::{ConfigParameter, ParamCategory};
use crate::services::analysis::AnalysisReport;

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Failed to encode column as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// SQLite history of analysis runs and their headline results.
#[derive(Debug)]
pub struct RunStore {
    conn: Connection,
}

impl RunStore {
    /// Open (or create) a store at `path` and bring the schema up to date.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Persist one run with its matches, functions and parameters. Returns the run id.
    pub fn record_run(&self, meta: &RunMetadata, report: &AnalysisReport) -> StoreResult<i64> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO runs (firmware, firmware_hash, backend, backend_version, catalog_version,
                              status, match_count, function_count, skipped_ranges, started_at, finished_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                meta.firmware,
                meta.firmware_hash,
                report.backend.name,
                report.backend.version,
                meta.catalog_version,
                meta.status.as_str(),
                report.matches.len() as i64,
                report.functions.len() as i64,
                report.diagnostics.skipped_ranges as i64,
                meta.started_at,
                meta.finished_at,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO run_matches (run_id, idx, signature_name, match_offset, confidence, source_hint)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for (idx, m) in report.matches.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    idx as i64,
                    m.signature_name,
                    m.candidate_offset as i64,
                    m.confidence,
                    m.source_hint
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO run_functions (run_id, name, start_offset, end_offset, address, call_targets, data_references)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for f in &report.functions {
                stmt.execute(params![
                    run_id,
                    f.name,
                    f.start as i64,
                    f.end as i64,
                    f.address as i64,
                    serde_json::to_string(&f.call_targets)?,
                    serde_json::to_string(&f.data_references)?
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO run_parameters (run_id, category, value, source_offset)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;
            for p in report.parameters.values().flatten() {
                stmt.execute(params![
                    run_id,
                    p.category.as_str(),
                    serde_json::to_string(&p.value)?,
                    p.source_offset as i64
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(run_id, firmware = %meta.firmware, "recorded run");
        Ok(run_id)
    }

    /// Runs in insertion order, optionally for one firmware name.
    pub fn list_runs(&self, firmware: Option<&str>) -> StoreResult<Vec<RunRecord>> {
        fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
            let status: String = row.get(6)?;
            Ok(RunRecord {
                id: row.get(0)?,
                firmware: row.get(1)?,
                firmware_hash: row.get(2)?,
                backend: row.get(3)?,
                backend_version: row.get(4)?,
                catalog_version: row.get(5)?,
                status: status.parse::<RunStatus>().map_err(|e| conversion_error(6, e))?,
                match_count: row.get(7)?,
                function_count: row.get(8)?,
                skipped_ranges: row.get(9)?,
                started_at: row.get(10)?,
                finished_at: row.get(11)?,
            })
        }

        const COLUMNS: &str = "id, firmware, firmware_hash, backend, backend_version, catalog_version, \
                               status, match_count, function_count, skipped_ranges, started_at, finished_at";
        let rows = if let Some(name) = firmware {
            let mut stmt = self
                .conn
                .prepare(&format!("SELECT {COLUMNS} FROM runs WHERE firmware = ?1 ORDER BY id"))?;
            let rows = stmt.query_map(params![name], map_run)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            let mut stmt = self.conn.prepare(&format!("SELECT {COLUMNS} FROM runs ORDER BY id"))?;
            let rows = stmt.query_map([], map_run)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
    }

    pub fn latest_run_id(&self, firmware: &str) -> StoreResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM runs WHERE firmware = ?1 ORDER BY id DESC LIMIT 1",
                params![firmware],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn load_matches(&self, run_id: i64) -> StoreResult<Vec<SignatureMatch>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT signature_name, match_offset, confidence, source_hint
            FROM run_matches
            WHERE run_id = ?1
            ORDER BY idx
            "#,
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(SignatureMatch {
                signature_name: row.get(0)?,
                candidate_offset: row.get::<_, i64>(1)? as u64,
                confidence: row.get(2)?,
                source_hint: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Functions of a run without instruction records, ordered by start.
    pub fn load_functions(&self, run_id: i64) -> StoreResult<Vec<FunctionSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT name, start_offset, end_offset, address, call_targets, data_references
            FROM run_functions
            WHERE run_id = ?1
            ORDER BY start_offset, id
            "#,
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(FunctionSummary {
                name: row.get(0)?,
                start: row.get::<_, i64>(1)? as u64,
                end: row.get::<_, i64>(2)? as u64,
                address: row.get::<_, i64>(3)? as u64,
                instructions: Vec::new(),
                call_targets: json_set(row, 4)?,
                data_references: json_set(row, 5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn load_parameters(&self, run_id: i64) -> StoreResult<Vec<ConfigParameter>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT category, value, source_offset
            FROM run_parameters
            WHERE run_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            let category: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok(ConfigParameter {
                category: category.parse::<ParamCategory>().map_err(|e| conversion_error(0, e))?,
                value: serde_json::from_str(&value)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
                source_offset: row.get::<_, i64>(2)? as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn json_set(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<BTreeSet<u64>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// Apply schema migrations using `PRAGMA user_version`.
///
/// Version map:
/// - 0: no schema
/// - 1: runs table
/// - 2: per-run matches, functions and parameters
fn apply_migrations(conn: &Connection) -> StoreResult<()> {
    let current_version = current_schema_version(conn)?;

    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version < 1 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS runs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                firmware        TEXT NOT NULL,
                firmware_hash   TEXT,
                backend         TEXT NOT NULL,
                backend_version TEXT,
                catalog_version TEXT NOT NULL,
                status          TEXT NOT NULL,
                match_count     INTEGER NOT NULL,
                function_count  INTEGER NOT NULL,
                skipped_ranges  INTEGER NOT NULL,
                started_at      TEXT NOT NULL,
                finished_at     TEXT NOT NULL
            );
            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS run_matches (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id         INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
                idx            INTEGER NOT NULL,
                signature_name TEXT NOT NULL,
                match_offset   INTEGER NOT NULL,
                confidence     REAL NOT NULL,
                source_hint    TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS run_functions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id          INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                start_offset    INTEGER NOT NULL,
                end_offset      INTEGER NOT NULL,
                address         INTEGER NOT NULL,
                call_targets    TEXT NOT NULL,
                data_references TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS run_parameters (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id        INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
                category      TEXT NOT NULL,
                value         TEXT NOT NULL,
                source_offset INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_run_functions_run ON run_functions(run_id);
            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

fn current_schema_version(conn: &Connection) -> StoreResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
