// 🗄️ SQLite Reconciliation Engine
//
// Two tables per register:
//   organisation_history  every validity window ever seen, keyed (nummer, valid_from)
//   organisation          one row per nummer: the last record of the latest batch
//
// History is never deleted. A later file may move a window's valid_to
// (closing it), which updates the existing history row in place.
// All timestamps are stored as fixed-width RFC 3339 UTC text with
// microseconds and a four-digit year, so string comparison in SQL is
// chronological. Validity ends are clamped to year 9999 upstream.

use crate::dataset::Dataset;
use crate::entities::{InstitutionRecord, InstitutionType};
use crate::error::{ImportError, Result};
use crate::sink::{PersistStats, RecordSink, RunAudit, RunOutcome};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

// ============================================================================
// TIMESTAMPS
// ============================================================================

pub fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS organisation (
            nummer TEXT PRIMARY KEY,
            navn TEXT NOT NULL,
            organisationstype TEXT NOT NULL,
            valid_from TEXT NOT NULL,
            valid_to TEXT NOT NULL,
            created_date TEXT NOT NULL,
            modified_date TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS organisation_history (
            nummer TEXT NOT NULL,
            valid_from TEXT NOT NULL,
            navn TEXT NOT NULL,
            organisationstype TEXT NOT NULL,
            valid_to TEXT NOT NULL,
            created_date TEXT NOT NULL,
            modified_date TEXT NOT NULL,
            PRIMARY KEY (nummer, valid_from)
        )",
        [],
    )?;

    // Audit trail of import runs
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_organisation_valid_to ON organisation(valid_to)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_organisation_modified ON organisation(modified_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_history_modified ON organisation_history(modified_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Open (or create) a database file with the schema in place
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    Ok(conn)
}

// ============================================================================
// ROWS
// ============================================================================

/// One row of `organisation` or `organisation_history`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationRow {
    pub nummer: String,
    pub navn: String,
    pub organisationstype: InstitutionType,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

impl OrganisationRow {
    pub fn was_valid_at(&self, time: DateTime<Utc>) -> bool {
        self.valid_from <= time && time < self.valid_to
    }
}

const ROW_COLUMNS: &str =
    "nummer, navn, organisationstype, valid_from, valid_to, created_date, modified_date";

fn row_to_organisation(row: &Row) -> rusqlite::Result<OrganisationRow> {
    let label: String = row.get(2)?;
    let organisationstype = InstitutionType::from_label(&label).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown organisationstype '{}'", label).into(),
        )
    })?;

    Ok(OrganisationRow {
        nummer: row.get(0)?,
        navn: row.get(1)?,
        organisationstype,
        valid_from: time_column(row, 3)?,
        valid_to: time_column(row, 4)?,
        created_date: time_column(row, 5)?,
        modified_date: time_column(row, 6)?,
    })
}

// ============================================================================
// UPSERTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

/// Compared fields as stored: (navn, organisationstype, valid_to)
type HistoryFields = (String, String, String);

fn upsert_history(conn: &Connection, record: &InstitutionRecord, modified: &str) -> Result<Upsert> {
    let valid_from = to_db_time(&record.valid_from());
    let wanted: HistoryFields = (
        record.name().to_string(),
        record.kind().as_str().to_string(),
        to_db_time(&record.valid_to()),
    );

    let existing: Option<HistoryFields> = conn
        .query_row(
            "SELECT navn, organisationstype, valid_to FROM organisation_history
             WHERE nummer = ?1 AND valid_from = ?2",
            params![record.identifier(), valid_from],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    match existing {
        None => {
            conn.execute(
                "INSERT INTO organisation_history (
                    nummer, valid_from, navn, organisationstype, valid_to, created_date, modified_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![record.identifier(), valid_from, wanted.0, wanted.1, wanted.2, modified],
            )?;
            Ok(Upsert::Inserted)
        }
        Some(stored) if stored == wanted => Ok(Upsert::Unchanged),
        Some(_) => {
            conn.execute(
                "UPDATE organisation_history
                 SET navn = ?3, organisationstype = ?4, valid_to = ?5, modified_date = ?6
                 WHERE nummer = ?1 AND valid_from = ?2",
                params![record.identifier(), valid_from, wanted.0, wanted.1, wanted.2, modified],
            )?;
            Ok(Upsert::Updated)
        }
    }
}

/// Compared fields as stored: (navn, organisationstype, valid_from, valid_to)
type CurrentFields = (String, String, String, String);

fn upsert_current(conn: &Connection, record: &InstitutionRecord, modified: &str) -> Result<Upsert> {
    let wanted: CurrentFields = (
        record.name().to_string(),
        record.kind().as_str().to_string(),
        to_db_time(&record.valid_from()),
        to_db_time(&record.valid_to()),
    );

    let existing: Option<CurrentFields> = conn
        .query_row(
            "SELECT navn, organisationstype, valid_from, valid_to FROM organisation WHERE nummer = ?1",
            params![record.identifier()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    match existing {
        None => {
            conn.execute(
                "INSERT INTO organisation (
                    nummer, navn, organisationstype, valid_from, valid_to, created_date, modified_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![record.identifier(), wanted.0, wanted.1, wanted.2, wanted.3, modified],
            )?;
            Ok(Upsert::Inserted)
        }
        Some(stored) if stored == wanted => Ok(Upsert::Unchanged),
        Some(_) => {
            conn.execute(
                "UPDATE organisation
                 SET navn = ?2, organisationstype = ?3, valid_from = ?4, valid_to = ?5, modified_date = ?6
                 WHERE nummer = ?1",
                params![record.identifier(), wanted.0, wanted.1, wanted.2, wanted.3, modified],
            )?;
            Ok(Upsert::Updated)
        }
    }
}

/// Merge a dataset into both tables on an open connection/transaction
///
/// Every record lands in history. The current table receives, per
/// nummer, the record that comes last in the dataset; earlier records
/// for the same nummer never reach it, so re-running a file does not
/// bounce the row between versions.
pub fn reconcile_dataset(
    conn: &Connection,
    dataset: &Dataset,
    transaction_time: &DateTime<Utc>,
) -> Result<PersistStats> {
    let modified = to_db_time(transaction_time);
    let current = dataset.current_by_identifier();
    let mut stats = PersistStats::default();

    for record in dataset {
        match upsert_history(conn, record, &modified)? {
            Upsert::Inserted => stats.history_inserted += 1,
            Upsert::Updated => stats.history_updated += 1,
            Upsert::Unchanged => stats.unchanged += 1,
        }

        let is_last_for_nummer = current
            .get(record.identifier())
            .map_or(false, |last| std::ptr::eq(*last, record));
        if !is_last_for_nummer {
            continue;
        }

        match upsert_current(conn, record, &modified)? {
            Upsert::Inserted => stats.current_inserted += 1,
            Upsert::Updated => stats.current_updated += 1,
            Upsert::Unchanged => stats.unchanged += 1,
        }
    }

    Ok(stats)
}

// ============================================================================
// SQLITE RECORD SINK
// ============================================================================

/// RecordSink backed by a shared SQLite connection
pub struct SqliteRecordSink {
    conn: Arc<Mutex<Connection>>,
    transaction_time: Option<DateTime<Utc>>,
}

fn lock(conn: &Arc<Mutex<Connection>>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| ImportError::Persistence(format!("connection lock poisoned: {}", e)))
}

impl SqliteRecordSink {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        SqliteRecordSink {
            conn,
            transaction_time: None,
        }
    }

    /// Timestamp of the current run, if one was started
    pub fn transaction_time(&self) -> Option<DateTime<Utc>> {
        self.transaction_time
    }
}

impl RecordSink for SqliteRecordSink {
    fn reset_transaction_time(&mut self) -> Result<DateTime<Utc>> {
        // Same precision as the stored modified_date
        let now = Utc::now().trunc_subsecs(6);
        self.transaction_time = Some(now);
        debug!(transaction_time = %to_db_time(&now), "transaction time reset");
        Ok(now)
    }

    fn persist_delta_dataset(&mut self, dataset: &Dataset) -> Result<PersistStats> {
        let transaction_time = match self.transaction_time {
            Some(time) => time,
            None => self.reset_transaction_time()?,
        };

        let mut guard = lock(&self.conn)?;
        let tx = guard.transaction()?;
        let stats = reconcile_dataset(&tx, dataset, &transaction_time)?;
        tx.commit()?;

        info!(
            records = dataset.len(),
            history_inserted = stats.history_inserted,
            history_updated = stats.history_updated,
            current_inserted = stats.current_inserted,
            current_updated = stats.current_updated,
            unchanged = stats.unchanged,
            "dataset persisted"
        );

        Ok(stats)
    }
}

// ============================================================================
// EVENTS (audit trail)
// ============================================================================

pub const IMPORT_ENTITY_TYPE: &str = "sks_import";

/// What happened to an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportEventType {
    ImportCompleted,
    ImportFailed,
}

impl ImportEventType {
    pub fn for_outcome(outcome: &RunOutcome) -> Self {
        if outcome.is_ok() {
            ImportEventType::ImportCompleted
        } else {
            ImportEventType::ImportFailed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportEventType::ImportCompleted => "import_completed",
            ImportEventType::ImportFailed => "import_failed",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "import_completed" => Some(ImportEventType::ImportCompleted),
            "import_failed" => Some(ImportEventType::ImportFailed),
            _ => None,
        }
    }
}

/// One audited import run, keyed by run id
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: ImportEventType,
    pub entity_type: String,
    /// Run id the importer was called with
    pub entity_id: String,
    /// Serialized RunOutcome
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn for_run(outcome: &RunOutcome) -> Result<Self> {
        Ok(Event {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: outcome.finished_at,
            event_type: ImportEventType::for_outcome(outcome),
            entity_type: IMPORT_ENTITY_TYPE.to_string(),
            entity_id: outcome.run_id.clone(),
            data: serde_json::to_value(outcome)?,
            actor: outcome.service.clone(),
        })
    }
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            to_db_time(&event.timestamp),
            event.event_type.as_str(),
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;
            let raw_type: String = row.get(2)?;
            let event_type = ImportEventType::from_label(&raw_type).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("unknown event type '{}'", raw_type).into(),
                )
            })?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: time_column(row, 1)?,
                event_type,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

/// RunAudit that appends one event per run to the `events` table
pub struct SqliteRunAudit {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRunAudit {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        SqliteRunAudit { conn }
    }
}

impl RunAudit for SqliteRunAudit {
    fn record(&mut self, outcome: &RunOutcome) -> Result<()> {
        let event = Event::for_run(outcome)?;

        let guard = lock(&self.conn)?;
        insert_event(&guard, &event).map_err(|e| ImportError::Audit(e.to_string()))
    }
}

// ============================================================================
// QUERIES
// ============================================================================

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<i64> {
    Ok(conn.query_row(sql, params, |row| row.get(0))?)
}

pub fn count_current(conn: &Connection) -> Result<i64> {
    count(conn, "SELECT COUNT(*) FROM organisation", [])
}

pub fn count_current_by_type(conn: &Connection, kind: InstitutionType) -> Result<i64> {
    count(
        conn,
        "SELECT COUNT(*) FROM organisation WHERE organisationstype = ?1",
        params![kind.as_str()],
    )
}

pub fn count_history(conn: &Connection) -> Result<i64> {
    count(conn, "SELECT COUNT(*) FROM organisation_history", [])
}

pub fn count_history_for(conn: &Connection, nummer: &str) -> Result<i64> {
    count(
        conn,
        "SELECT COUNT(*) FROM organisation_history WHERE nummer = ?1",
        params![nummer],
    )
}

/// Current rows whose validity has ended at `now` (valid_to <= now)
pub fn count_invalidated(conn: &Connection, now: &DateTime<Utc>) -> Result<i64> {
    count(
        conn,
        "SELECT COUNT(*) FROM organisation WHERE valid_to <= ?1",
        params![to_db_time(now)],
    )
}

/// Rows in either table stamped with the given modification time
pub fn rows_modified_at(conn: &Connection, transaction_time: &DateTime<Utc>) -> Result<i64> {
    let stamp = to_db_time(transaction_time);
    Ok(count(
        conn,
        "SELECT COUNT(*) FROM organisation WHERE modified_date = ?1",
        params![stamp],
    )? + count(
        conn,
        "SELECT COUNT(*) FROM organisation_history WHERE modified_date = ?1",
        params![stamp],
    )?)
}

pub fn latest_modified_date(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> =
        conn.query_row("SELECT MAX(modified_date) FROM organisation", [], |row| row.get(0))?;

    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ImportError::Persistence(format!("bad modified_date '{}': {}", s, e)))
    })
    .transpose()
}

pub fn current_institution(conn: &Connection, nummer: &str) -> Result<Option<OrganisationRow>> {
    let sql = format!("SELECT {} FROM organisation WHERE nummer = ?1", ROW_COLUMNS);
    Ok(conn
        .query_row(&sql, params![nummer], row_to_organisation)
        .optional()?)
}

/// All validity windows of a nummer, oldest first
pub fn history_for(conn: &Connection, nummer: &str) -> Result<Vec<OrganisationRow>> {
    let sql = format!(
        "SELECT {} FROM organisation_history WHERE nummer = ?1 ORDER BY valid_from",
        ROW_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![nummer], row_to_organisation)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// The history entry of a nummer that was valid at `time`
pub fn institution_as_of(
    conn: &Connection,
    nummer: &str,
    time: &DateTime<Utc>,
) -> Result<Option<OrganisationRow>> {
    let sql = format!(
        "SELECT {} FROM organisation_history
         WHERE nummer = ?1 AND valid_from <= ?2 AND valid_to > ?2",
        ROW_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![nummer, to_db_time(time)], row_to_organisation)
        .optional()?)
}

// ============================================================================
// TESTS
// ============================================================================
