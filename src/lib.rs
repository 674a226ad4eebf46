// SKS Import - Core Library
// Decoder, dataset builder and reconciliation engine for the SKS
// hospital/department register (SHAK files).

pub mod config;
pub mod dataset;
pub mod db;
pub mod entities;
pub mod error;
pub mod importer;
pub mod input;
pub mod logging;
pub mod parser;
pub mod sink;
pub mod temporal;

// Re-export commonly used types
pub use config::ImporterConfig;
pub use dataset::Dataset;
pub use db::{
    Event, ImportEventType, OrganisationRow, SqliteRecordSink, SqliteRunAudit,
    open_database, setup_database, reconcile_dataset,
    count_current, count_current_by_type, count_history, count_history_for,
    count_invalidated, rows_modified_at, latest_modified_date,
    current_institution, history_for, institution_as_of,
    insert_event, get_events_for_entity,
};
pub use entities::{InstitutionRecord, InstitutionType, OperationCode};
pub use error::{ImportError, Result};
pub use importer::{ImportSummary, SksImporter};
pub use input::{InputKind, locate_input_file, validate_input_structure};
pub use parser::{Decoded, RegisterFile, SkipReason, decode_line, decode_latin9, read_register_file};
pub use sink::{PersistStats, RecordSink, RunAudit, RunOutcome, RunResult, TracingAudit};
pub use temporal::{ValidityWindow, parse_register_date, start_of_day, to_exclusive_end};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
