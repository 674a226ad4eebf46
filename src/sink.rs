// 🔌 Capabilities the importer drives
//
// RecordSink: where a dataset is reconciled (history + current tables).
// RunAudit:   where the outcome of a run is recorded.
// Both are passed to the importer explicitly.

use crate::dataset::Dataset;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info};

/// Service name used in audit records
pub const SERVICE_NAME: &str = "sksimporter";

// ============================================================================
// RECORD SINK
// ============================================================================

/// Row counts produced by one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistStats {
    pub history_inserted: usize,
    pub history_updated: usize,
    pub current_inserted: usize,
    pub current_updated: usize,
    /// History or current rows that were already up to date
    pub unchanged: usize,
}

impl PersistStats {
    pub fn rows_touched(&self) -> usize {
        self.history_inserted + self.history_updated + self.current_inserted + self.current_updated
    }
}

pub trait RecordSink {
    /// Start a new modification timestamp shared by every row of the run
    ///
    /// Called once per run, after the directory check and before the
    /// input file is read.
    fn reset_transaction_time(&mut self) -> Result<DateTime<Utc>>;

    /// Reconcile a dataset atomically: every row or none
    fn persist_delta_dataset(&mut self, dataset: &Dataset) -> Result<PersistStats>;
}

// ============================================================================
// RUN AUDIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunResult {
    Ok,
    Error(String),
}

/// Outcome of one importer run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub service: String,
    /// Caller-supplied run identifier (message id)
    pub run_id: String,
    pub input_path: PathBuf,
    /// SHA-256 of the input file, when it was read
    pub input_sha256: Option<String>,
    pub records_processed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub result: RunResult,
}

impl RunOutcome {
    pub fn succeeded(run_id: &str, input_path: PathBuf, records_processed: usize, started_at: DateTime<Utc>) -> Self {
        RunOutcome {
            service: SERVICE_NAME.to_string(),
            run_id: run_id.to_string(),
            input_path,
            input_sha256: None,
            records_processed,
            started_at,
            finished_at: Utc::now(),
            result: RunResult::Ok,
        }
    }

    pub fn failed(run_id: &str, input_path: PathBuf, cause: &str, started_at: DateTime<Utc>) -> Self {
        RunOutcome {
            service: SERVICE_NAME.to_string(),
            run_id: run_id.to_string(),
            input_path,
            input_sha256: None,
            records_processed: 0,
            started_at,
            finished_at: Utc::now(),
            result: RunResult::Error(format!("SKSParser failed - Cause: {}", cause)),
        }
    }

    pub fn with_input_digest(mut self, sha256: Option<String>) -> Self {
        self.input_sha256 = sha256;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.result == RunResult::Ok
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

pub trait RunAudit {
    fn record(&mut self, outcome: &RunOutcome) -> Result<()>;
}

/// Audit that only writes to the log
#[derive(Debug, Default)]
pub struct TracingAudit;

impl RunAudit for TracingAudit {
    fn record(&mut self, outcome: &RunOutcome) -> Result<()> {
        match &outcome.result {
            RunResult::Ok => info!(
                service = %outcome.service,
                run_id = %outcome.run_id,
                input = %outcome.input_path.display(),
                processed = outcome.records_processed,
                duration_ms = outcome.duration_ms(),
                "import run succeeded"
            ),
            RunResult::Error(message) => error!(
                service = %outcome.service,
                run_id = %outcome.run_id,
                input = %outcome.input_path.display(),
                duration_ms = outcome.duration_ms(),
                "{}",
                message
            ),
        }
        Ok(())
    }
}
