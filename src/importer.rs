// 🚚 SKS Importer - one directory in, one reconciled batch out
//
// Flow: check directory → reset transaction time → read file →
// build dataset (fail fast) → persist atomically → audit.
// A complete file and a delta file go through exactly the same steps.

use crate::dataset::Dataset;
use crate::error::{ImportError, Result};
use crate::input::{locate_input_file, validate_input_structure, InputKind};
use crate::parser::read_register_file;
use crate::sink::{PersistStats, RecordSink, RunAudit, RunOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub input_kind: InputKind,
    pub input_path: PathBuf,
    pub records_processed: usize,
    pub lines_skipped: usize,
    pub stats: PersistStats,
    pub transaction_time: DateTime<Utc>,
}

pub struct SksImporter<S: RecordSink, A: RunAudit> {
    sink: S,
    audit: A,
}

impl<S: RecordSink, A: RunAudit> SksImporter<S, A> {
    pub fn new(sink: S, audit: A) -> Self {
        SksImporter { sink, audit }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    /// True when `dir` holds exactly one SHAKCOMPLETE.TXT or SHAKDELTA.TXT
    pub fn validate_input_structure(&self, dir: &Path) -> Result<bool> {
        validate_input_structure(dir)
    }

    /// Import the single register file in `dir`
    ///
    /// `run_id` is passed through to the audit record. Either every
    /// applicable record of the file is merged, or nothing is.
    pub fn process(&mut self, dir: &Path, run_id: &str) -> Result<ImportSummary> {
        if !validate_input_structure(dir)? {
            warn!(dir = %dir.display(), "rejecting input directory");
            return Err(ImportError::InvalidInputStructure(format!(
                "{} must contain exactly one SHAKCOMPLETE.TXT or SHAKDELTA.TXT",
                dir.display()
            )));
        }

        let started_at = Utc::now();
        info!(run_id, dir = %dir.display(), "starting SKS import");

        let mut digest = None;
        match self.run(dir, &mut digest) {
            Ok(summary) => {
                let outcome = RunOutcome::succeeded(run_id, dir.to_path_buf(), summary.records_processed, started_at)
                    .with_input_digest(digest);
                self.audit.record(&outcome)?;

                info!(
                    run_id,
                    kind = summary.input_kind.as_str(),
                    processed = summary.records_processed,
                    skipped = summary.lines_skipped,
                    "SKS import finished"
                );
                Ok(summary)
            }
            Err(err) => {
                let outcome = RunOutcome::failed(run_id, dir.to_path_buf(), &err.to_string(), started_at)
                    .with_input_digest(digest);
                if let Err(audit_err) = self.audit.record(&outcome) {
                    warn!(run_id, error = %audit_err, "could not record failed run");
                }
                Err(err)
            }
        }
    }

    fn run(&mut self, dir: &Path, digest: &mut Option<String>) -> Result<ImportSummary> {
        let transaction_time = self.sink.reset_transaction_time()?;

        let (path, input_kind) = locate_input_file(dir)?;
        let file = read_register_file(&path)?;
        *digest = Some(file.sha256);

        let dataset = Dataset::build(&file.lines)?;
        let stats = self.sink.persist_delta_dataset(&dataset)?;

        Ok(ImportSummary {
            input_kind,
            input_path: path,
            records_processed: dataset.len(),
            lines_skipped: dataset.skipped(),
            stats,
            transaction_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RunResult;
    use std::fs;
    use tempfile::TempDir;

    /// In-memory sink recording what it was asked to persist
    #[derive(Default)]
    struct RecordingSink {
        resets: usize,
        persisted: Vec<usize>,
        fail: bool,
    }

    impl RecordSink for RecordingSink {
        fn reset_transaction_time(&mut self) -> Result<DateTime<Utc>> {
            self.resets += 1;
            Ok(Utc::now())
        }

        fn persist_delta_dataset(&mut self, dataset: &Dataset) -> Result<PersistStats> {
            if self.fail {
                return Err(ImportError::Persistence("disk full".to_string()));
            }
            self.persisted.push(dataset.len());
            Ok(PersistStats {
                history_inserted: dataset.len(),
                ..PersistStats::default()
            })
        }
    }

    #[derive(Default)]
    struct RecordingAudit {
        outcomes: Vec<RunOutcome>,
    }

    impl RunAudit for RecordingAudit {
        fn record(&mut self, outcome: &RunOutcome) -> Result<()> {
            self.outcomes.push(outcome.clone());
            Ok(())
        }
    }

    fn line(tag: &str, id: &str, code: char) -> String {
        format!(
            "{}{:<20}2000010120000101{}{:<120}084{:<9}SKS{:<5}{}",
            tag, id, "25000101", "Name", "", "", code
        )
    }

    fn input_dir(name: &str, lines: &[String]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(name), lines.join("\n")).unwrap();
        dir
    }

    fn importer() -> SksImporter<RecordingSink, RecordingAudit> {
        SksImporter::new(RecordingSink::default(), RecordingAudit::default())
    }

    #[test]
    fn test_process_persists_and_audits() {
        let dir = input_dir(
            "SHAKCOMPLETE.TXT",
            &[line("sgh", "1301", '1'), line("afd", "1301011", '3'), line("afd", "1301012", ' ')],
        );
        let mut importer = importer();

        let summary = importer.process(dir.path(), "run-1").unwrap();

        assert_eq!(summary.input_kind, InputKind::CompleteSnapshot);
        assert_eq!(summary.records_processed, 2);
        assert_eq!(summary.lines_skipped, 1);
        assert_eq!(importer.sink().resets, 1);
        assert_eq!(importer.sink().persisted, vec![2]);

        let outcome = &importer.audit().outcomes[0];
        assert!(outcome.is_ok());
        assert_eq!(outcome.run_id, "run-1");
        assert_eq!(outcome.records_processed, 2);
        assert!(outcome.input_sha256.is_some());
    }

    #[test]
    fn test_malformed_line_aborts_without_persisting() {
        let dir = input_dir("SHAKDELTA.TXT", &[line("sgh", "1301", '1'), line("sgh", "1302", '2')]);
        let mut importer = importer();

        let err = importer.process(dir.path(), "run-2").unwrap_err();

        assert!(err.is_malformed_record());
        assert!(importer.sink().persisted.is_empty());
        match &importer.audit().outcomes[0].result {
            RunResult::Error(msg) => assert!(msg.starts_with("SKSParser failed - Cause: malformed record at line 2")),
            RunResult::Ok => panic!("run should have failed"),
        }
    }

    #[test]
    fn test_persistence_failure_is_reported() {
        let dir = input_dir("SHAKDELTA.TXT", &[line("sgh", "1301", '1')]);
        let mut importer = SksImporter::new(
            RecordingSink {
                fail: true,
                ..RecordingSink::default()
            },
            RecordingAudit::default(),
        );

        let err = importer.process(dir.path(), "run-3").unwrap_err();

        assert!(matches!(err, ImportError::Persistence(_)));
        assert!(!importer.audit().outcomes[0].is_ok());
    }

    #[test]
    fn test_invalid_structure_is_rejected_before_processing() {
        let dir = input_dir("SHAKCOMPLETE.XML", &[line("sgh", "1301", '1')]);
        let mut importer = importer();

        assert!(!importer.validate_input_structure(dir.path()).unwrap());
        let err = importer.process(dir.path(), "run-4").unwrap_err();

        assert!(matches!(err, ImportError::InvalidInputStructure(_)));
        assert_eq!(importer.sink().resets, 0);
        assert!(importer.audit().outcomes.is_empty());
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut importer = importer();

        assert!(matches!(
            importer.process(dir.path(), "run-5"),
            Err(ImportError::EmptyInputDirectory(_))
        ));
    }
}
