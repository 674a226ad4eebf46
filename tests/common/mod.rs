// Shared fixtures for the integration tests

#![allow(dead_code)]

use rusqlite::Connection;
use sks_import::{setup_database, SksImporter, SqliteRecordSink, SqliteRunAudit};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// One register line laid out at the real columns
///
/// `code` None produces a legacy line that stops before the operation code.
pub fn register_line(tag: &str, id: &str, from: &str, to: &str, name: &str, code: Option<char>) -> String {
    let body = format!("{}{:<20}{}{}{}{:<120}084", tag, id, from, from, to, name);
    match code {
        Some(code) => format!("{}{:<9}SKS{:<5}{}", body, "", "", code),
        None => body,
    }
}

/// Write `lines` as ISO-8859-15 into a fresh directory under `name`
pub fn input_dir(name: &str, lines: &[String]) -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut bytes = Vec::new();
    for line in lines {
        for ch in line.chars() {
            bytes.push(ch as u32 as u8);
        }
        bytes.extend_from_slice(b"\r\n");
    }
    fs::write(dir.path().join(name), bytes).unwrap();
    dir
}

pub fn shared_connection(path: &Path) -> Arc<Mutex<Connection>> {
    let conn = Connection::open(path).unwrap();
    setup_database(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

pub fn sqlite_importer(conn: &Arc<Mutex<Connection>>) -> SksImporter<SqliteRecordSink, SqliteRunAudit> {
    SksImporter::new(SqliteRecordSink::new(conn.clone()), SqliteRunAudit::new(conn.clone()))
}

/// A small complete register: two hospitals, three departments,
/// plus lines the importer must ignore
pub fn complete_register() -> Vec<String> {
    vec![
        register_line("sgh", "1301", "19760401", "25000101", "Rigshospitalet", Some('1')),
        register_line("sgh", "1401", "19760401", "25000101", "Bispebjerg Hospital", Some('1')),
        register_line("afd", "1301011", "19790101", "19821231", "ANÆSTHESIAFD. AN", None),
        register_line("afd", "1301011", "19950101", "19991231", "ANÆSTESIAFD. AN,ANÆSTESIAFSNIT", Some('3')),
        register_line("afd", "1301011", "20040101", "25000101", "Anæstesi-/operationsklinik, ABD", Some('1')),
        register_line("afd", "1301012", "20040101", "25000101", "Kirurgisk klinik", Some('1')),
        register_line("afd", "1401010", "20040101", "25000101", "Medicinsk afdeling", Some('1')),
        register_line("afd", "1401099", "20040101", "25000101", "Ignoreret", Some(' ')),
    ]
}
