// 📂 Input Directory Contract
//
// The importer gets one directory holding exactly one file: either the
// complete register or a delta. Both are loaded the same way, since a
// complete file is a delta that contains every entry.

use crate::error::{ImportError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const COMPLETE_FILE_NAME: &str = "SHAKCOMPLETE.TXT";
pub const DELTA_FILE_NAME: &str = "SHAKDELTA.TXT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    CompleteSnapshot,
    Delta,
}

impl InputKind {
    /// Recognise an input file by name (case-insensitive)
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case(COMPLETE_FILE_NAME) {
            Some(InputKind::CompleteSnapshot)
        } else if name.eq_ignore_ascii_case(DELTA_FILE_NAME) {
            Some(InputKind::Delta)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::CompleteSnapshot => "complete",
            InputKind::Delta => "delta",
        }
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| ImportError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ImportError::io(dir, e))?;
        files.push(entry.path());
    }
    files.sort();

    if files.is_empty() {
        return Err(ImportError::EmptyInputDirectory(dir.to_path_buf()));
    }

    Ok(files)
}

fn input_kind_of(path: &Path) -> Option<InputKind> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(InputKind::from_file_name)
}

/// Check the directory contract before any parsing
///
/// An unreadable or empty directory is an error. More than one file, or
/// one file with an unexpected name, is reported as `Ok(false)`.
pub fn validate_input_structure(dir: &Path) -> Result<bool> {
    let files = list_files(dir)?;

    Ok(files.len() == 1 && input_kind_of(&files[0]).is_some())
}

/// Resolve the single input file of a valid directory
pub fn locate_input_file(dir: &Path) -> Result<(PathBuf, InputKind)> {
    let mut files = list_files(dir)?;

    if files.len() != 1 {
        return Err(ImportError::InvalidInputStructure(format!(
            "expected exactly one file in {}, found {}",
            dir.display(),
            files.len()
        )));
    }

    let file = files.remove(0);
    let kind = input_kind_of(&file).ok_or_else(|| {
        ImportError::InvalidInputStructure(format!(
            "unexpected input file {} (expected {} or {})",
            file.display(),
            COMPLETE_FILE_NAME,
            DELTA_FILE_NAME
        ))
    })?;

    Ok((file, kind))
}
