//! Library field migration
//!
//! Older book files use `reference`, `chinese_phrase` / `cn`,
//! `english_phrase` / `en` and store `trap` as a bare string. This pass
//! rewrites them in place to the canonical record shape, keeping a copy of
//! each changed file under `<data_dir>/_backup/`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use pulpit_algo::trap_entries;

use super::{book_files, LibraryError};

pub const BACKUP_DIR: &str = "_backup";

/// (legacy, canonical)
const FIELD_RENAMES: [(&str, &str); 5] = [
    ("reference", "ref"),
    ("chinese_phrase", "phrase_cn"),
    ("cn", "phrase_cn"),
    ("english_phrase", "phrase_en"),
    ("en", "phrase_en"),
];

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    /// Files rewritten
    pub fixed: Vec<String>,
    /// Files already in canonical shape
    pub unchanged: Vec<String>,
    /// (file, error) pairs; the file is left as it was
    pub errors: Vec<(String, String)>,
    /// Records changed across all fixed files
    pub items_touched: usize,
}

impl NormalizeReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Brings one record to canonical shape. Returns true if anything changed.
pub fn normalize_record(record: &mut Map<String, Value>) -> bool {
    let mut changed = false;

    for (legacy, canonical) in FIELD_RENAMES {
        let Some(value) = record.remove(legacy) else {
            continue;
        };
        changed = true;
        if !record.contains_key(canonical) {
            record.insert(canonical.to_string(), value);
        }
    }

    let trap = record.get("trap").cloned().unwrap_or(Value::Null);
    let fixed = Value::Array(trap_entries(trap.clone()).into_iter().map(Value::String).collect());
    if !record.contains_key("trap") || trap != fixed {
        record.insert("trap".to_string(), fixed);
        changed = true;
    }

    changed
}

/// Normalizes every record of a parsed book file. Returns the number of
/// records changed.
pub fn normalize_book_value(value: &mut Value) -> Result<usize, String> {
    let Value::Array(records) = value else {
        return Err("top level is not a JSON list".to_string());
    };

    Ok(records
        .iter_mut()
        .filter_map(Value::as_object_mut)
        .map(normalize_record)
        .filter(|changed| *changed)
        .count())
}

/// Rewrites every book file in `dir`. With `dry_run` nothing is written but
/// the report is the same.
pub fn normalize_dir(dir: &Path, dry_run: bool) -> Result<NormalizeReport, LibraryError> {
    let mut report = NormalizeReport::default();
    let backup_dir = dir.join(BACKUP_DIR);

    for path in book_files(dir)? {
        let name = file_name(&path);
        match normalize_file(&path, &backup_dir, dry_run) {
            Ok(0) => {
                debug!(file = %name, "already canonical");
                report.unchanged.push(name);
            }
            Ok(touched) => {
                info!(file = %name, records = touched, dry_run, "normalized");
                report.items_touched += touched;
                report.fixed.push(name);
            }
            Err(err) => {
                warn!(file = %name, error = %err, "normalize failed");
                report.errors.push((name, err));
            }
        }
    }

    Ok(report)
}

fn normalize_file(path: &Path, backup_dir: &Path, dry_run: bool) -> Result<usize, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut value: Value = serde_json::from_str(&raw).map_err(|e| e.to_string())?;

    let touched = normalize_book_value(&mut value)?;
    if touched == 0 || dry_run {
        return Ok(touched);
    }

    std::fs::create_dir_all(backup_dir).map_err(|e| e.to_string())?;
    let backup: PathBuf = backup_dir.join(file_name(path));
    std::fs::copy(path, &backup).map_err(|e| format!("backup failed: {e}"))?;

    let mut body = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
    body.push('\n');
    std::fs::write(path, body).map_err(|e| e.to_string())?;

    Ok(touched)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
