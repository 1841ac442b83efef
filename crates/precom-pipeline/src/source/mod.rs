//! Spreadsheet source: file discovery and row parsing.
//!
//! A source path is either one export file or a directory of them. Workbooks
//! (`xlsx`, `xlsm`, `xls`, `ods`) are read with calamine, `csv` files with the
//! csv crate. Only the first sheet of a workbook is read.

pub mod columns;
mod reader;

use std::path::{Path, PathBuf};

use globset::Glob;
use serde::Serialize;

use precom_config::SourceConfig;
use precom_core::entities::JointData;

use crate::error::{DateWarning, RowError, SourceError};

pub use reader::Cell;

const SUPPORTED_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "ods", "csv"];

/// One parsed source row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    pub file: String,
    /// 1-based row number within the sheet.
    pub row: usize,
    pub data: JointData,
}

/// Everything read from a source path, in file then row order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceBatch {
    pub files: Vec<String>,
    pub records: Vec<SourceRecord>,
    pub row_errors: Vec<RowError>,
    pub date_warnings: Vec<DateWarning>,
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// Files to import from `path`, sorted by file name.
///
/// # Errors
///
/// Returns `SourceError::Io` when the path cannot be read, `SourceError::Pattern`
/// for an invalid glob and `SourceError::NoFiles` when a directory holds no
/// matching export.
pub fn resolve_source_files(path: &Path, pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
    let io_err = |source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let metadata = std::fs::metadata(path).map_err(io_err)?;
    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let matcher = Glob::new(pattern)
        .map_err(|source| SourceError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?
        .compile_matcher();

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path).map_err(io_err)? {
        let entry_path = entry.map_err(io_err)?.path();
        let matches = entry_path.is_file()
            && has_supported_extension(&entry_path)
            && entry_path
                .file_name()
                .is_some_and(|name| matcher.is_match(name));
        if matches {
            files.push(entry_path);
        } else {
            tracing::debug!(path = %entry_path.display(), "ignoring non-export file");
        }
    }

    if files.is_empty() {
        return Err(SourceError::NoFiles {
            path: path.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Resolve and parse every export under `path`.
///
/// Row-level problems are collected in the batch; any error returned is
/// systemic.
///
/// # Errors
///
/// Returns `SourceError` when a file cannot be found, opened, or has no header.
pub fn read_source(path: &Path, config: &SourceConfig) -> Result<SourceBatch, SourceError> {
    let files = resolve_source_files(path, &config.file_pattern)?;
    let mut batch = SourceBatch::default();
    for file in &files {
        let name = file
            .file_name()
            .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
        let rows = reader::read_rows(file)?;
        let before = batch.records.len();
        reader::parse_rows(&name, &rows, config.header_scan_rows, &mut batch)?;
        tracing::info!(
            file = %name,
            rows = batch.records.len() - before,
            "source file parsed"
        );
        batch.files.push(name);
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn directory_filters_by_pattern_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "WeldingDB_b.csv", "");
        touch(dir.path(), "WeldingDB_a.xlsx", "");
        touch(dir.path(), "WeldingDB_notes.txt", "");
        touch(dir.path(), "Other.csv", "");

        let files = resolve_source_files(dir.path(), "WeldingDB_*").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["WeldingDB_a.xlsx", "WeldingDB_b.csv"]);
    }

    #[test]
    fn single_file_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "export.csv", "");
        assert_eq!(resolve_source_files(&file, "WeldingDB_*").unwrap(), vec![file]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "readme.md", "");
        let err = resolve_source_files(dir.path(), "WeldingDB_*").unwrap_err();
        assert!(matches!(err, SourceError::NoFiles { .. }));
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_source_files(&dir.path().join("nope"), "*").unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn reads_csv_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            "WeldingDB_2.csv",
            "DrawingNumber,WeldJoint,SystemCode\nDWG-2,W1,S2\n",
        );
        touch(
            dir.path(),
            "WeldingDB_1.csv",
            "DrawingNumber,WeldJoint,SystemCode\nDWG-1,W1,S1\nDWG-1,W2,S1\n",
        );

        let batch = read_source(dir.path(), &SourceConfig::default()).unwrap();
        assert_eq!(batch.files, vec!["WeldingDB_1.csv", "WeldingDB_2.csv"]);
        let keys: Vec<_> = batch.records.iter().map(|r| r.data.key().weld_id()).collect();
        assert_eq!(keys, vec!["DWG-1/W1", "DWG-1/W2", "DWG-2/W1"]);
        assert!(batch.row_errors.is_empty());
    }
}
