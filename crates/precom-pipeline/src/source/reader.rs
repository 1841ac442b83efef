//! Raw sheet reading and row normalization.

use std::path::Path;

use calamine::{Data, DataType, Reader, open_workbook_auto};
use chrono::NaiveDate;

use precom_core::entities::{JointData, JointKey, WELD_ID_SEPARATOR};
use precom_core::ndt::{NdtMethod, NdtResult, NdtResults};

use super::columns::{Column, HeaderMap};
use super::{SourceRecord, SourceBatch};
use crate::error::{DateWarning, RowError, SourceError};

const EMPTY_SENTINELS: [&str; 4] = ["nan", "none", "null", "nat"];
const UNDEFINED_SYSTEM: &str = "UNDEFINED";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One spreadsheet cell after type detection.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Self::Empty,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                Self::from_text(s)
            }
            #[allow(clippy::cast_precision_loss)]
            Data::Int(i) => Self::Number(*i as f64),
            Data::Float(f) => Self::Number(*f),
            Data::Bool(b) => Self::Text(b.to_string()),
            Data::DateTime(_) => data
                .as_date()
                .map_or_else(|| Self::Text(data.to_string()), Self::Date),
        }
    }

    fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || EMPTY_SENTINELS.contains(&trimmed.to_lowercase().as_str()) {
            Self::Empty
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    /// Rendered text, `None` for empty cells.
    fn text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            Self::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
        }
    }

    const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Read every row of the first sheet (or the CSV file) as cells.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<Cell>>, SourceError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        read_csv_rows(path)
    } else {
        read_workbook_rows(path)
    }
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<Cell>>, SourceError> {
    let csv_err = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(Cell::from_text).collect());
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path) -> Result<Vec<Vec<Cell>>, SourceError> {
    let sheet_err = |source| SourceError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(sheet_err)?;
    let Some(first) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook.worksheet_range(&first).map_err(sheet_err)?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from_data).collect())
        .collect())
}

/// Locate the header, then normalize every data row below it into `batch`.
pub fn parse_rows(
    file: &str,
    rows: &[Vec<Cell>],
    header_scan_rows: usize,
    batch: &mut SourceBatch,
) -> Result<(), SourceError> {
    let header = rows
        .iter()
        .take(header_scan_rows)
        .enumerate()
        .find_map(|(idx, row)| {
            let texts: Vec<String> = row.iter().map(|c| c.text().unwrap_or_default()).collect();
            let map = HeaderMap::from_headers(texts.iter().map(String::as_str));
            map.has_key_columns().then_some((idx, map))
        });
    let Some((header_idx, map)) = header else {
        return Err(SourceError::MissingHeader {
            file: file.to_string(),
            scanned: header_scan_rows.min(rows.len()),
        });
    };

    for (idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        let ctx = RowContext {
            file,
            row_number: idx + 1,
            cells: row,
            map: &map,
        };
        match ctx.parse(&mut batch.date_warnings) {
            Ok(data) => batch.records.push(SourceRecord {
                file: file.to_string(),
                row: idx + 1,
                data,
            }),
            Err(err) => {
                tracing::debug!(file, row = err.row, reason = %err.reason, "row rejected");
                batch.row_errors.push(err);
            }
        }
    }
    Ok(())
}

struct RowContext<'a> {
    file: &'a str,
    row_number: usize,
    cells: &'a [Cell],
    map: &'a HeaderMap,
}

impl RowContext<'_> {
    fn cell(&self, column: Column) -> &Cell {
        self.map
            .position(column)
            .and_then(|idx| self.cells.get(idx))
            .unwrap_or(&Cell::Empty)
    }

    fn text(&self, column: Column) -> Option<String> {
        self.cell(column).text()
    }

    fn error(&self, key: Option<String>, reason: impl Into<String>) -> RowError {
        RowError {
            file: self.file.to_string(),
            row: self.row_number,
            key,
            reason: reason.into(),
        }
    }

    fn parse(&self, date_warnings: &mut Vec<DateWarning>) -> Result<JointData, RowError> {
        let drawing_number = self.text(Column::DrawingNumber);
        let weld_joint = self.text(Column::WeldJoint);
        let (drawing_number, weld_joint) = match (drawing_number, weld_joint) {
            (Some(d), Some(w)) => (d, w),
            (None, _) => return Err(self.error(None, "missing drawing number")),
            (Some(_), None) => return Err(self.error(None, "missing weld joint")),
        };
        let joint_key = JointKey::new(&drawing_number, &weld_joint);
        if !joint_key.has_unambiguous_id() {
            return Err(self.error(
                None,
                format!("weld joint '{weld_joint}' contains '{WELD_ID_SEPARATOR}'"),
            ));
        }
        let key = joint_key.weld_id();

        let mut results = NdtResults::default();
        for method in NdtMethod::ALL {
            let Some(raw) = self.text(Column::Result(method)) else {
                continue;
            };
            let result = NdtResult::parse(&raw)
                .map_err(|e| self.error(Some(key.clone()), format!("{method}: {e}")))?;
            results.set(method, result);
        }

        let system_code = self
            .text(Column::SystemCode)
            .unwrap_or_else(|| UNDEFINED_SYSTEM.to_string());
        let subsystem_code = self
            .text(Column::SubsystemCode)
            .unwrap_or_else(|| format!("{system_code}_UNDEFINED"));
        let size = self.size(&key)?;

        Ok(JointData {
            drawing_number,
            weld_joint,
            page_number: self.text(Column::PageNumber),
            pipeline_number: self.text(Column::PipelineNumber),
            revision: self.text(Column::Revision),
            contractor: self.text(Column::Contractor),
            system_code,
            subsystem_code,
            test_package_id: self.text(Column::TestPackage),
            weld_date: self.weld_date(date_warnings),
            size,
            results,
        })
    }

    /// Unparseable text is NULL; a negative or non-finite number rejects the row.
    fn size(&self, key: &str) -> Result<Option<f64>, RowError> {
        let size = match self.cell(Column::Size) {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.parse::<f64>().ok(),
            Cell::Empty | Cell::Date(_) => None,
        };
        match size {
            Some(n) if !n.is_finite() || n < 0.0 => {
                Err(self.error(Some(key.to_string()), format!("invalid size {n}")))
            }
            other => Ok(other),
        }
    }

    fn weld_date(&self, date_warnings: &mut Vec<DateWarning>) -> Option<NaiveDate> {
        let cell = self.cell(Column::WeldDate);
        let parsed = match cell {
            Cell::Empty => return None,
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => NaiveDate::parse_from_str(s, DATE_FORMAT).ok(),
            Cell::Number(_) => None,
        };
        if parsed.is_none() {
            date_warnings.push(DateWarning {
                file: self.file.to_string(),
                row: self.row_number,
                column: Column::WeldDate.name().to_string(),
                value: cell.text().unwrap_or_default(),
            });
        }
        parsed
    }
}
