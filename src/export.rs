//! Spreadsheet export of a registry snapshot.
//!
//! The snapshot is written as-is, one row per target. The file format follows
//! the extension: `.xlsx` for an Excel workbook, `.csv` for comma-separated
//! text. Paths with any other extension get `.xlsx` appended.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::monitor::SnapshotRow;

/// Default export file name.
pub const DEFAULT_EXPORT_PATH: &str = "Ping_Results.xlsx";

const WORKSHEET_NAME: &str = "Ping Results";

const HEADERS: [&str; 7] = [
    "Name",
    "IP Address",
    "Status",
    "Latency (ms)",
    "Running",
    "Last Reply",
    "Last Probe",
];

/// Errors surfaced to the user when an export fails.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing to write.
    #[error("no results to export")]
    Empty,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] XlsxError),
}

/// Spreadsheet file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

/// Decide the final path and format for a requested export path.
pub fn resolve_export_path(path: impl AsRef<Path>) -> (PathBuf, ExportFormat) {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("xlsx") => (path.to_path_buf(), ExportFormat::Xlsx),
        Some("csv") => (path.to_path_buf(), ExportFormat::Csv),
        _ => {
            let mut name = path.as_os_str().to_owned();
            name.push(".xlsx");
            (PathBuf::from(name), ExportFormat::Xlsx)
        }
    }
}

/// Flat record written for each snapshot row.
#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "IP Address")]
    address: &'a str,
    #[serde(rename = "Status")]
    status: &'a str,
    #[serde(rename = "Latency (ms)")]
    latency_ms: Option<f64>,
    #[serde(rename = "Running")]
    running: bool,
    #[serde(rename = "Last Reply")]
    last_reply: &'a str,
    #[serde(rename = "Last Probe")]
    last_probe: String,
}

impl<'a> From<&'a SnapshotRow> for ExportRecord<'a> {
    fn from(row: &'a SnapshotRow) -> Self {
        Self {
            name: &row.display_name,
            address: &row.address,
            status: row.status.as_ref(),
            latency_ms: row.last_latency_ms,
            running: row.running,
            last_reply: row.last_reply.as_deref().unwrap_or(""),
            last_probe: row
                .last_probe_at
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}

/// Write `rows` to `path`, returning the path actually written.
///
/// A failed export leaves the snapshot untouched; call again to retry.
pub fn export_snapshot(rows: &[SnapshotRow], path: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::Empty);
    }

    let (path, format) = resolve_export_path(path);
    match format {
        ExportFormat::Csv => write_csv(rows, &path)?,
        ExportFormat::Xlsx => write_xlsx(rows, &path)?,
    }

    tracing::info!(path = %path.display(), format = %format, rows = rows.len(), "Snapshot exported");
    Ok(path)
}

fn write_csv(rows: &[SnapshotRow], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(ExportRecord::from(row))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(rows: &[SnapshotRow], path: &Path) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(WORKSHEET_NAME)?;

        for (col, title) in HEADERS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *title, &bold)?;
        }

        for (idx, row) in rows.iter().enumerate() {
            let r = (idx + 1) as u32;
            let record = ExportRecord::from(row);
            sheet.write_string(r, 0, record.name)?;
            sheet.write_string(r, 1, record.address)?;
            sheet.write_string(r, 2, record.status)?;
            if let Some(ms) = record.latency_ms {
                sheet.write_number(r, 3, ms)?;
            }
            sheet.write_boolean(r, 4, record.running)?;
            sheet.write_string(r, 5, record.last_reply)?;
            sheet.write_string(r, 6, record.last_probe)?;
        }

        sheet.autofit();
    }

    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{Status, TargetId};
    use chrono::Utc;
    use tempfile::tempdir;

    fn rows() -> Vec<SnapshotRow> {
        vec![
            SnapshotRow {
                id: TargetId(1),
                display_name: "core".to_string(),
                address: "10.0.0.1".to_string(),
                status: Status::Up,
                last_latency_ms: Some(3.5),
                running: true,
                last_reply: Some("Reply from 10.0.0.1: time=3.5ms".to_string()),
                last_probe_at: Some(Utc::now()),
                probes: 4,
            },
            SnapshotRow {
                id: TargetId(2),
                display_name: "10.0.0.2".to_string(),
                address: "10.0.0.2".to_string(),
                status: Status::Unknown,
                last_latency_ms: None,
                running: false,
                last_reply: None,
                last_probe_at: None,
                probes: 0,
            },
        ]
    }

    #[test]
    fn test_resolve_export_path() {
        assert_eq!(
            resolve_export_path("out.csv"),
            (PathBuf::from("out.csv"), ExportFormat::Csv)
        );
        assert_eq!(
            resolve_export_path("Out.XLSX"),
            (PathBuf::from("Out.XLSX"), ExportFormat::Xlsx)
        );
        assert_eq!(
            resolve_export_path("results"),
            (PathBuf::from("results.xlsx"), ExportFormat::Xlsx)
        );
        assert_eq!(
            resolve_export_path("results.txt"),
            (PathBuf::from("results.txt.xlsx"), ExportFormat::Xlsx)
        );
    }

    #[test]
    fn test_export_empty_is_refused() {
        let dir = tempdir().unwrap();
        let result = export_snapshot(&[], dir.path().join("x.csv"));
        assert!(matches!(result, Err(ExportError::Empty)));
        assert!(!dir.path().join("x.csv").exists());
    }

    #[test]
    fn test_export_csv_contents() {
        let dir = tempdir().unwrap();
        let path = export_snapshot(&rows(), dir.path().join("results.csv")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Name,IP Address,Status,Latency (ms),Running,Last Reply,Last Probe"
        );
        assert!(lines[1].starts_with("core,10.0.0.1,UP,3.5,true,"));
        assert_eq!(lines[2], "10.0.0.2,10.0.0.2,UNKNOWN,,false,,");
    }

    #[test]
    fn test_export_xlsx_appends_extension() {
        let dir = tempdir().unwrap();
        let path = export_snapshot(&rows(), dir.path().join("results")).unwrap();

        assert_eq!(path, dir.path().join("results.xlsx"));
        let bytes = std::fs::read(&path).unwrap();
        // xlsx is a zip container.
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_export_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let result = export_snapshot(&rows(), dir.path().join("missing").join("r.csv"));
        assert!(result.is_err());
        assert!(!matches!(result, Err(ExportError::Empty)));
    }
}
