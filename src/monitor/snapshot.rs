//! Point-in-time view of all targets, used for display and export.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::Status;
use super::target::TargetId;

/// Display fields of one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub id: TargetId,
    pub display_name: String,
    pub address: String,
    pub status: Status,
    /// Latency of the last successful probe; stale after failures.
    pub last_latency_ms: Option<f64>,
    pub running: bool,
    /// Reply text of the last probe.
    pub last_reply: Option<String>,
    pub last_probe_at: Option<DateTime<Utc>>,
    /// Number of recorded probes.
    pub probes: u64,
}

impl SnapshotRow {
    /// Latency formatted for display, `-` when none was ever measured.
    pub fn latency_label(&self) -> String {
        self.last_latency_ms
            .map(|ms| format!("{ms:.1} ms"))
            .unwrap_or_else(|| "-".to_string())
    }
}

const HEADERS: [&str; 5] = ["NAME", "ADDRESS", "STATUS", "LATENCY", "STATE"];

/// Render rows as a fixed-width text table.
pub fn render_table(rows: &[SnapshotRow]) -> String {
    let cells: Vec<[String; 5]> = rows
        .iter()
        .map(|row| {
            [
                row.display_name.clone(),
                row.address.clone(),
                row.status.to_string(),
                row.latency_label(),
                if row.running { "running" } else { "stopped" }.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |fields: &[&str]| {
        let line = fields
            .iter()
            .zip(widths)
            .map(|(field, width)| format!("{field:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        let _ = writeln!(out, "{}", line.trim_end());
    };

    push_line(&HEADERS);
    for row in &cells {
        let fields: Vec<&str> = row.iter().map(String::as_str).collect();
        push_line(&fields);
    }
    out
}
