//! Import report: the externally visible result of a run

use crate::domain::{EntityKind, ImportMode, RowOutcome, StagedRow};
use serde::{Deserialize, Serialize};

/// One problem row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row_index: usize,
    pub key: String,
    pub reason: String,
}

/// Counts and row-level detail of a finished run
///
/// Same shape for dry-run and commit; only `migrated_count` differs. Contains
/// nothing run-specific, so two dry-runs over the same rows and the same
/// canonical state produce equal reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub entity_kind: EntityKind,
    pub mode: ImportMode,
    pub total_rows: usize,
    pub accepted_count: usize,
    pub accepted_rows: Vec<usize>,
    pub rejected_rows: Vec<RowIssue>,
    pub orphan_rows: Vec<RowIssue>,
    pub migrated_count: u64,
}

impl ImportReport {
    /// Builds a report from the labelled staged rows
    ///
    /// Rows are reported in row order. Rows without a label (should not
    /// happen after partitioning) count as rejected.
    pub fn from_staged(
        entity_kind: EntityKind,
        mode: ImportMode,
        mut rows: Vec<StagedRow>,
        migrated_count: u64,
    ) -> Self {
        rows.sort_by_key(|r| r.row_index);

        let mut report = Self {
            entity_kind,
            mode,
            total_rows: rows.len(),
            accepted_count: 0,
            accepted_rows: Vec::new(),
            rejected_rows: Vec::new(),
            orphan_rows: Vec::new(),
            migrated_count,
        };

        for row in rows {
            let key = row.display_key();
            match row.outcome {
                Some(RowOutcome::Accepted) => report.accepted_rows.push(row.row_index),
                Some(RowOutcome::Orphaned { reason }) => report.orphan_rows.push(RowIssue {
                    row_index: row.row_index,
                    key,
                    reason,
                }),
                Some(RowOutcome::Rejected { reason }) => report.rejected_rows.push(RowIssue {
                    row_index: row.row_index,
                    key,
                    reason,
                }),
                None => report.rejected_rows.push(RowIssue {
                    row_index: row.row_index,
                    key,
                    reason: "not evaluated".to_string(),
                }),
            }
        }
        report.accepted_count = report.accepted_rows.len();
        report
    }

    /// Returns true if any row was rejected or orphaned
    pub fn has_problems(&self) -> bool {
        !self.rejected_rows.is_empty() || !self.orphan_rows.is_empty()
    }

    /// Row indices of orphaned rows
    pub fn orphan_row_ids(&self) -> Vec<usize> {
        self.orphan_rows.iter().map(|r| r.row_index).collect()
    }

    /// Row indices of rejected rows
    pub fn rejected_row_ids(&self) -> Vec<usize> {
        self.rejected_rows.iter().map(|r| r.row_index).collect()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            kind = %self.entity_kind,
            mode = %self.mode,
            total = self.total_rows,
            accepted = self.accepted_count,
            rejected = self.rejected_rows.len(),
            orphans = self.orphan_rows.len(),
            migrated = self.migrated_count,
            "Import report"
        );
        for issue in &self.rejected_rows {
            tracing::debug!(row = issue.row_index, key = %issue.key, reason = %issue.reason, "Row rejected");
        }
        for issue in &self.orphan_rows {
            tracing::debug!(row = issue.row_index, key = %issue.key, reason = %issue.reason, "Row orphaned");
        }
    }
}
