//! Invariant validator: partitions resolved rows into accepted and rejected
//!
//! Rules, in order, first failure wins:
//!
//! 1. Required fields present and in range
//! 2. No other staged row with the same identity
//! 3. Identity not already present in canonical storage
//! 4. At most one primary per parent, counting staged and canonical rows
//!
//! The cross-row facts are materialized by the store in one pass, so each
//! row's verdict depends only on its own [`RowFacts`].

use crate::adapters::database::{ImportStore, RowFacts, RowLabel};
use crate::core::import::batch::{ImportBatch, RunState};
use crate::domain::{EntityKind, PipelineError, RejectReason, Result, RowOutcome, StagedRow};
use std::sync::Arc;

/// Rows labelled by one partition pass
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub accepted: Vec<StagedRow>,
    pub rejected: Vec<(StagedRow, String)>,
}

/// Labels resolved staged rows; never touches canonical storage
pub struct InvariantValidator {
    store: Arc<dyn ImportStore>,
}

impl InvariantValidator {
    pub fn new(store: Arc<dyn ImportStore>) -> Self {
        Self { store }
    }

    /// Evaluate every resolved row and write the verdicts back
    ///
    /// Orphans are already labelled by the resolver and are not part of the
    /// partition.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ValidationFailed`] if the facts cannot be
    /// computed or the labels cannot be written.
    pub async fn partition(&self, batch: &mut ImportBatch) -> Result<Partition> {
        let facts = self
            .store
            .validation_snapshot(&batch.relation)
            .await
            .map_err(|e| PipelineError::ValidationFailed(e.to_string()))?;

        let mut labels = Vec::with_capacity(facts.len());
        let mut partition = Partition::default();

        for fact in facts {
            let outcome = match check_row(batch.kind, &fact) {
                Ok(()) => RowOutcome::Accepted,
                Err(reason) => reason.into(),
            };
            labels.push(RowLabel {
                row_index: fact.row.row_index,
                outcome: outcome.clone(),
            });

            let mut row = fact.row;
            row.outcome = Some(outcome.clone());
            match outcome {
                RowOutcome::Rejected { reason } => partition.rejected.push((row, reason)),
                _ => partition.accepted.push(row),
            }
        }

        self.store
            .label_rows(&batch.relation, &labels)
            .await
            .map_err(|e| PipelineError::ValidationFailed(e.to_string()))?;

        batch.advance(RunState::Partitioned)?;
        tracing::info!(
            batch_id = %batch.batch_id,
            accepted = partition.accepted.len(),
            rejected = partition.rejected.len(),
            "Staged rows partitioned"
        );
        Ok(partition)
    }
}

/// Applies the rules to one row
///
/// # Errors
///
/// Returns the first rule the row breaks.
pub fn check_row(kind: EntityKind, facts: &RowFacts) -> std::result::Result<(), RejectReason> {
    let row = &facts.row;

    check_required(kind, row)?;

    if facts.duplicate_within_import {
        return Err(RejectReason::DuplicateWithinImport);
    }

    if facts.canonical_duplicate_exists {
        let identity = row
            .identity_key
            .clone()
            .unwrap_or_else(|| row.display_key());
        return Err(RejectReason::AlreadyExists(identity));
    }

    if row.is_primary && (facts.primary_claims_for_parent > 1 || facts.canonical_primary_exists) {
        return Err(RejectReason::DuplicatePrimary(row.display_key()));
    }

    Ok(())
}

fn check_required(kind: EntityKind, row: &StagedRow) -> std::result::Result<(), RejectReason> {
    if row.parent_id.is_none() {
        return Err(RejectReason::MissingField("parent"));
    }

    match kind {
        EntityKind::Cave => {
            if row.name.is_none() {
                return Err(RejectReason::MissingField("name"));
            }
            check_non_negative("length_ft", row.length_ft)?;
            check_non_negative("depth_ft", row.depth_ft)?;
        }
        EntityKind::Entrance => {
            let latitude = row.latitude.ok_or(RejectReason::MissingField("latitude"))?;
            let longitude = row.longitude.ok_or(RejectReason::MissingField("longitude"))?;
            let elevation = row
                .elevation_ft
                .ok_or(RejectReason::MissingField("elevation_ft"))?;

            check_range("latitude", latitude, -90.0, 90.0)?;
            check_range("longitude", longitude, -180.0, 180.0)?;
            if !elevation.is_finite() {
                return Err(RejectReason::InvalidField {
                    field: "elevation_ft",
                    detail: format!("{elevation} is not a number"),
                });
            }
        }
    }

    Ok(())
}

fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> std::result::Result<(), RejectReason> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(RejectReason::InvalidField {
            field,
            detail: format!("{value} outside [{min}, {max}]"),
        })
    }
}

fn check_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> std::result::Result<(), RejectReason> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(RejectReason::InvalidField {
            field,
            detail: format!("{v} must be a non-negative number"),
        }),
        _ => Ok(()),
    }
}
