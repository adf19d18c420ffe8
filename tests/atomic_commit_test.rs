//! Commit is all-or-nothing
//!
//! A migration that fails part way through leaves canonical storage exactly
//! as it was, and the run still cleans up its staging relation.

mod common;

use common::{controller, entrance, generated_entrances, seeded_store, FaultyStore};
use karst::domain::{EntityKind, ImportMode, KarstError, PipelineError};
use std::sync::Arc;

#[tokio::test]
async fn test_constraint_violation_mid_migration_rolls_back() {
    let memory = seeded_store();
    let faulty = Arc::new(FaultyStore::new(memory.clone()));

    // Many valid non-primary rows first, then the primary claim that will
    // collide with a competing commit made after validation
    let mut rows = generated_entrances("TN001", 40);
    rows.push(entrance("TN001", "Main", true));

    let tn001 = memory
        .caves()
        .into_iter()
        .find(|c| c.name == "Blue Spring Cave")
        .unwrap()
        .id;
    faulty.before_migrate(move |canonical| {
        canonical.add_entrance(tn001, Some("Competing Primary"), true);
    });
    let entrances_before = memory.entrances().len();

    let (controller, _tx) = controller(faulty, 10);
    let err = controller
        .run_import(EntityKind::Entrance, &rows, ImportMode::Commit, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        KarstError::Pipeline(PipelineError::MigrationFailed(ref msg))
            if msg.contains("entrances_one_primary_per_cave")
    ));

    // Only the competing row landed; none of the batch's 41 rows did
    let entrances = memory.entrances();
    assert_eq!(entrances.len(), entrances_before + 1);
    assert!(entrances
        .iter()
        .all(|e| e.name.as_deref() != Some("Main") || e.cave_id != tn001));
    assert!(memory.staging_names().is_empty());
}

#[tokio::test]
async fn test_successful_commit_lands_every_accepted_row() {
    let memory = seeded_store();
    let rows = generated_entrances("AL001", 120);

    let (controller, _tx) = controller(memory.clone(), 25);
    let outcome = controller
        .run_import(EntityKind::Entrance, &rows, ImportMode::Commit, None)
        .await
        .unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.accepted_count, 120);
    assert_eq!(report.migrated_count, 120);
    assert_eq!(memory.entrances().len(), 121);
}
