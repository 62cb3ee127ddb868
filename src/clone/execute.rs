// dbclone/src/clone/execute.rs
use tracing::{error, info};

use crate::clone::model::{FileKind, RestorePlan};
use crate::engine::{BackupArtifact, EngineAdmin};
use crate::errors::{CloneError, Result};

/// Restores `artifact` as the plan's target database.
///
/// Nothing is cleaned up on failure: the engine either creates the database
/// completely or not at all, and a fresh backup file stays where it was written.
pub fn execute(engine: &dyn EngineAdmin, plan: &RestorePlan, artifact: &BackupArtifact) -> Result<()> {
    info!(
        "Restoring {} from {} ({} data, {} log file(s))",
        plan.target_database,
        artifact,
        plan.files_of(FileKind::Data).count(),
        plan.files_of(FileKind::Log).count()
    );
    for relocation in &plan.relocations {
        info!(
            "  {} ({:?}) -> {}",
            relocation.logical_name, relocation.kind, relocation.physical_path
        );
    }

    engine.restore(plan, artifact).map_err(|source| {
        error!("Restore of {} failed: {}", plan.target_database, source);
        CloneError::RestoreFailed {
            database: plan.target_database.clone(),
            source,
        }
    })?;

    info!("✓ Database {} restored", plan.target_database);
    Ok(())
}
