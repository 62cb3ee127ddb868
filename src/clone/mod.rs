// dbclone/src/clone/mod.rs
pub(crate) mod capacity; // Disk capacity assessment against the default volumes
pub(crate) mod execute; // Restore execution
pub(crate) mod flags; // Scoped instance-wide configuration flags
pub(crate) mod model;
pub(crate) mod plan; // Fresh backup, file manifest and relocation plan
pub(crate) mod preflight; // Existence and replica role checks
pub(crate) mod selector; // Backup source decision
#[cfg(test)]
pub(crate) mod testing;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::engine::{EngineAdmin, VolumeQuery};
use crate::errors::{CloneError, Result};
use model::{BackupMethod, CloneRequest, ExecutionResult, FileRelocation};
use plan::PlanContext;

/// Summary of one clone run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneReport {
    pub result: ExecutionResult,
    pub code: u8,
    pub source: String,
    pub target: Option<String>,
    pub method: Option<BackupMethod>,
    pub artifact: Option<String>,
    /// Position of the restored set within `artifact`.
    pub backup_set: Option<u32>,
    pub fresh_backup: bool,
    pub files: Vec<FileRelocation>,
    pub error: Option<String>,
    pub engine_error_number: Option<i32>,
    pub started_at: NaiveDateTime,
}

impl CloneReport {
    fn started(request: &CloneRequest, now: NaiveDateTime) -> Self {
        CloneReport {
            result: ExecutionResult::Success,
            code: ExecutionResult::Success.code(),
            source: request.source_database.clone(),
            target: request.target_database.clone(),
            method: None,
            artifact: None,
            backup_set: None,
            fresh_backup: false,
            files: Vec::new(),
            error: None,
            engine_error_number: None,
            started_at: now,
        }
    }

    fn fail(mut self, err: &CloneError) -> Self {
        self.result = err.result();
        self.code = self.result.code();
        self.error = Some(err.to_string());
        self.engine_error_number = err.engine_error().and_then(|e| e.number);
        if let CloneError::BackupFailed { artifact, .. } = err {
            if self.artifact.is_none() && !artifact.is_empty() {
                self.artifact = Some(artifact.clone());
                self.fresh_backup = true;
            }
        }
        self
    }
}

/// Current time on the engine host, or `fallback` when the engine cannot say.
///
/// Backup finish dates in the catalog are engine-local, so the age window and
/// the synthesized names are computed from this clock.
pub fn engine_now(engine: &dyn EngineAdmin, fallback: NaiveDateTime) -> NaiveDateTime {
    engine.server_time().unwrap_or_else(|e| {
        warn!("Could not read the engine clock ({}), using local time", e);
        fallback
    })
}

/// Runs every stage in order and reports the terminal result. A failing stage
/// stops the run; nothing after it is attempted.
///
/// The capacity stage flips instance-wide options, so runs against the same
/// instance must be serialized by the caller.
pub fn run_clone_flow(
    engine: &dyn EngineAdmin,
    volumes: &dyn VolumeQuery,
    request: &CloneRequest,
    now: NaiveDateTime,
) -> CloneReport {
    info!("🚀 Starting clone of {}", request.source_database);
    let mut report = CloneReport::started(request, now);
    match run_stages(engine, volumes, request, now, &mut report) {
        Ok(()) => {
            info!(
                "✅ Clone of {} completed as {}",
                report.source,
                report.target.as_deref().unwrap_or_default()
            );
            report
        }
        Err(e) => {
            error!("❌ Clone of {} failed: {}", request.source_database, e);
            report.fail(&e)
        }
    }
}

fn run_stages(
    engine: &dyn EngineAdmin,
    volumes: &dyn VolumeQuery,
    request: &CloneRequest,
    now: NaiveDateTime,
    report: &mut CloneReport,
) -> Result<()> {
    let validated = preflight::validate(engine, request, now)?;
    report.target = Some(validated.target_name.clone());

    let capacity = capacity::assess(engine, volumes, &validated.source)?;

    let candidate = selector::select(engine, request, now);
    report.method = Some(candidate.method);

    let ctx = PlanContext {
        source: &validated.source.name,
        target: &validated.target_name,
        dump_directory: request.dump_directory.as_deref(),
        default_paths: &capacity.default_paths,
        now,
    };
    let prepared = plan::prepare(engine, &candidate, &ctx)?;
    report.artifact = Some(prepared.artifact.path.clone());
    report.backup_set = Some(prepared.artifact.position);
    report.fresh_backup = prepared.fresh_backup;
    report.files = prepared.plan.relocations.clone();

    execute::execute(engine, &prepared.plan, &prepared.artifact)
}
