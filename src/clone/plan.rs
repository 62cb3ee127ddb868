// dbclone/src/clone/plan.rs
use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::clone::model::{
    BackupCandidate, BackupMethod, FileDescriptor, FileKind, FileRelocation,
    NAME_TIMESTAMP_FORMAT, RestorePlan,
};
use crate::engine::{BackupArtifact, DefaultPaths, EngineAdmin, EngineError};
use crate::errors::{CloneError, Result};

pub const PRIMARY_DATA_EXTENSION: &str = "mdf";
pub const SECONDARY_DATA_EXTENSION: &str = "ndf";
pub const LOG_EXTENSION: &str = "ldf";
pub const BACKUP_EXTENSION: &str = "bak";

/// Backup artifact to restore from, and where each of its files goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRestore {
    pub artifact: BackupArtifact,
    pub fresh_backup: bool,
    pub plan: RestorePlan,
}

/// Inputs of the plan stage that come from earlier stages.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub dump_directory: Option<&'a str>,
    pub default_paths: &'a DefaultPaths,
    pub now: NaiveDateTime,
}

/// Joins an engine-side directory and file name with the separator the
/// directory already uses.
pub fn join_engine_path(directory: &str, file_name: &str) -> String {
    let separator = if directory.contains('\\') { '\\' } else { '/' };
    let trimmed = directory.trim_end_matches(['\\', '/']);
    format!("{}{}{}", trimmed, separator, file_name)
}

pub fn fresh_backup_path(dump_directory: &str, source: &str, now: NaiveDateTime) -> String {
    let file_name = format!(
        "{}_{}.{}",
        source,
        now.format(NAME_TIMESTAMP_FORMAT),
        BACKUP_EXTENSION
    );
    join_engine_path(dump_directory, &file_name)
}

/// Takes the fresh backup when the candidate asks for one, reads the file
/// manifest of the artifact and relocates every file onto the target name.
pub fn prepare(
    engine: &dyn EngineAdmin,
    candidate: &BackupCandidate,
    ctx: &PlanContext<'_>,
) -> Result<PreparedRestore> {
    let reusable = match (candidate.method, candidate.verified, &candidate.artifact) {
        (BackupMethod::ReuseNative, true, Some(artifact)) => Some(artifact.clone()),
        (BackupMethod::ReuseNative, _, _) => {
            warn!("Reuse candidate is not verified, taking a fresh backup instead");
            None
        }
        (BackupMethod::FreshCopyOnly, _, _) => None,
    };

    let (artifact, fresh_backup) = match reusable {
        Some(artifact) => (artifact, false),
        None => (take_fresh_backup(engine, ctx)?, true),
    };

    let files = engine
        .file_manifest(&artifact)
        .map_err(|source| CloneError::FileListReadFailed {
            artifact: artifact.to_string(),
            source,
        })?;
    info!("{} contains {} file(s)", artifact, files.len());

    let plan = build_plan(ctx.target, files, ctx.default_paths).map_err(|source| {
        CloneError::FileListReadFailed {
            artifact: artifact.to_string(),
            source,
        }
    })?;

    Ok(PreparedRestore {
        artifact,
        fresh_backup,
        plan,
    })
}

fn take_fresh_backup(engine: &dyn EngineAdmin, ctx: &PlanContext<'_>) -> Result<BackupArtifact> {
    let dump_directory = ctx
        .dump_directory
        .filter(|dir| !dir.trim().is_empty())
        .or(ctx.default_paths.backup.as_deref())
        .ok_or_else(|| CloneError::BackupFailed {
            artifact: String::new(),
            source: EngineError::client(
                "no dump directory configured and the instance default backup directory is unknown",
            ),
        })?;

    let path = fresh_backup_path(dump_directory, ctx.source, ctx.now);
    info!("Taking copy-only backup of {} to {}", ctx.source, path);
    engine
        .backup_copy_only(ctx.source, &path)
        .map_err(|source| CloneError::BackupFailed {
            artifact: path.clone(),
            source,
        })?;
    info!("Backup of {} completed", ctx.source);
    Ok(BackupArtifact::single_set(path))
}

/// Maps each file of a manifest to its path for `target`.
///
/// Data files become `<target>_<n>` (`.mdf` for the first, `.ndf` after) in the
/// default data directory, log files `<target>_log_<n>.ldf` in the default log
/// directory. Each kind is numbered from 1 in ascending file-id order.
pub fn build_plan(
    target: &str,
    files: impl IntoIterator<Item = FileDescriptor>,
    default_paths: &DefaultPaths,
) -> std::result::Result<RestorePlan, EngineError> {
    let mut data_files = Vec::new();
    let mut log_files = Vec::new();
    for file in files {
        match file.kind {
            FileKind::Data => data_files.push(file),
            FileKind::Log => log_files.push(file),
        }
    }
    if data_files.is_empty() {
        return Err(EngineError::client("backup file list contains no data file"));
    }
    if log_files.is_empty() {
        return Err(EngineError::client("backup file list contains no log file"));
    }

    let data_dir = default_paths
        .data
        .as_deref()
        .ok_or_else(|| EngineError::client("instance default data directory is unknown"))?;
    let log_dir = default_paths
        .log
        .as_deref()
        .ok_or_else(|| EngineError::client("instance default log directory is unknown"))?;

    data_files.sort_by_key(|f| f.file_id);
    log_files.sort_by_key(|f| f.file_id);

    let data = data_files.into_iter().enumerate().map(|(i, file)| {
        let n = i + 1;
        let extension = if n == 1 {
            PRIMARY_DATA_EXTENSION
        } else {
            SECONDARY_DATA_EXTENSION
        };
        FileRelocation {
            logical_name: file.logical_name,
            kind: FileKind::Data,
            physical_path: join_engine_path(data_dir, &format!("{}_{}.{}", target, n, extension)),
        }
    });
    let log = log_files.into_iter().enumerate().map(|(i, file)| FileRelocation {
        logical_name: file.logical_name,
        kind: FileKind::Log,
        physical_path: join_engine_path(
            log_dir,
            &format!("{}_log_{}.{}", target, i + 1, LOG_EXTENSION),
        ),
    });

    Ok(RestorePlan {
        target_database: target.to_string(),
        relocations: data.chain(log).collect(),
    })
}
