// dbclone/src/clone/selector.rs
use chrono::{Duration, NaiveDateTime};
use tracing::{info, warn};

use crate::clone::model::{BackupCandidate, CloneRequest};
use crate::engine::{BackupCatalogEntry, BackupType, DeviceKind, EngineAdmin};

/// Steps of the backup source decision.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Start,
    ThirdPartyCheck(String),
    NativeCheck,
    NativeVerify(BackupCatalogEntry),
    Decided(BackupCandidate),
}

/// Inclusive window of acceptable backup finish times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl AgeWindow {
    /// A window reaching past the earliest representable time starts there.
    pub fn ending_at(now: NaiveDateTime, max_age_days: u32) -> Self {
        let from = Duration::try_days(i64::from(max_age_days))
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(NaiveDateTime::MIN);
        AgeWindow { from, to: now }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.from <= at && at <= self.to
    }
}

/// Decides where the restore will read from. Never fails: anything that goes
/// wrong while looking for a reusable backup ends in a fresh copy-only backup.
pub fn select(
    engine: &dyn EngineAdmin,
    request: &CloneRequest,
    now: NaiveDateTime,
) -> BackupCandidate {
    let database = request.source_database.as_str();
    let window = AgeWindow::ending_at(now, request.max_backup_age_days);
    let mut step = Step::Start;

    loop {
        step = match step {
            Step::Start => match request.backup_tool.as_deref().map(str::trim) {
                Some(tool) if !tool.is_empty() => Step::ThirdPartyCheck(tool.to_string()),
                _ => Step::NativeCheck,
            },
            Step::ThirdPartyCheck(tool) => {
                let catalog = read_catalog(engine, database);
                match find_third_party(&catalog, database, &tool, &window) {
                    Some(entry) => {
                        info!(
                            "Found {} backup of {} finished {}; taking a fresh copy-only backup",
                            entry.software_name, database, entry.finished_at
                        );
                        Step::Decided(BackupCandidate::fresh())
                    }
                    None => {
                        info!(
                            "No recent full backup of {} by '{}', checking native backups",
                            database, tool
                        );
                        Step::NativeCheck
                    }
                }
            }
            Step::NativeCheck => {
                let catalog = read_catalog(engine, database);
                match find_native(&catalog, database, &window) {
                    Some(entry) => Step::NativeVerify(entry.clone()),
                    None => {
                        info!(
                            "No full backup of {} within {} day(s), taking a fresh copy-only backup",
                            database, request.max_backup_age_days
                        );
                        Step::Decided(BackupCandidate::fresh())
                    }
                }
            }
            Step::NativeVerify(entry) => {
                let artifact = entry.artifact();
                match engine.verify_backup(&artifact) {
                    Ok(()) => {
                        info!(
                            "Reusing verified backup {} finished {}",
                            artifact, entry.finished_at
                        );
                        Step::Decided(BackupCandidate::verified_reuse(artifact, entry.finished_at))
                    }
                    Err(e) => {
                        warn!(
                            "Backup {} failed verification ({}), taking a fresh copy-only backup",
                            artifact, e
                        );
                        Step::Decided(BackupCandidate::fresh())
                    }
                }
            }
            Step::Decided(candidate) => return candidate,
        };
    }
}

fn read_catalog(engine: &dyn EngineAdmin, database: &str) -> Vec<BackupCatalogEntry> {
    engine.backup_catalog(database).unwrap_or_else(|e| {
        warn!("Could not read backup history of {}: {}", database, e);
        Vec::new()
    })
}

fn is_recent_full(entry: &BackupCatalogEntry, database: &str, window: &AgeWindow) -> bool {
    entry.backup_type == BackupType::Full
        && entry.database.eq_ignore_ascii_case(database)
        && window.contains(entry.finished_at)
}

fn find_third_party<'a>(
    catalog: &'a [BackupCatalogEntry],
    database: &str,
    tool: &str,
    window: &AgeWindow,
) -> Option<&'a BackupCatalogEntry> {
    let tool = tool.to_lowercase();
    catalog
        .iter()
        .filter(|e| is_recent_full(e, database, window))
        .filter(|e| e.software_name.to_lowercase().contains(&tool))
        .max_by_key(|e| e.finished_at)
}

/// Most recent full backup on a disk device the restore can read.
fn find_native<'a>(
    catalog: &'a [BackupCatalogEntry],
    database: &str,
    window: &AgeWindow,
) -> Option<&'a BackupCatalogEntry> {
    catalog
        .iter()
        .filter(|e| is_recent_full(e, database, window))
        .filter(|e| e.device_kind == DeviceKind::Disk && !e.physical_path.trim().is_empty())
        .max_by_key(|e| e.finished_at)
}
