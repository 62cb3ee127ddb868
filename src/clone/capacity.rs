// dbclone/src/clone/capacity.rs
use tracing::{info, warn};

use crate::clone::flags::{InstanceFlagsGuard, VOLUME_QUERY_FLAGS};
use crate::clone::model::{DatabaseRef, DiskVolume, SourceFootprint, VolumeRole};
use crate::engine::{DefaultPaths, EngineAdmin, VolumeQuery};
use crate::errors::{CloneError, Result};

/// Virtual log segment count above which backup and restore slow down noticeably.
pub const VLF_ADVISORY_THRESHOLD: u64 = 1000;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Measurements taken by the capacity stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityReport {
    pub footprint: SourceFootprint,
    pub volumes: Vec<DiskVolume>,
    pub vlf_count: Option<u64>,
    pub default_paths: DefaultPaths,
}

impl CapacityReport {
    pub fn volume(&self, role: VolumeRole) -> Option<&DiskVolume> {
        self.volumes.iter().find(|v| v.role == role)
    }
}

/// Checks that the default data and log volumes can hold a copy of `source`.
///
/// Data is checked before log. A reading that could not be taken counts as
/// insufficient.
pub fn assess(
    engine: &dyn EngineAdmin,
    volumes: &dyn VolumeQuery,
    source: &DatabaseRef,
) -> Result<CapacityReport> {
    let footprint = measure_footprint(engine, &source.name);
    let vlf_count = count_virtual_logs(engine, &source.name);

    let default_paths = engine.default_paths().unwrap_or_else(|e| {
        warn!("Could not read instance default directories: {}", e);
        DefaultPaths::default()
    });

    let readings = read_volumes(engine, volumes, &default_paths);
    for volume in &readings {
        info!(
            "{} volume {}: free {}",
            volume.role,
            volume.path.as_deref().unwrap_or("<unknown>"),
            describe_mb(volume.free_mb)
        );
    }

    let report = CapacityReport {
        footprint,
        volumes: readings,
        vlf_count,
        default_paths,
    };

    let data_free = report.volume(VolumeRole::Data).and_then(|v| v.free_mb);
    if !has_room(data_free, footprint.data_mb) {
        return Err(CloneError::InsufficientDataDisk {
            required_mb: footprint.data_mb,
            free_mb: data_free,
        });
    }
    let log_free = report.volume(VolumeRole::Log).and_then(|v| v.free_mb);
    if !has_room(log_free, footprint.log_mb) {
        return Err(CloneError::InsufficientLogDisk {
            required_mb: footprint.log_mb,
            free_mb: log_free,
        });
    }

    info!("Disk capacity check passed for {}", source.name);
    Ok(report)
}

/// Free space must be known and strictly larger than a known requirement.
fn has_room(free_mb: Option<u64>, required_mb: Option<u64>) -> bool {
    matches!((free_mb, required_mb), (Some(free), Some(required)) if free > required)
}

fn kb_to_mb(kb: u64) -> u64 {
    kb.div_ceil(1024)
}

fn describe_mb(mb: Option<u64>) -> String {
    mb.map_or_else(|| "unknown".to_string(), |mb| format!("{} MB", mb))
}

fn measure_footprint(engine: &dyn EngineAdmin, database: &str) -> SourceFootprint {
    match engine.file_sizes(database) {
        Ok(sizes) => {
            let footprint = SourceFootprint {
                data_mb: Some(kb_to_mb(sizes.data_kb)),
                log_mb: Some(kb_to_mb(sizes.log_kb)),
                used_mb: Some(kb_to_mb(sizes.used_kb)),
            };
            info!(
                "{} allocates {} data, {} log, {} used",
                database,
                describe_mb(footprint.data_mb),
                describe_mb(footprint.log_mb),
                describe_mb(footprint.used_mb)
            );
            if let (Some(data), Some(used)) = (footprint.data_mb, footprint.used_mb) {
                if used * 2 < data {
                    warn!(
                        "{} uses {} of {} allocated data space; the copy keeps the full allocation",
                        database, used, data
                    );
                }
            }
            footprint
        }
        Err(e) => {
            warn!("Could not measure file sizes of {}: {}", database, e);
            SourceFootprint::default()
        }
    }
}

fn count_virtual_logs(engine: &dyn EngineAdmin, database: &str) -> Option<u64> {
    match engine.virtual_log_count(database) {
        Ok(count) => {
            if count > VLF_ADVISORY_THRESHOLD {
                warn!(
                    "{} has {} virtual log segments (more than {}); backup and restore will be slow",
                    database, count, VLF_ADVISORY_THRESHOLD
                );
            }
            Some(count)
        }
        Err(e) => {
            warn!("Could not count virtual log segments of {}: {}", database, e);
            None
        }
    }
}

/// Reads free space of the default data and log directories while the
/// instance flags needed by the volume query are held.
fn read_volumes(
    engine: &dyn EngineAdmin,
    volumes: &dyn VolumeQuery,
    paths: &DefaultPaths,
) -> Vec<DiskVolume> {
    let targets = [
        (VolumeRole::Data, paths.data.clone()),
        (VolumeRole::Log, paths.log.clone()),
    ];

    let guard = if targets.iter().any(|(_, path)| path.is_some()) {
        match InstanceFlagsGuard::acquire(engine, &VOLUME_QUERY_FLAGS) {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("Could not enable volume query options: {}", e);
                None
            }
        }
    } else {
        None
    };

    let readings: Vec<DiskVolume> = targets
        .into_iter()
        .map(|(role, path)| {
            let free_mb = match (&guard, path.as_deref()) {
                (Some(_), Some(dir)) => match volumes.free_bytes(dir) {
                    Ok(free) => free.map(|bytes| bytes / BYTES_PER_MB),
                    Err(e) => {
                        warn!("Free space query for {} failed: {}", dir, e);
                        None
                    }
                },
                _ => None,
            };
            DiskVolume {
                role,
                path,
                free_mb,
            }
        })
        .collect();

    drop(guard);
    readings
}
