// dbclone/src/clone/preflight.rs
use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::clone::model::{CloneRequest, DatabaseRef, NAME_TIMESTAMP_FORMAT, ReplicaRole};
use crate::engine::EngineAdmin;
use crate::errors::{CloneError, Result};

/// Source and target confirmed usable for a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub source: DatabaseRef,
    pub target_name: String,
}

/// Name given to the copy when the request carries none.
pub fn default_target_name(source: &str, now: NaiveDateTime) -> String {
    format!("{}_COPY_{}", source, now.format(NAME_TIMESTAMP_FORMAT))
}

/// Read-only checks run before anything is changed on the instance.
///
/// A lookup that fails is reported with the code of the check it was serving,
/// since the precondition could not be proven.
pub fn validate(
    engine: &dyn EngineAdmin,
    request: &CloneRequest,
    now: NaiveDateTime,
) -> Result<ValidatedRequest> {
    let source_name = request.source_database.as_str();

    let exists = engine
        .database_exists(source_name)
        .map_err(|e| CloneError::SourceNotFound {
            database: source_name.to_string(),
            reason: format!("lookup failed: {}", e),
        })?;
    if !exists {
        return Err(CloneError::SourceNotFound {
            database: source_name.to_string(),
            reason: "no database with this name is registered".to_string(),
        });
    }

    let target_name = match request.target_database.as_deref() {
        Some(target) => {
            check_target_absent(engine, source_name, target)?;
            target.to_string()
        }
        None => {
            let synthesized = default_target_name(source_name, now);
            info!("No target name supplied, using {}", synthesized);
            synthesized
        }
    };

    let role = check_primary_role(engine, source_name)?;

    info!(
        "Preflight passed: {} -> {} (role: {:?})",
        source_name, target_name, role
    );
    Ok(ValidatedRequest {
        source: DatabaseRef {
            name: source_name.to_string(),
            exists,
            role,
        },
        target_name,
    })
}

fn check_target_absent(engine: &dyn EngineAdmin, source: &str, target: &str) -> Result<()> {
    if target.eq_ignore_ascii_case(source) {
        return Err(CloneError::TargetExists {
            database: target.to_string(),
            reason: "target name is the source database".to_string(),
        });
    }
    let taken = engine
        .database_exists(target)
        .map_err(|e| CloneError::TargetExists {
            database: target.to_string(),
            reason: format!("lookup failed: {}", e),
        })?;
    if taken {
        return Err(CloneError::TargetExists {
            database: target.to_string(),
            reason: "a database with this name already exists".to_string(),
        });
    }
    Ok(())
}

/// The role is only consulted on HA-enabled instances.
fn check_primary_role(engine: &dyn EngineAdmin, source: &str) -> Result<ReplicaRole> {
    let role_error = |reason: String| CloneError::SecondaryReplica {
        database: source.to_string(),
        reason,
    };

    let ha_enabled = engine
        .ha_enabled()
        .map_err(|e| role_error(format!("HA state lookup failed: {}", e)))?;
    if !ha_enabled {
        return Ok(ReplicaRole::NotApplicable);
    }

    let role = engine
        .replica_role(source)
        .map_err(|e| role_error(format!("replica role lookup failed: {}", e)))?;
    match role {
        ReplicaRole::Secondary => Err(role_error(
            "database is a secondary replica on this instance".to_string(),
        )),
        ReplicaRole::NotApplicable => {
            warn!(
                "HA is enabled but {} belongs to no availability group, continuing",
                source
            );
            Ok(role)
        }
        ReplicaRole::Primary => Ok(role),
    }
}
