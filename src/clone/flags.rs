// dbclone/src/clone/flags.rs
use tracing::{error, info};

use crate::engine::{ConfigFlag, EngineAdmin, EngineError};

/// Flags `xp_cmdshell` depends on, in the order they must be enabled.
pub const VOLUME_QUERY_FLAGS: [ConfigFlag; 2] =
    [ConfigFlag::ShowAdvancedOptions, ConfigFlag::XpCmdShell];

/// Holds instance-wide configuration flags enabled for the lifetime of the guard.
///
/// Only flags found disabled are switched on; dropping the guard switches them
/// back off in reverse order, whatever path the caller leaves by. The flags are
/// shared by every session on the instance, so two runs against the same
/// instance must not overlap.
pub struct InstanceFlagsGuard<'a> {
    engine: &'a dyn EngineAdmin,
    changed: Vec<ConfigFlag>,
}

impl<'a> InstanceFlagsGuard<'a> {
    /// Enables every disabled flag in `flags`. On failure the flags already
    /// changed are restored before the error is returned.
    pub fn acquire(
        engine: &'a dyn EngineAdmin,
        flags: &[ConfigFlag],
    ) -> Result<Self, EngineError> {
        let mut guard = InstanceFlagsGuard {
            engine,
            changed: Vec::new(),
        };
        for &flag in flags {
            if engine.config_flag(flag)? {
                continue;
            }
            engine.set_config_flag(flag, true)?;
            info!("Temporarily enabled instance option '{}'", flag.option_name());
            guard.changed.push(flag);
        }
        Ok(guard)
    }

    #[cfg(test)]
    pub fn changed(&self) -> &[ConfigFlag] {
        &self.changed
    }
}

impl Drop for InstanceFlagsGuard<'_> {
    fn drop(&mut self) {
        for flag in self.changed.iter().rev() {
            match self.engine.set_config_flag(*flag, false) {
                Ok(()) => info!("Restored instance option '{}' to disabled", flag.option_name()),
                Err(e) => error!(
                    "Failed to restore instance option '{}' to disabled: {}",
                    flag.option_name(),
                    e
                ),
            }
        }
    }
}
