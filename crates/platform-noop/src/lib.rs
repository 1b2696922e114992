//! Stub platform for every target without Windows integration.
//!
//! All providers answer with deterministic safe defaults: nothing is running,
//! the registry is empty and absorbs writes, the current process is not
//! elevated and ACL changes are accepted without effect. Callers therefore see
//! the same signatures and error shapes as on Windows.

use std::path::{Path, PathBuf};

use tracing::debug;
use winbridge_core::platform::{
    AclProvider, ElevationOutcome, ElevationProvider, PlatformError, PlatformModule,
    ProcessProvider, RegistryProvider,
};
use winbridge_core::types::{AclEntry, ProcessRecord, RegistryHive};

#[cfg(not(target_os = "windows"))]
mod init {
    use super::NOOP_PLATFORM;
    use winbridge_core::platform::{
        register_acl_provider, register_elevation_provider, register_platform_module,
        register_process_provider, register_registry_provider,
    };

    register_platform_module!(&NOOP_PLATFORM);
    register_process_provider!(&NOOP_PLATFORM);
    register_registry_provider!(&NOOP_PLATFORM);
    register_elevation_provider!(&NOOP_PLATFORM);
    register_acl_provider!(&NOOP_PLATFORM);
}

static NOOP_PLATFORM: NoopPlatform = NoopPlatform;

/// The platform module registered by this crate.
pub fn platform_module() -> &'static dyn PlatformModule {
    &NOOP_PLATFORM
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPlatform;

impl NoopPlatform {
    const NAME: &'static str = "Noop Platform";
}

impl PlatformModule for NoopPlatform {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&self) -> Result<(), PlatformError> {
        debug!("noop platform active; Windows integration calls have no effect");
        Ok(())
    }
}

impl ProcessProvider for NoopPlatform {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn snapshot(&self) -> Result<Vec<ProcessRecord>, PlatformError> {
        Ok(Vec::new())
    }

    fn terminate(&self, pid: u32) -> Result<(), PlatformError> {
        Err(PlatformError::not_found(format!("process {pid} is not managed on this platform")))
    }

    fn is_elevated(&self, _pid: u32) -> Result<bool, PlatformError> {
        Ok(false)
    }
}

impl RegistryProvider for NoopPlatform {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn key_exists(&self, _hive: RegistryHive, _path: &str) -> Result<bool, PlatformError> {
        Ok(false)
    }

    fn read_value(
        &self,
        _hive: RegistryHive,
        _path: &str,
        _name: &str,
    ) -> Result<Option<String>, PlatformError> {
        Ok(None)
    }

    fn write_value(
        &self,
        hive: RegistryHive,
        path: &str,
        name: &str,
        _value: &str,
    ) -> Result<(), PlatformError> {
        debug!(%hive, key = path, value = name, "registry write ignored");
        Ok(())
    }

    fn delete_value(
        &self,
        _hive: RegistryHive,
        _path: &str,
        _name: &str,
    ) -> Result<bool, PlatformError> {
        Ok(false)
    }

    fn delete_tree(&self, _hive: RegistryHive, _path: &str) -> Result<bool, PlatformError> {
        Ok(false)
    }
}

impl ElevationProvider for NoopPlatform {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_elevated(&self) -> Result<bool, PlatformError> {
        Ok(false)
    }

    fn launch_elevated(
        &self,
        executable: &Path,
        _args: &[String],
    ) -> Result<ElevationOutcome, PlatformError> {
        debug!(executable = %executable.display(), "elevation not available on this platform");
        Ok(ElevationOutcome::Unavailable)
    }

    fn protected_directories(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

impl AclProvider for NoopPlatform {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, path: &Path, entries: &[AclEntry]) -> Result<(), PlatformError> {
        debug!(path = %path.display(), entries = entries.len(), "ACL change ignored");
        Ok(())
    }

    fn revoke(&self, _path: &Path, _principal: &str) -> Result<(), PlatformError> {
        Ok(())
    }

    fn reset(&self, _path: &Path) -> Result<(), PlatformError> {
        Ok(())
    }
}
