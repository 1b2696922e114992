use crate::platform::PlatformError;
use std::path::{Path, PathBuf};

/// Result of asking the OS to start an elevated process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElevationOutcome {
    /// The elevated process was started.
    Started,
    /// The user refused the elevation prompt.
    Declined,
    /// The platform has no elevation mechanism.
    Unavailable,
}

impl ElevationOutcome {
    pub fn started(self) -> bool {
        matches!(self, Self::Started)
    }
}

/// Token inspection and the OS elevation prompt for the current process.
pub trait ElevationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Elevation flag of the current process token. Must be re-read on every
    /// call; elevation can change across a relaunch.
    fn is_elevated(&self) -> Result<bool, PlatformError>;

    /// Starts `executable` with `args` through the elevation prompt and
    /// returns without waiting for the new process.
    fn launch_elevated(
        &self,
        executable: &Path,
        args: &[String],
    ) -> Result<ElevationOutcome, PlatformError>;

    /// Directories that are known to require elevation for writes.
    fn protected_directories(&self) -> Vec<PathBuf>;
}

pub struct ElevationProviderRegistration {
    pub provider: &'static dyn ElevationProvider,
}

inventory::collect!(ElevationProviderRegistration);

pub fn elevation_providers() -> impl Iterator<Item = &'static dyn ElevationProvider> {
    inventory::iter::<ElevationProviderRegistration>.into_iter().map(|entry| entry.provider)
}

#[macro_export]
macro_rules! register_elevation_provider {
    ($provider:expr) => {
        inventory::submit! {
            $crate::platform::ElevationProviderRegistration { provider: $provider }
        }
    };
}
