use crate::platform::PlatformError;
use crate::types::ProcessRecord;

/// Native process enumeration and termination.
///
/// Every call must query the OS afresh; implementations never cache a
/// snapshot because pids are recycled.
pub trait ProcessProvider: Send + Sync {
    /// Human-readable name for diagnostics (e.g. `"Toolhelp32"`).
    fn name(&self) -> &'static str;

    /// Lists every live process with its parent link.
    ///
    /// Records come back with `is_elevated == false`; token inspection is a
    /// separate call. A failure of the listing facility itself is reported as
    /// [`PlatformErrorKind::SubsystemUnavailable`](crate::platform::PlatformErrorKind::SubsystemUnavailable).
    fn snapshot(&self) -> Result<Vec<ProcessRecord>, PlatformError>;

    /// Signals a single process to terminate.
    ///
    /// Returns a `NotFound` error when the pid no longer exists and
    /// `AccessDenied` when the OS refuses.
    fn terminate(&self, pid: u32) -> Result<(), PlatformError>;

    /// Reads the elevation flag from the process' security token.
    fn is_elevated(&self, pid: u32) -> Result<bool, PlatformError>;
}

pub struct ProcessProviderRegistration {
    pub provider: &'static dyn ProcessProvider,
}

inventory::collect!(ProcessProviderRegistration);

pub fn process_providers() -> impl Iterator<Item = &'static dyn ProcessProvider> {
    inventory::iter::<ProcessProviderRegistration>.into_iter().map(|entry| entry.provider)
}

#[macro_export]
macro_rules! register_process_provider {
    ($provider:expr) => {
        inventory::submit! {
            $crate::platform::ProcessProviderRegistration { provider: $provider }
        }
    };
}
