//! In-memory mock platform for winbridge tests.
//!
//! Nothing here is registered through inventory: tests hand the providers to
//! the runtime explicitly via [`MockPlatform::providers`], so the OS platform
//! selected by the link crate stays the only registered one.

mod acl;
mod elevation;
mod process;
mod registry;

use std::sync::{Mutex, MutexGuard, PoisonError};

use winbridge_core::platform::{PlatformError, PlatformModule, PlatformProviders};

pub use acl::MockAcl;
pub use elevation::{ElevationRequest, MockElevation};
pub use process::MockProcessTable;
pub use registry::MockRegistry;

pub(crate) const MOCK_NAME: &str = "Mock Platform";

/// Shared instance for tests that go through process-global state. Call
/// [`reset_mock_platform`] first and serialise such tests.
pub static MOCK_PLATFORM: MockPlatform = MockPlatform::new();

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MockPlatform {
    pub processes: MockProcessTable,
    pub registry: MockRegistry,
    pub elevation: MockElevation,
    pub acl: MockAcl,
}

impl MockPlatform {
    pub const fn new() -> Self {
        Self {
            processes: MockProcessTable::new(),
            registry: MockRegistry::new(),
            elevation: MockElevation::new(),
            acl: MockAcl::new(),
        }
    }

    /// A private platform that lives for the rest of the test binary.
    pub fn leaked() -> &'static Self {
        Box::leak(Box::new(Self::new()))
    }

    pub fn providers(&'static self) -> PlatformProviders {
        PlatformProviders {
            processes: &self.processes,
            registry: &self.registry,
            elevation: &self.elevation,
            acl: &self.acl,
        }
    }

    pub fn reset(&self) {
        self.processes.reset();
        self.registry.reset();
        self.elevation.reset();
        self.acl.clear();
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformModule for MockPlatform {
    fn name(&self) -> &'static str {
        MOCK_NAME
    }

    fn initialize(&self) -> Result<(), PlatformError> {
        Ok(())
    }
}

/// Clears every store and switch of [`MOCK_PLATFORM`].
pub fn reset_mock_platform() {
    MOCK_PLATFORM.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serial_test::serial;
    use winbridge_core::platform::{ProcessProvider, RegistryProvider};
    use winbridge_core::types::RegistryHive;

    #[rstest]
    #[serial]
    fn reset_clears_shared_platform() {
        reset_mock_platform();
        MOCK_PLATFORM.processes.spawn(5, "app.exe", None);
        MOCK_PLATFORM.registry.write_value(RegistryHive::CurrentUser, "Software", "", "x").unwrap();

        reset_mock_platform();

        assert!(!MOCK_PLATFORM.processes.is_running(5));
        assert!(MOCK_PLATFORM.registry.dump().is_empty());
    }

    #[rstest]
    fn providers_point_at_the_leaked_instance() {
        let platform = MockPlatform::leaked();
        platform.processes.spawn(7, "tool.exe", None);

        let providers = platform.providers();
        assert_eq!(providers.processes.name(), MOCK_NAME);
        assert_eq!(providers.processes.snapshot().unwrap().len(), 1);
        assert!(MockPlatform::leaked().processes.snapshot().unwrap().is_empty());
    }
}
