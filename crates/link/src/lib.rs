//! Selects the platform backend for the build target.
//!
//! Provider registrations live in inventory sections of the platform crates.
//! A crate that only depends on them transitively may see those sections
//! discarded by the linker, so binaries invoke [`winbridge_link_os_providers!`]
//! once and libraries call [`os_platform_module`] before discovery.

use winbridge_core::platform::PlatformModule;

#[doc(hidden)]
pub use winbridge_core::platform::PlatformModule as __PlatformModule;

/// The platform module of the backend compiled for this target.
pub fn os_platform_module() -> &'static dyn PlatformModule {
    #[cfg(target_os = "windows")]
    {
        winbridge_platform_windows::platform_module()
    }
    #[cfg(not(target_os = "windows"))]
    {
        winbridge_platform_noop::platform_module()
    }
}

/// Keeps the OS backend of the current target linked into the calling binary.
#[macro_export]
macro_rules! winbridge_link_os_providers {
    () => {
        #[used]
        static __WINBRIDGE_OS_PLATFORM: fn() -> &'static dyn $crate::__PlatformModule =
            $crate::os_platform_module;
    };
}
