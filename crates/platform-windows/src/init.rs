use tracing::debug;
use winbridge_core::platform::{PlatformError, PlatformModule};
use winbridge_core::register_platform_module;

static WINDOWS_PLATFORM: WindowsPlatform = WindowsPlatform;

register_platform_module!(&WINDOWS_PLATFORM);

pub fn platform_module() -> &'static dyn PlatformModule {
    &WINDOWS_PLATFORM
}

struct WindowsPlatform;

impl PlatformModule for WindowsPlatform {
    fn name(&self) -> &'static str {
        "Windows Platform"
    }

    fn initialize(&self) -> Result<(), PlatformError> {
        let elevated = crate::elevation::current_process_elevated().ok();
        debug!(?elevated, "Windows platform initialized");
        Ok(())
    }
}
