use super::PlatformError;

pub trait PlatformModule: Send + Sync {
    fn name(&self) -> &'static str;
    fn initialize(&self) -> Result<(), PlatformError>;

    /// Allows the runtime to signal shutdown so the platform module can release
    /// resources it acquired in `initialize`. The default implementation does
    /// nothing so modules without persistent resources can ignore this call.
    fn shutdown(&self) {}
}

pub struct PlatformRegistration {
    pub module: &'static dyn PlatformModule,
}

inventory::collect!(PlatformRegistration);

pub fn platform_modules() -> impl Iterator<Item = &'static dyn PlatformModule> {
    inventory::iter::<PlatformRegistration>.into_iter().map(|entry| entry.module)
}
