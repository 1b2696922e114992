use super::{
    AclProvider, ElevationProvider, PlatformError, PlatformErrorKind, ProcessProvider,
    RegistryProvider, acl_providers, elevation_providers, process_providers, registry_providers,
};

/// One provider per capability, as used by the runtime components.
#[derive(Clone, Copy)]
pub struct PlatformProviders {
    pub processes: &'static dyn ProcessProvider,
    pub registry: &'static dyn RegistryProvider,
    pub elevation: &'static dyn ElevationProvider,
    pub acl: &'static dyn AclProvider,
}

impl PlatformProviders {
    /// Picks the first registered provider of every capability.
    pub fn discover() -> Result<Self, PlatformError> {
        Ok(Self {
            processes: first(process_providers(), "ProcessProvider")?,
            registry: first(registry_providers(), "RegistryProvider")?,
            elevation: first(elevation_providers(), "ElevationProvider")?,
            acl: first(acl_providers(), "AclProvider")?,
        })
    }
}

impl std::fmt::Debug for PlatformProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformProviders")
            .field("processes", &self.processes.name())
            .field("registry", &self.registry.name())
            .field("elevation", &self.elevation.name())
            .field("acl", &self.acl.name())
            .finish()
    }
}

fn first<T: ?Sized + 'static>(
    mut providers: impl Iterator<Item = &'static T>,
    capability: &str,
) -> Result<&'static T, PlatformError> {
    providers.next().ok_or_else(|| {
        PlatformError::new(
            PlatformErrorKind::UnsupportedPlatform,
            format!("no {capability} registered"),
        )
    })
}
