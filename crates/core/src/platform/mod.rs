mod acl;
mod elevation;
mod error;
mod module;
mod process;
mod providers;
mod registry;

pub use acl::{AclProvider, AclProviderRegistration, acl_providers};
pub use elevation::{
    ElevationOutcome, ElevationProvider, ElevationProviderRegistration, elevation_providers,
};
pub use error::{PlatformError, PlatformErrorKind};
pub use module::{PlatformModule, PlatformRegistration, platform_modules};
pub use process::{ProcessProvider, ProcessProviderRegistration, process_providers};
pub use providers::PlatformProviders;
pub use registry::{
    RegistryProvider, RegistryProviderRegistration, join_key, key_ancestry, registry_providers,
};

#[macro_export]
macro_rules! register_platform_module {
    ($module:expr) => {
        inventory::submit! {
            $crate::platform::PlatformRegistration { module: $module }
        }
    };
}

pub use crate::register_acl_provider;
pub use crate::register_elevation_provider;
pub use crate::register_process_provider;
pub use crate::register_registry_provider;
pub use crate::register_platform_module;
