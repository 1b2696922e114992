use crate::platform::PlatformError;
use crate::types::AclEntry;
use std::path::Path;

/// Explicit access-control entries on file-system objects.
pub trait AclProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Grants every entry in one write. Entries must already be normalised
    /// (one per principal); existing entries for other principals stay.
    fn apply(&self, path: &Path, entries: &[AclEntry]) -> Result<(), PlatformError>;

    /// Removes all explicit entries for `principal`. Absence is not an error.
    fn revoke(&self, path: &Path, principal: &str) -> Result<(), PlatformError>;

    /// Drops every explicit entry so only inherited permissions remain.
    fn reset(&self, path: &Path) -> Result<(), PlatformError>;
}

pub struct AclProviderRegistration {
    pub provider: &'static dyn AclProvider,
}

inventory::collect!(AclProviderRegistration);

pub fn acl_providers() -> impl Iterator<Item = &'static dyn AclProvider> {
    inventory::iter::<AclProviderRegistration>.into_iter().map(|entry| entry.provider)
}

#[macro_export]
macro_rules! register_acl_provider {
    ($provider:expr) => {
        inventory::submit! {
            $crate::platform::AclProviderRegistration { provider: $provider }
        }
    };
}
