use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use winbridge_core::platform::{AclProvider, PlatformError};
use winbridge_core::types::AclEntry;

use crate::lock;

struct AclState {
    explicit: BTreeMap<PathBuf, Vec<AclEntry>>,
    denied: bool,
}

impl AclState {
    const fn new() -> Self {
        Self { explicit: BTreeMap::new(), denied: false }
    }
}

/// Explicit ACL entries per path. Grants replace an existing entry for the
/// same principal and otherwise append.
pub struct MockAcl {
    state: Mutex<AclState>,
}

impl MockAcl {
    pub const fn new() -> Self {
        Self { state: Mutex::new(AclState::new()) }
    }

    /// Drops every path's entries and the denial flag.
    pub fn clear(&self) {
        *lock(&self.state) = AclState::new();
    }

    /// Every change fails with `AccessDenied` while set.
    pub fn deny_changes(&self, denied: bool) {
        lock(&self.state).denied = denied;
    }

    pub fn entries(&self, path: &Path) -> Vec<AclEntry> {
        lock(&self.state).explicit.get(path).cloned().unwrap_or_default()
    }

    fn check_allowed(state: &AclState, path: &Path) -> Result<(), PlatformError> {
        if state.denied {
            let message = format!("cannot change ACL of {}", path.display());
            return Err(PlatformError::access_denied(message));
        }
        Ok(())
    }
}

impl Default for MockAcl {
    fn default() -> Self {
        Self::new()
    }
}

impl AclProvider for MockAcl {
    fn name(&self) -> &'static str {
        crate::MOCK_NAME
    }

    fn apply(&self, path: &Path, entries: &[AclEntry]) -> Result<(), PlatformError> {
        let mut state = lock(&self.state);
        Self::check_allowed(&state, path)?;
        let explicit = state.explicit.entry(path.to_path_buf()).or_default();
        for entry in entries {
            let existing =
                explicit.iter_mut().find(|existing| existing.principal_matches(&entry.principal));
            match existing {
                Some(existing) => *existing = entry.clone(),
                None => explicit.push(entry.clone()),
            }
        }
        Ok(())
    }

    fn revoke(&self, path: &Path, principal: &str) -> Result<(), PlatformError> {
        let mut state = lock(&self.state);
        Self::check_allowed(&state, path)?;
        if let Some(explicit) = state.explicit.get_mut(path) {
            explicit.retain(|entry| !entry.principal_matches(principal));
        }
        Ok(())
    }

    fn reset(&self, path: &Path) -> Result<(), PlatformError> {
        let mut state = lock(&self.state);
        Self::check_allowed(&state, path)?;
        state.explicit.remove(path);
        Ok(())
    }
}
