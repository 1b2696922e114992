use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use tracing::trace;
use winbridge_core::platform::{PlatformError, PlatformErrorKind, RegistryProvider, key_ancestry};
use winbridge_core::types::RegistryHive;

use crate::lock;

type KeyId = (RegistryHive, String);
type Values = BTreeMap<String, (String, String)>;

struct WriteFault {
    remaining: usize,
    kind: PlatformErrorKind,
    /// Keys are created before the value write fails, like `RegCreateKeyEx`
    /// succeeding ahead of a failing `RegSetValueEx`.
    keys_created: bool,
}

struct RegistryState {
    keys: BTreeMap<KeyId, Values>,
    denied_hives: BTreeSet<RegistryHive>,
    write_fault: Option<WriteFault>,
    deny_deletes: bool,
    unavailable: bool,
}

impl RegistryState {
    const fn new() -> Self {
        Self {
            keys: BTreeMap::new(),
            denied_hives: BTreeSet::new(),
            write_fault: None,
            deny_deletes: false,
            unavailable: false,
        }
    }

    fn check_available(&self) -> Result<(), PlatformError> {
        if self.unavailable {
            return Err(PlatformError::new(
                PlatformErrorKind::StoreUnavailable,
                "mock registry is offline",
            ));
        }
        Ok(())
    }

    fn check_writable(&self, hive: RegistryHive, path: &str) -> Result<(), PlatformError> {
        self.check_available()?;
        if self.denied_hives.contains(&hive) {
            return Err(PlatformError::access_denied(format!("{hive}\\{path} is read-only")));
        }
        Ok(())
    }
}

/// Case-insensitive registry store holding string values only.
pub struct MockRegistry {
    state: Mutex<RegistryState>,
}

fn normalize(path: &str) -> String {
    key_ancestry(path).pop().unwrap_or_default().to_lowercase()
}

fn is_within(candidate: &str, root: &str) -> bool {
    candidate == root || candidate.strip_prefix(root).is_some_and(|rest| rest.starts_with('\\'))
}

impl MockRegistry {
    pub const fn new() -> Self {
        Self { state: Mutex::new(RegistryState::new()) }
    }

    pub fn reset(&self) {
        *lock(&self.state) = RegistryState::new();
    }

    /// Writes and deletes under `hive` fail with `AccessDenied`.
    pub fn deny_hive(&self, hive: RegistryHive) {
        lock(&self.state).denied_hives.insert(hive);
    }

    /// Lets `successful_writes` writes through, then fails the next one with `kind`.
    pub fn fail_write_after(&self, successful_writes: usize, kind: PlatformErrorKind) {
        lock(&self.state).write_fault =
            Some(WriteFault { remaining: successful_writes, kind, keys_created: false });
    }

    /// Like [`MockRegistry::fail_write_after`], but the failing write still
    /// creates its missing keys before the value is rejected.
    pub fn fail_value_after(&self, successful_writes: usize, kind: PlatformErrorKind) {
        lock(&self.state).write_fault =
            Some(WriteFault { remaining: successful_writes, kind, keys_created: true });
    }

    pub fn deny_deletes(&self, deny: bool) {
        lock(&self.state).deny_deletes = deny;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    pub fn value(&self, hive: RegistryHive, path: &str, name: &str) -> Option<String> {
        let state = lock(&self.state);
        state
            .keys
            .get(&(hive, normalize(path)))
            .and_then(|values| values.get(&name.to_lowercase()))
            .map(|(_, value)| value.clone())
    }

    pub fn has_key(&self, hive: RegistryHive, path: &str) -> bool {
        lock(&self.state).keys.contains_key(&(hive, normalize(path)))
    }

    /// Flattened `HIVE\key\name = value` listing of every stored value and
    /// empty key, for whole-store comparisons.
    pub fn dump(&self) -> Vec<String> {
        let state = lock(&self.state);
        let mut lines = Vec::new();
        for ((hive, path), values) in &state.keys {
            if values.is_empty() {
                lines.push(format!("{hive}\\{path}"));
            }
            for (name, value) in values.values() {
                lines.push(format!("{hive}\\{path}\\[{name}] = {value}"));
            }
        }
        lines
    }
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryProvider for MockRegistry {
    fn name(&self) -> &'static str {
        crate::MOCK_NAME
    }

    fn key_exists(&self, hive: RegistryHive, path: &str) -> Result<bool, PlatformError> {
        let state = lock(&self.state);
        state.check_available()?;
        Ok(state.keys.contains_key(&(hive, normalize(path))))
    }

    fn read_value(
        &self,
        hive: RegistryHive,
        path: &str,
        name: &str,
    ) -> Result<Option<String>, PlatformError> {
        lock(&self.state).check_available()?;
        Ok(self.value(hive, path, name))
    }

    fn write_value(
        &self,
        hive: RegistryHive,
        path: &str,
        name: &str,
        value: &str,
    ) -> Result<(), PlatformError> {
        let mut state = lock(&self.state);
        state.check_writable(hive, path)?;
        if let Some(fault) = state.write_fault.as_mut() {
            if fault.remaining == 0 {
                let (kind, keys_created) = (fault.kind, fault.keys_created);
                state.write_fault = None;
                if keys_created {
                    for key in key_ancestry(path) {
                        state.keys.entry((hive, key.to_lowercase())).or_default();
                    }
                }
                let message = format!("injected failure writing {hive}\\{path}");
                return Err(PlatformError::new(kind, message));
            }
            fault.remaining -= 1;
        }

        for key in key_ancestry(path) {
            state.keys.entry((hive, key.to_lowercase())).or_default();
        }
        trace!(%hive, key = path, value = name, "mock registry write");
        state
            .keys
            .entry((hive, normalize(path)))
            .or_default()
            .insert(name.to_lowercase(), (name.to_owned(), value.to_owned()));
        Ok(())
    }

    fn delete_value(
        &self,
        hive: RegistryHive,
        path: &str,
        name: &str,
    ) -> Result<bool, PlatformError> {
        let mut state = lock(&self.state);
        state.check_writable(hive, path)?;
        if state.deny_deletes {
            return Err(PlatformError::access_denied(format!("cannot delete {hive}\\{path}")));
        }
        Ok(state
            .keys
            .get_mut(&(hive, normalize(path)))
            .is_some_and(|values| values.remove(&name.to_lowercase()).is_some()))
    }

    fn delete_tree(&self, hive: RegistryHive, path: &str) -> Result<bool, PlatformError> {
        let mut state = lock(&self.state);
        state.check_writable(hive, path)?;
        if state.deny_deletes {
            return Err(PlatformError::access_denied(format!("cannot delete {hive}\\{path}")));
        }
        let root = normalize(path);
        let before = state.keys.len();
        state.keys.retain(|(key_hive, key), _| *key_hive != hive || !is_within(key, &root));
        Ok(state.keys.len() != before)
    }
}
