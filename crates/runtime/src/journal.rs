//! Best-effort undo log for multi-value registry changes.

use tracing::{debug, warn};
use winbridge_core::platform::{PlatformError, RegistryProvider, key_ancestry};
use winbridge_core::types::RegistryHive;

use crate::BridgeError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Undo {
    /// The write created this key (and everything below it).
    DeleteKey { hive: RegistryHive, key: String },
    RestoreValue { hive: RegistryHive, key: String, name: String, previous: String },
    DeleteValue { hive: RegistryHive, key: String, name: String },
}

/// Records how to revert every write made through it.
///
/// The registry has no multi-key transactions: reverting replays the undo
/// steps in reverse order and reports the steps that could not be undone.
/// Changes by other writers between the write and the rollback are not
/// detected; the last writer wins.
pub struct RegistryTransaction<'a> {
    provider: &'a dyn RegistryProvider,
    undo: Vec<Undo>,
}

impl<'a> RegistryTransaction<'a> {
    pub fn new(provider: &'a dyn RegistryProvider) -> Self {
        Self { provider, undo: Vec::new() }
    }

    /// Number of writes attempted so far.
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Writes a string value, creating missing keys, and records its undo step.
    /// The step is recorded before writing: a write that fails after creating
    /// keys is still reverted, and reverting a write that never happened is
    /// harmless.
    pub fn write(
        &mut self,
        hive: RegistryHive,
        key: &str,
        name: &str,
        value: &str,
    ) -> Result<(), PlatformError> {
        let mut created = None;
        for ancestor in key_ancestry(key) {
            if !self.provider.key_exists(hive, &ancestor)? {
                created = Some(ancestor);
                break;
            }
        }
        let previous = match created {
            Some(_) => None,
            None => self.provider.read_value(hive, key, name)?,
        };

        self.undo.push(match (created, previous) {
            (Some(created), _) => Undo::DeleteKey { hive, key: created },
            (None, Some(previous)) => {
                Undo::RestoreValue { hive, key: key.to_owned(), name: name.to_owned(), previous }
            }
            (None, None) => Undo::DeleteValue { hive, key: key.to_owned(), name: name.to_owned() },
        });
        self.provider.write_value(hive, key, name, value)
    }

    /// Keeps every write.
    pub fn commit(self) {
        debug!(writes = self.undo.len(), "registry transaction committed");
    }

    /// Reverts every recorded write, newest first. Returns a description of
    /// each step that could not be reverted.
    pub fn rollback(self) -> Vec<String> {
        let mut failures = Vec::new();
        for step in self.undo.into_iter().rev() {
            let (target, result) = match &step {
                Undo::DeleteKey { hive, key } => (
                    format!("delete key {hive}\\{key}"),
                    self.provider.delete_tree(*hive, key).map(drop),
                ),
                Undo::RestoreValue { hive, key, name, previous } => (
                    format!("restore {hive}\\{key}\\[{name}]"),
                    self.provider.write_value(*hive, key, name, previous),
                ),
                Undo::DeleteValue { hive, key, name } => (
                    format!("delete {hive}\\{key}\\[{name}]"),
                    self.provider.delete_value(*hive, key, name).map(drop),
                ),
            };
            if let Err(err) = result {
                warn!(step = %target, error = %err, "registry rollback step failed");
                failures.push(format!("{target}: {err}"));
            }
        }
        failures
    }

    /// Rolls back and converts `err` into the error reported to the caller.
    /// Rollback failures are attached to the original error, never replace it.
    pub fn abort(self, err: PlatformError) -> BridgeError {
        warn!(error = %err, writes = self.undo.len(), "registry change failed; rolling back");
        let rollback_failures = self.rollback();
        let source = BridgeError::from(err);
        if rollback_failures.is_empty() {
            source
        } else {
            BridgeError::Incomplete { source: Box::new(source), rollback_failures }
        }
    }
}
