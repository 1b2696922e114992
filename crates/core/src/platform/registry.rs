//! Registry store abstraction.
//!
//! Keys are addressed as a [`RegistryHive`] plus a backslash separated path
//! relative to it. Key and value names are case-insensitive, as in the native
//! store. Only string values are modelled; the default value of a key is the
//! value with the empty name.

use crate::platform::PlatformError;
use crate::types::RegistryHive;

pub trait RegistryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn key_exists(&self, hive: RegistryHive, path: &str) -> Result<bool, PlatformError>;

    /// Reads a string value. Missing keys and missing values both yield `None`.
    fn read_value(
        &self,
        hive: RegistryHive,
        path: &str,
        name: &str,
    ) -> Result<Option<String>, PlatformError>;

    /// Writes a string value, creating the key and any missing ancestors.
    fn write_value(
        &self,
        hive: RegistryHive,
        path: &str,
        name: &str,
        value: &str,
    ) -> Result<(), PlatformError>;

    /// Deletes a single value. Returns whether it existed.
    fn delete_value(
        &self,
        hive: RegistryHive,
        path: &str,
        name: &str,
    ) -> Result<bool, PlatformError>;

    /// Recursively deletes a key and everything below it. Returns whether the
    /// key existed.
    fn delete_tree(&self, hive: RegistryHive, path: &str) -> Result<bool, PlatformError>;
}

pub struct RegistryProviderRegistration {
    pub provider: &'static dyn RegistryProvider,
}

inventory::collect!(RegistryProviderRegistration);

pub fn registry_providers() -> impl Iterator<Item = &'static dyn RegistryProvider> {
    inventory::iter::<RegistryProviderRegistration>.into_iter().map(|entry| entry.provider)
}

#[macro_export]
macro_rules! register_registry_provider {
    ($provider:expr) => {
        inventory::submit! {
            $crate::platform::RegistryProviderRegistration { provider: $provider }
        }
    };
}

/// Joins registry path segments with backslashes, skipping empty segments.
pub fn join_key(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_owned(),
        (_, true) => parent.to_owned(),
        _ => format!("{}\\{}", parent.trim_end_matches('\\'), child.trim_start_matches('\\')),
    }
}

/// Returns the chain of keys from the first segment down to `path` itself:
/// `A\B\C` yields `A`, `A\B`, `A\B\C`.
pub fn key_ancestry(path: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = String::new();
    for segment in path.split('\\').filter(|segment| !segment.is_empty()) {
        current = join_key(&current, segment);
        chain.push(current.clone());
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "Foo", "Foo")]
    #[case("Foo", "", "Foo")]
    #[case("Foo\\", "\\shell", "Foo\\shell")]
    #[case("Software\\Classes", ".txt", "Software\\Classes\\.txt")]
    fn join_key_normalises_separators(
        #[case] parent: &str,
        #[case] child: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(join_key(parent, child), expected);
    }

    #[rstest]
    fn ancestry_lists_every_level() {
        assert_eq!(
            key_ancestry("App.Doc\\shell\\open\\command"),
            vec![
                "App.Doc",
                "App.Doc\\shell",
                "App.Doc\\shell\\open",
                "App.Doc\\shell\\open\\command"
            ]
        );
    }

    #[rstest]
    fn ancestry_ignores_empty_segments() {
        assert_eq!(key_ancestry("\\a\\\\b\\"), vec!["a", "a\\b"]);
    }
}
