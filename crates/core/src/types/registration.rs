use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Predefined registry root a key path is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RegistryHive {
    ClassesRoot,
    CurrentUser,
    LocalMachine,
}

impl RegistryHive {
    pub fn short_name(self) -> &'static str {
        match self {
            Self::ClassesRoot => "HKCR",
            Self::CurrentUser => "HKCU",
            Self::LocalMachine => "HKLM",
        }
    }
}

impl fmt::Display for RegistryHive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegistrationKind {
    FileAssociation,
    UrlProtocol,
    AutoStart,
}

/// One persistent OS registration as read back from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationEntry {
    pub kind: RegistrationKind,
    pub hive: RegistryHive,
    /// Key that owns the registration, relative to `hive`.
    pub key_path: String,
    pub program_id: Option<String>,
    pub executable_path: PathBuf,
    pub description: Option<String>,
    pub enabled: bool,
}

impl RegistrationEntry {
    /// Fully qualified key, e.g. `HKCR\App.Document`.
    pub fn qualified_key(&self) -> String {
        format!("{}\\{}", self.hive, self.key_path)
    }
}
