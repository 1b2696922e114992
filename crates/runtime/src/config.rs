use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use winbridge_core::types::RegistryHive;

/// Where file associations and URL protocols are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassesScope {
    /// `HKEY_CLASSES_ROOT`; writes usually need elevation.
    #[default]
    Machine,
    /// `HKEY_CURRENT_USER\Software\Classes`.
    User,
}

impl ClassesScope {
    /// Hive and key prefix class registrations live under.
    pub fn location(self) -> (RegistryHive, &'static str) {
        match self {
            Self::Machine => (RegistryHive::ClassesRoot, ""),
            Self::User => (RegistryHive::CurrentUser, r"Software\Classes"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub classes_scope: ClassesScope,
    /// Directories treated as admin-only in addition to the platform's own list.
    pub extra_protected_directories: Vec<PathBuf>,
    /// Extensions (without dot) reported as executable.
    pub executable_extensions: Vec<String>,
    /// File name prefix of the write-probe marker.
    pub probe_marker_prefix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            classes_scope: ClassesScope::default(),
            extra_protected_directories: Vec::new(),
            executable_extensions: ["exe", "bat", "cmd", "com", "scr", "msi"]
                .map(String::from)
                .to_vec(),
            probe_marker_prefix: ".winbridge-probe".to_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid config {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

impl BridgeConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn is_executable_extension(&self, extension: &str) -> bool {
        self.executable_extensions
            .iter()
            .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    fn partial_config_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = r#"{ "classes_scope": "user", "extra_protected_directories": ["/srv/locked"] }"#;
        file.write_all(json.as_bytes()).unwrap();

        let config = BridgeConfig::from_path(file.path()).unwrap();

        assert_eq!(config.classes_scope, ClassesScope::User);
        assert_eq!(config.extra_protected_directories, vec![PathBuf::from("/srv/locked")]);
        assert_eq!(config.probe_marker_prefix, ".winbridge-probe");
        assert!(config.is_executable_extension("EXE"));
        assert!(!config.is_executable_extension("txt"));
    }

    #[rstest]
    fn malformed_config_is_reported_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ classes_scope: }}").unwrap();

        let err = BridgeConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[rstest]
    #[case(ClassesScope::Machine, RegistryHive::ClassesRoot, "")]
    #[case(ClassesScope::User, RegistryHive::CurrentUser, r"Software\Classes")]
    fn scope_selects_classes_location(
        #[case] scope: ClassesScope,
        #[case] hive: RegistryHive,
        #[case] prefix: &str,
    ) {
        assert_eq!(scope.location(), (hive, prefix));
    }
}
