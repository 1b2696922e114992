//! File associations, URL protocol handlers and per-user auto-start entries.
//!
//! Registrations consist of several values. They are written through a
//! [`RegistryTransaction`] so a failure part way through is rolled back.
//! Concurrent registrations of the same name are not coordinated: the last
//! writer wins value by value.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use winbridge_core::command_line::{
    default_icon, open_command, parse_command_executable, quoted_executable,
};
use winbridge_core::platform::{RegistryProvider, join_key};
use winbridge_core::types::{RegistrationEntry, RegistrationKind, RegistryHive};

use crate::config::ClassesScope;
use crate::journal::RegistryTransaction;
use crate::BridgeError;

/// Per-user startup programs, relative to `HKEY_CURRENT_USER`.
pub const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";

const DEFAULT_VALUE: &str = "";
const URL_PROTOCOL_VALUE: &str = "URL Protocol";
const CONTENT_TYPE_VALUE: &str = "Content Type";
const OPEN_COMMAND_KEY: &str = r"shell\open\command";
const DEFAULT_ICON_KEY: &str = "DefaultIcon";

struct ValueWrite {
    key: String,
    name: &'static str,
    value: String,
}

impl ValueWrite {
    fn new(key: impl Into<String>, name: &'static str, value: impl Into<String>) -> Self {
        Self { key: key.into(), name, value: value.into() }
    }
}

#[derive(Clone)]
pub struct RegistryManager {
    provider: &'static dyn RegistryProvider,
    scope: ClassesScope,
}

impl std::fmt::Debug for RegistryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryManager")
            .field("provider", &self.provider.name())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Lowercases the extension, adds the leading dot and rejects names that
/// cannot be a single key.
pub fn normalize_extension(extension: &str) -> Result<String, BridgeError> {
    let bare = extension.trim().strip_prefix('.').unwrap_or(extension.trim());
    validate_key_name("extension", bare)?;
    Ok(format!(".{}", bare.to_ascii_lowercase()))
}

fn validate_key_name(what: &str, value: &str) -> Result<(), BridgeError> {
    if value.trim().is_empty() {
        return Err(BridgeError::invalid_argument(format!("{what} must not be empty")));
    }
    if value.chars().any(|ch| ch == '\\' || ch == '/' || ch.is_control() || ch.is_whitespace()) {
        return Err(BridgeError::invalid_argument(format!(
            "{what} '{value}' must be a single name without blanks"
        )));
    }
    Ok(())
}

/// `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`
pub fn validate_protocol(protocol: &str) -> Result<(), BridgeError> {
    let mut chars = protocol.chars();
    let valid = chars.next().is_some_and(|first| first.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(BridgeError::invalid_argument(format!("'{protocol}' is not a valid URI scheme")))
    }
}

/// The executable must be absolute and exist before anything is written.
pub(crate) fn validate_executable(path: &Path) -> Result<(), BridgeError> {
    if path.as_os_str().is_empty() || !path.is_absolute() {
        return Err(BridgeError::invalid_argument(format!(
            "executable path '{}' must be absolute",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(BridgeError::invalid_argument(format!(
            "executable '{}' does not exist",
            path.display()
        )));
    }
    Ok(())
}

impl RegistryManager {
    pub fn new(provider: &'static dyn RegistryProvider, scope: ClassesScope) -> Self {
        Self { provider, scope }
    }

    pub fn scope(&self) -> ClassesScope {
        self.scope
    }

    fn classes_key(&self, name: &str) -> (RegistryHive, String) {
        let (hive, prefix) = self.scope.location();
        (hive, join_key(prefix, name))
    }

    fn commit_writes(&self, hive: RegistryHive, writes: &[ValueWrite]) -> Result<(), BridgeError> {
        let mut tx = RegistryTransaction::new(self.provider);
        for write in writes {
            if let Err(err) = tx.write(hive, &write.key, write.name, &write.value) {
                return Err(tx.abort(err));
            }
        }
        tx.commit();
        Ok(())
    }

    pub fn register_file_association(
        &self,
        extension: &str,
        program_id: &str,
        executable: &Path,
        description: &str,
    ) -> Result<(), BridgeError> {
        self.register_file_association_with_content_type(
            extension,
            program_id,
            executable,
            description,
            None,
        )
    }

    /// Writes, in order: extension → program id (and the optional MIME type),
    /// the program id description, its open command and its default icon.
    pub fn register_file_association_with_content_type(
        &self,
        extension: &str,
        program_id: &str,
        executable: &Path,
        description: &str,
        content_type: Option<&str>,
    ) -> Result<(), BridgeError> {
        let extension = normalize_extension(extension)?;
        validate_key_name("program id", program_id)?;
        validate_executable(executable)?;

        let (hive, extension_key) = self.classes_key(&extension);
        let (_, program_key) = self.classes_key(program_id);
        let mut writes = vec![ValueWrite::new(&extension_key, DEFAULT_VALUE, program_id)];
        if let Some(content_type) = content_type {
            writes.push(ValueWrite::new(&extension_key, CONTENT_TYPE_VALUE, content_type));
        }
        writes.extend([
            ValueWrite::new(&program_key, DEFAULT_VALUE, description),
            ValueWrite::new(
                join_key(&program_key, OPEN_COMMAND_KEY),
                DEFAULT_VALUE,
                open_command(executable),
            ),
            ValueWrite::new(
                join_key(&program_key, DEFAULT_ICON_KEY),
                DEFAULT_VALUE,
                default_icon(executable),
            ),
        ]);

        self.commit_writes(hive, &writes)?;
        info!(
            %hive,
            extension = %extension,
            program_id,
            executable = %executable.display(),
            "file association registered"
        );
        Ok(())
    }

    pub fn register_url_protocol(
        &self,
        protocol: &str,
        executable: &Path,
        description: &str,
    ) -> Result<(), BridgeError> {
        validate_protocol(protocol)?;
        validate_executable(executable)?;

        let (hive, protocol_key) = self.classes_key(protocol);
        let writes = [
            ValueWrite::new(&protocol_key, DEFAULT_VALUE, description),
            ValueWrite::new(&protocol_key, URL_PROTOCOL_VALUE, ""),
            ValueWrite::new(
                join_key(&protocol_key, OPEN_COMMAND_KEY),
                DEFAULT_VALUE,
                open_command(executable),
            ),
            ValueWrite::new(
                join_key(&protocol_key, DEFAULT_ICON_KEY),
                DEFAULT_VALUE,
                default_icon(executable),
            ),
        ];

        self.commit_writes(hive, &writes)?;
        info!(%hive, protocol, executable = %executable.display(), "URL protocol registered");
        Ok(())
    }

    /// Adds or removes the `app_name` value under the per-user `Run` key.
    /// `executable` is ignored when disabling.
    pub fn set_auto_start(
        &self,
        app_name: &str,
        executable: &Path,
        enabled: bool,
    ) -> Result<(), BridgeError> {
        if app_name.trim().is_empty() {
            return Err(BridgeError::invalid_argument("application name must not be empty"));
        }
        let hive = RegistryHive::CurrentUser;
        if enabled {
            validate_executable(executable)?;
            self.provider.write_value(hive, RUN_KEY, app_name, &quoted_executable(executable))?;
            info!(app_name, executable = %executable.display(), "auto-start enabled");
        } else if self.provider.delete_value(hive, RUN_KEY, app_name)? {
            info!(app_name, "auto-start disabled");
        } else {
            debug!(app_name, "auto-start entry already absent");
        }
        Ok(())
    }

    /// Removes the program id subtree and the extension key. An extension
    /// that now points at a different program id is left alone.
    pub fn remove_file_association(
        &self,
        extension: &str,
        program_id: &str,
    ) -> Result<(), BridgeError> {
        let extension = normalize_extension(extension)?;
        validate_key_name("program id", program_id)?;
        let (hive, extension_key) = self.classes_key(&extension);
        let (_, program_key) = self.classes_key(program_id);

        match self.provider.read_value(hive, &extension_key, DEFAULT_VALUE)? {
            Some(current) if !current.is_empty() && !current.eq_ignore_ascii_case(program_id) => {
                warn!(
                    %hive,
                    extension = %extension,
                    current = %current,
                    program_id,
                    "extension owned by another program; kept"
                );
            }
            _ => {
                if !self.provider.delete_tree(hive, &extension_key)? {
                    debug!(%hive, key = %extension_key, "extension key already absent");
                }
            }
        }
        if !self.provider.delete_tree(hive, &program_key)? {
            debug!(%hive, key = %program_key, "program id key already absent");
        }
        info!(%hive, extension = %extension, program_id, "file association removed");
        Ok(())
    }

    pub fn remove_url_protocol(&self, protocol: &str) -> Result<(), BridgeError> {
        validate_protocol(protocol)?;
        let (hive, protocol_key) = self.classes_key(protocol);
        if self.provider.delete_tree(hive, &protocol_key)? {
            info!(%hive, protocol, "URL protocol removed");
        } else {
            debug!(%hive, protocol, "URL protocol already absent");
        }
        Ok(())
    }

    fn command_executable(
        &self,
        hive: RegistryHive,
        owner_key: &str,
    ) -> Result<Option<PathBuf>, BridgeError> {
        let command_key = join_key(owner_key, OPEN_COMMAND_KEY);
        let command = self.provider.read_value(hive, &command_key, DEFAULT_VALUE)?;
        Ok(command.as_deref().and_then(parse_command_executable))
    }

    /// Reads back the association of `extension`; `None` unless the extension
    /// maps to a program id with an open command.
    pub fn lookup_file_association(
        &self,
        extension: &str,
    ) -> Result<Option<RegistrationEntry>, BridgeError> {
        let extension = normalize_extension(extension)?;
        let (hive, extension_key) = self.classes_key(&extension);
        let Some(program_id) = self
            .provider
            .read_value(hive, &extension_key, DEFAULT_VALUE)?
            .filter(|id| !id.is_empty())
        else {
            return Ok(None);
        };
        let (_, program_key) = self.classes_key(&program_id);
        let Some(executable_path) = self.command_executable(hive, &program_key)? else {
            return Ok(None);
        };
        let description = self.provider.read_value(hive, &program_key, DEFAULT_VALUE)?;
        Ok(Some(RegistrationEntry {
            kind: RegistrationKind::FileAssociation,
            hive,
            key_path: extension_key,
            program_id: Some(program_id),
            executable_path,
            description,
            enabled: true,
        }))
    }

    /// Reads back a protocol handler; keys without the `URL Protocol` marker are not handlers.
    pub fn lookup_url_protocol(
        &self,
        protocol: &str,
    ) -> Result<Option<RegistrationEntry>, BridgeError> {
        validate_protocol(protocol)?;
        let (hive, protocol_key) = self.classes_key(protocol);
        if self.provider.read_value(hive, &protocol_key, URL_PROTOCOL_VALUE)?.is_none() {
            return Ok(None);
        }
        let Some(executable_path) = self.command_executable(hive, &protocol_key)? else {
            return Ok(None);
        };
        let description = self.provider.read_value(hive, &protocol_key, DEFAULT_VALUE)?;
        Ok(Some(RegistrationEntry {
            kind: RegistrationKind::UrlProtocol,
            hive,
            key_path: protocol_key,
            program_id: Some(protocol.to_owned()),
            executable_path,
            description,
            enabled: true,
        }))
    }

    pub fn lookup_auto_start(
        &self,
        app_name: &str,
    ) -> Result<Option<RegistrationEntry>, BridgeError> {
        let hive = RegistryHive::CurrentUser;
        let Some(command) = self.provider.read_value(hive, RUN_KEY, app_name)? else {
            return Ok(None);
        };
        Ok(Some(RegistrationEntry {
            kind: RegistrationKind::AutoStart,
            hive,
            key_path: RUN_KEY.to_owned(),
            program_id: Some(app_name.to_owned()),
            executable_path: parse_command_executable(&command).unwrap_or_default(),
            description: None,
            enabled: true,
        }))
    }

    pub fn is_auto_start_enabled(&self, app_name: &str) -> Result<bool, BridgeError> {
        Ok(self.provider.read_value(RegistryHive::CurrentUser, RUN_KEY, app_name)?.is_some())
    }
}
