use std::io;

use tracing::trace;
use winbridge_core::platform::{PlatformError, RegistryProvider};
use winbridge_core::register_registry_provider;
use winbridge_core::types::RegistryHive;
use winreg::RegKey;
use winreg::enums::{
    HKEY_CLASSES_ROOT, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_SET_VALUE,
};

use crate::error::registry_error;

static WINDOWS_REGISTRY: WindowsRegistry = WindowsRegistry;

register_registry_provider!(&WINDOWS_REGISTRY);

struct WindowsRegistry;

fn root(hive: RegistryHive) -> RegKey {
    RegKey::predef(match hive {
        RegistryHive::ClassesRoot => HKEY_CLASSES_ROOT,
        RegistryHive::CurrentUser => HKEY_CURRENT_USER,
        RegistryHive::LocalMachine => HKEY_LOCAL_MACHINE,
    })
}

/// Opens `path`, mapping a missing key to `None`.
fn open(hive: RegistryHive, path: &str, access: u32) -> Result<Option<RegKey>, PlatformError> {
    match root(hive).open_subkey_with_flags(path, access) {
        Ok(key) => Ok(Some(key)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(registry_error(format_args!("open {hive}\\{path}"), &err)),
    }
}

impl RegistryProvider for WindowsRegistry {
    fn name(&self) -> &'static str {
        "Windows Registry"
    }

    fn key_exists(&self, hive: RegistryHive, path: &str) -> Result<bool, PlatformError> {
        Ok(open(hive, path, KEY_READ)?.is_some())
    }

    fn read_value(
        &self,
        hive: RegistryHive,
        path: &str,
        name: &str,
    ) -> Result<Option<String>, PlatformError> {
        let Some(key) = open(hive, path, KEY_READ)? else {
            return Ok(None);
        };
        match key.get_value::<String, _>(name) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(registry_error(format_args!("read {hive}\\{path}\\[{name}]"), &err)),
        }
    }

    fn write_value(
        &self,
        hive: RegistryHive,
        path: &str,
        name: &str,
        value: &str,
    ) -> Result<(), PlatformError> {
        let (key, disposition) = root(hive)
            .create_subkey(path)
            .map_err(|err| registry_error(format_args!("create {hive}\\{path}"), &err))?;
        trace!(%hive, key = path, ?disposition, "registry key opened for write");
        key.set_value(name, &value)
            .map_err(|err| registry_error(format_args!("write {hive}\\{path}\\[{name}]"), &err))
    }

    fn delete_value(
        &self,
        hive: RegistryHive,
        path: &str,
        name: &str,
    ) -> Result<bool, PlatformError> {
        let Some(key) = open(hive, path, KEY_SET_VALUE)? else {
            return Ok(false);
        };
        match key.delete_value(name) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(registry_error(format_args!("delete {hive}\\{path}\\[{name}]"), &err)),
        }
    }

    fn delete_tree(&self, hive: RegistryHive, path: &str) -> Result<bool, PlatformError> {
        match root(hive).delete_subkey_all(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(registry_error(format_args!("delete {hive}\\{path}"), &err)),
        }
    }
}
