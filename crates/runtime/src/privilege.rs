//! Elevation state, UAC relaunch and file access control.
//!
//! Elevation is queried from the OS on every call. Nothing here elevates on
//! its own: callers that get `AccessDenied` decide whether to call
//! [`PrivilegeManager::request_elevation`].

use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use winbridge_core::platform::{AclProvider, ElevationOutcome, ElevationProvider};
use winbridge_core::types::{AclSpecification, EffectivePermissions, ElevationState};

use crate::BridgeError;
use crate::config::BridgeConfig;
use crate::registry::validate_executable;

static PROBE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
pub struct PrivilegeManager {
    elevation: &'static dyn ElevationProvider,
    acl: &'static dyn AclProvider,
    config: Arc<BridgeConfig>,
}

impl std::fmt::Debug for PrivilegeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegeManager")
            .field("elevation", &self.elevation.name())
            .field("acl", &self.acl.name())
            .finish_non_exhaustive()
    }
}

/// Lowercased path components with `/` and `\` treated alike, so
/// `C:/Windows` and `c:\windows\` compare equal.
fn comparable_components(path: &Path) -> Vec<String> {
    path.to_string_lossy()
        .split(['\\', '/'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(str::to_lowercase)
        .collect()
}

fn is_within(path: &[String], directory: &[String]) -> bool {
    !directory.is_empty() && path.starts_with(directory)
}

fn ensure_exists(path: &Path) -> Result<fs::Metadata, BridgeError> {
    fs::metadata(path).map_err(|err| BridgeError::io(format_args!("{}", path.display()), &err))
}

/// The directory a write probe for `path` is made in: `path` itself when it
/// is a directory, else its closest existing ancestor.
fn probe_directory(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        return Some(path.to_path_buf());
    }
    path.ancestors()
        .skip(1)
        .find(|ancestor| !ancestor.as_os_str().is_empty() && ancestor.is_dir())
        .map(Path::to_path_buf)
}

impl PrivilegeManager {
    pub fn new(
        elevation: &'static dyn ElevationProvider,
        acl: &'static dyn AclProvider,
        config: Arc<BridgeConfig>,
    ) -> Self {
        Self { elevation, acl, config }
    }

    pub fn is_running_as_admin(&self) -> Result<bool, BridgeError> {
        Ok(self.elevation.is_elevated()?)
    }

    pub fn elevation_state(&self) -> Result<ElevationState, BridgeError> {
        Ok(ElevationState::now(self.is_running_as_admin()?))
    }

    /// Starts `executable` elevated and returns without waiting for it.
    /// `false` when the user declines or the platform cannot elevate.
    pub fn request_elevation(
        &self,
        executable: &Path,
        args: &[String],
    ) -> Result<bool, BridgeError> {
        validate_executable(executable)?;
        match self.elevation.launch_elevated(executable, args)? {
            ElevationOutcome::Started => {
                info!(executable = %executable.display(), "elevated instance started");
                Ok(true)
            }
            ElevationOutcome::Declined => {
                info!(executable = %executable.display(), "elevation declined by user");
                Ok(false)
            }
            ElevationOutcome::Unavailable => {
                debug!(
                    executable = %executable.display(),
                    "elevation unavailable on this platform"
                );
                Ok(false)
            }
        }
    }

    /// Protected system directories followed by the configured extras.
    pub fn protected_directories(&self) -> Vec<PathBuf> {
        let mut directories = self.elevation.protected_directories();
        directories.extend(self.config.extra_protected_directories.iter().cloned());
        directories
    }

    fn is_protected(&self, path: &Path) -> bool {
        let components = comparable_components(path);
        self.protected_directories()
            .iter()
            .any(|directory| is_within(&components, &comparable_components(directory)))
    }

    /// Whether writing below `path` needs elevation: known system directories
    /// answer `true` directly, anything else is probed by creating and
    /// removing a marker file. Inconclusive probes answer `false`.
    pub fn requires_admin_access(&self, path: &Path) -> Result<bool, BridgeError> {
        if self.is_protected(path) {
            debug!(path = %path.display(), "path is inside a protected directory");
            return Ok(true);
        }
        let Some(directory) = probe_directory(path) else {
            warn!(path = %path.display(), "no existing directory to probe");
            return Ok(false);
        };
        Ok(self.probe_requires_admin(&directory))
    }

    fn probe_requires_admin(&self, directory: &Path) -> bool {
        let nanos =
            SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_nanos());
        let sequence = PROBE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let marker = directory.join(format!(
            "{}-{}-{nanos}-{sequence}.tmp",
            self.config.probe_marker_prefix,
            std::process::id()
        ));

        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(file) => {
                drop(file);
                if let Err(err) = fs::remove_file(&marker) {
                    warn!(
                        marker = %marker.display(),
                        error = %err,
                        "failed to remove probe marker"
                    );
                }
                debug!(path = %directory.display(), "directory is writable");
                false
            }
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                debug!(path = %directory.display(), "directory requires elevation");
                true
            }
            Err(err) => {
                warn!(path = %directory.display(), error = %err, "write probe inconclusive");
                false
            }
        }
    }

    /// Grants the normalized entries of `spec` on `path` in one change.
    /// Entries set by earlier calls stay unless reset.
    pub fn set_file_acl(&self, path: &Path, spec: &AclSpecification) -> Result<(), BridgeError> {
        ensure_exists(path)?;
        let entries = spec.normalized();
        if let Some(entry) = entries.iter().find(|entry| entry.principal.trim().is_empty()) {
            return Err(BridgeError::invalid_argument(format!(
                "ACL entry '{entry}' has an empty principal"
            )));
        }
        if entries.is_empty() {
            debug!(path = %path.display(), "empty ACL specification; nothing to apply");
            return Ok(());
        }
        self.acl.apply(path, &entries)?;
        info!(path = %path.display(), entries = entries.len(), "file ACL updated");
        Ok(())
    }

    pub fn remove_file_acl(&self, path: &Path, principal: &str) -> Result<(), BridgeError> {
        ensure_exists(path)?;
        if principal.trim().is_empty() {
            return Err(BridgeError::invalid_argument("principal must not be empty"));
        }
        self.acl.revoke(path, principal.trim())?;
        info!(path = %path.display(), principal, "file ACL entries removed");
        Ok(())
    }

    pub fn reset_file_acl(&self, path: &Path) -> Result<(), BridgeError> {
        ensure_exists(path)?;
        self.acl.reset(path)?;
        info!(path = %path.display(), "file ACL reset to inherited permissions");
        Ok(())
    }

    /// Best-effort view of what the current user may do with `path`.
    pub fn get_effective_permissions(
        &self,
        path: &Path,
    ) -> Result<EffectivePermissions, BridgeError> {
        let metadata = ensure_exists(path)?;
        let read_only = metadata.permissions().readonly();
        let can_read = if metadata.is_dir() {
            fs::read_dir(path).is_ok()
        } else {
            fs::File::open(path).is_ok()
        };
        let can_write = !read_only && !self.requires_admin_access(path).unwrap_or(true);
        let can_execute =
            if metadata.is_dir() { can_read } else { self.is_executable(path, &metadata) };
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        // Deleting is governed by the containing directory.
        let can_delete = !read_only && !self.requires_admin_access(&parent).unwrap_or(true);

        let permissions = EffectivePermissions { can_read, can_write, can_execute, can_delete };
        debug!(path = %path.display(), ?permissions, "effective permissions computed");
        Ok(permissions)
    }

    fn is_executable(&self, path: &Path, metadata: &fs::Metadata) -> bool {
        let by_extension = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|extension| self.config.is_executable_extension(extension));
        by_extension || has_execute_bit(metadata)
    }
}

#[cfg(unix)]
fn has_execute_bit(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_execute_bit(_metadata: &fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::test_support::{fake_executable, mock_platform};
    use rstest::rstest;
    use tempfile::TempDir;
    use winbridge_core::types::{AccessRights, AclEntry};
    use winbridge_platform_mock::{ElevationRequest, MockPlatform};

    fn manager_with(platform: &'static MockPlatform, config: BridgeConfig) -> PrivilegeManager {
        PrivilegeManager::new(&platform.elevation, &platform.acl, Arc::new(config))
    }

    fn manager(platform: &'static MockPlatform) -> PrivilegeManager {
        manager_with(platform, BridgeConfig::default())
    }

    #[rstest]
    fn admin_state_follows_the_token(mock_platform: &'static MockPlatform) {
        let manager = manager(mock_platform);
        assert!(!manager.is_running_as_admin().unwrap());
        assert!(!manager.is_running_as_admin().unwrap());

        mock_platform.elevation.set_elevated(true);
        assert!(manager.elevation_state().unwrap().is_elevated);
    }

    #[rstest]
    #[case(ElevationOutcome::Started, true)]
    #[case(ElevationOutcome::Declined, false)]
    #[case(ElevationOutcome::Unavailable, false)]
    fn elevation_outcome_maps_to_bool(
        mock_platform: &'static MockPlatform,
        fake_executable: (TempDir, PathBuf),
        #[case] outcome: ElevationOutcome,
        #[case] expected: bool,
    ) {
        let (_dir, exe) = fake_executable;
        mock_platform.elevation.answer_prompt(outcome);

        let started =
            manager(mock_platform).request_elevation(&exe, &["--install".to_owned()]).unwrap();

        assert_eq!(started, expected);
        assert_eq!(
            mock_platform.elevation.take_requests(),
            vec![ElevationRequest { executable: exe, args: vec!["--install".into()] }]
        );
    }

    #[rstest]
    fn elevation_of_relative_path_is_rejected_before_prompting(
        mock_platform: &'static MockPlatform,
    ) {
        let err = manager(mock_platform).request_elevation(Path::new("app.exe"), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(mock_platform.elevation.take_requests().is_empty());
    }

    #[rstest]
    #[case(r"Z:\Locked", r"z:/locked/sub/file.txt", true)]
    #[case(r"Z:\Locked", r"Z:\LOCKED", true)]
    #[case(r"Z:\Locked", r"Z:\LockedOut\file.txt", false)]
    #[case(r"Z:\Locked\", r"Z:\Other", false)]
    fn protected_prefix_match_is_component_aware(
        mock_platform: &'static MockPlatform,
        #[case] protected: &str,
        #[case] path: &str,
        #[case] expected: bool,
    ) {
        mock_platform.elevation.set_protected_directories(vec![PathBuf::from(protected)]);
        assert_eq!(
            manager(mock_platform).requires_admin_access(Path::new(path)).unwrap(),
            expected
        );
    }

    #[rstest]
    fn writable_temp_directory_needs_no_admin_and_leaves_no_marker(
        mock_platform: &'static MockPlatform,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(mock_platform);

        assert!(!manager.requires_admin_access(dir.path()).unwrap());
        assert!(!manager.requires_admin_access(&dir.path().join("not-yet-created.txt")).unwrap());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[rstest]
    fn configured_directories_are_protected(mock_platform: &'static MockPlatform) {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig {
            extra_protected_directories: vec![dir.path().to_path_buf()],
            ..BridgeConfig::default()
        };

        assert!(
            manager_with(mock_platform, config)
                .requires_admin_access(&dir.path().join("data"))
                .unwrap()
        );
    }

    #[rstest]
    fn acl_changes_are_normalized_and_cumulative(mock_platform: &'static MockPlatform) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();
        let manager = manager(mock_platform);

        let spec = AclSpecification::new()
            .grant("Users", AccessRights::Read)
            .grant("Admins", AccessRights::FullControl)
            .grant("USERS", AccessRights::Modify);
        manager.set_file_acl(path, &spec).unwrap();
        manager
            .set_file_acl(path, &AclSpecification::new().grant("Guests", AccessRights::Read))
            .unwrap();

        assert_eq!(mock_platform.acl.entries(path), vec![
            AclEntry::new("Admins", AccessRights::FullControl),
            AclEntry::new("USERS", AccessRights::Modify),
            AclEntry::new("Guests", AccessRights::Read),
        ]);

        manager.remove_file_acl(path, "users").unwrap();
        manager.remove_file_acl(path, "Nobody").unwrap();
        assert_eq!(mock_platform.acl.entries(path).len(), 2);

        manager.reset_file_acl(path).unwrap();
        assert!(mock_platform.acl.entries(path).is_empty());
    }

    #[rstest]
    fn acl_on_missing_path_is_not_found(mock_platform: &'static MockPlatform) {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let manager = manager(mock_platform);

        let spec = AclSpecification::new().grant("Users", AccessRights::Read);
        assert_eq!(manager.set_file_acl(&missing, &spec).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            manager.remove_file_acl(&missing, "Users").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(manager.reset_file_acl(&missing).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[rstest]
    fn acl_refusal_is_access_denied(mock_platform: &'static MockPlatform) {
        let dir = tempfile::tempdir().unwrap();
        mock_platform.acl.deny_changes(true);

        let spec = AclSpecification::new().grant("Users", AccessRights::Write);
        let err = manager(mock_platform).set_file_acl(dir.path(), &spec).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[rstest]
    fn empty_acl_specification_is_a_no_op(mock_platform: &'static MockPlatform) {
        let dir = tempfile::tempdir().unwrap();
        mock_platform.acl.deny_changes(true);
        manager(mock_platform).set_file_acl(dir.path(), &AclSpecification::new()).unwrap();
    }

    #[rstest]
    fn read_only_file_is_readable_but_not_writable(mock_platform: &'static MockPlatform) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, b"data").unwrap();
        let mut permissions = fs::metadata(&file).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&file, permissions.clone()).unwrap();

        let effective = manager(mock_platform).get_effective_permissions(&file).unwrap();

        assert!(effective.can_read);
        assert!(!effective.can_write);
        assert!(!effective.can_execute);
        assert!(!effective.can_delete);

        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(&file, permissions).unwrap();
    }

    #[rstest]
    fn writable_executable_has_full_permissions(
        mock_platform: &'static MockPlatform,
        fake_executable: (TempDir, PathBuf),
    ) {
        let (_dir, exe) = fake_executable;

        let effective = manager(mock_platform).get_effective_permissions(&exe).unwrap();

        assert_eq!(
            effective,
            EffectivePermissions {
                can_read: true,
                can_write: true,
                can_execute: true,
                can_delete: true,
            }
        );
    }

    #[rstest]
    fn permissions_of_missing_path_are_not_found(mock_platform: &'static MockPlatform) {
        let dir = tempfile::tempdir().unwrap();
        let err =
            manager(mock_platform).get_effective_permissions(&dir.path().join("gone")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
