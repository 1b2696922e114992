use std::path::Path;
use std::ptr;

use tracing::debug;
use windows::Win32::Security::Authorization::{
    ACCESS_MODE, BuildExplicitAccessWithNameW, EXPLICIT_ACCESS_W, GRANT_ACCESS,
    GetNamedSecurityInfoW, REVOKE_ACCESS, SE_FILE_OBJECT, SetEntriesInAclW, SetNamedSecurityInfoW,
};
use windows::Win32::Security::{
    ACE_FLAGS, ACL, DACL_SECURITY_INFORMATION, NO_INHERITANCE, PSECURITY_DESCRIPTOR,
    SUB_CONTAINERS_AND_OBJECTS_INHERIT, UNPROTECTED_DACL_SECURITY_INFORMATION,
};
use windows::core::{HSTRING, PCWSTR};
use winbridge_core::platform::{AclProvider, PlatformError};
use winbridge_core::register_acl_provider;
use winbridge_core::types::AclEntry;

use crate::error::check_status;
use crate::handle::LocalBuffer;

static WINDOWS_ACL: WindowsAcl = WindowsAcl;

register_acl_provider!(&WINDOWS_ACL);

struct WindowsAcl;

/// Trustee names must outlive the `EXPLICIT_ACCESS_W` records pointing at them.
struct ExplicitEntries {
    _names: Vec<HSTRING>,
    records: Vec<EXPLICIT_ACCESS_W>,
}

impl ExplicitEntries {
    fn build<'a>(
        entries: impl Iterator<Item = (&'a str, u32)>,
        mode: ACCESS_MODE,
        inheritance: ACE_FLAGS,
    ) -> Self {
        let (names, masks): (Vec<HSTRING>, Vec<u32>) =
            entries.map(|(principal, mask)| (HSTRING::from(principal), mask)).unzip();
        // HSTRING buffers live on the heap, so the pointers stay valid while `names` is held.
        let records = names
            .iter()
            .zip(masks)
            .map(|(name, mask)| {
                let mut record = EXPLICIT_ACCESS_W::default();
                unsafe {
                    BuildExplicitAccessWithNameW(
                        &raw mut record,
                        PCWSTR(name.as_ptr()),
                        mask,
                        mode,
                        inheritance,
                    );
                }
                record
            })
            .collect();
        Self { _names: names, records }
    }
}

/// Merges `entries` into the DACL currently stored on `path`.
fn merge_into_dacl(path: &Path, entries: &ExplicitEntries) -> Result<(), PlatformError> {
    let object = HSTRING::from(path.as_os_str());
    let mut dacl: *mut ACL = ptr::null_mut();
    let mut descriptor = PSECURITY_DESCRIPTOR::default();
    check_status(format_args!("GetNamedSecurityInfoW({})", path.display()), unsafe {
        GetNamedSecurityInfoW(
            PCWSTR(object.as_ptr()),
            SE_FILE_OBJECT,
            DACL_SECURITY_INFORMATION,
            None,
            None,
            Some(&raw mut dacl),
            None,
            &raw mut descriptor,
        )
    })?;
    let _descriptor = LocalBuffer::new(descriptor.0);

    let mut updated: *mut ACL = ptr::null_mut();
    check_status("SetEntriesInAclW", unsafe {
        SetEntriesInAclW(Some(&entries.records), Some(dacl), &raw mut updated)
    })?;
    let _updated = LocalBuffer::new(updated.cast());

    write_dacl(path, &object, updated, DACL_SECURITY_INFORMATION)
}

fn write_dacl(
    path: &Path,
    object: &HSTRING,
    dacl: *const ACL,
    information: windows::Win32::Security::OBJECT_SECURITY_INFORMATION,
) -> Result<(), PlatformError> {
    check_status(format_args!("SetNamedSecurityInfoW({})", path.display()), unsafe {
        SetNamedSecurityInfoW(
            PCWSTR(object.as_ptr()),
            SE_FILE_OBJECT,
            information,
            None,
            None,
            Some(dacl),
            None,
        )
    })
}

impl AclProvider for WindowsAcl {
    fn name(&self) -> &'static str {
        "Windows ACL"
    }

    fn apply(&self, path: &Path, entries: &[AclEntry]) -> Result<(), PlatformError> {
        let explicit = ExplicitEntries::build(
            entries.iter().map(|entry| (entry.principal.as_str(), entry.rights.access_mask())),
            GRANT_ACCESS,
            SUB_CONTAINERS_AND_OBJECTS_INHERIT,
        );
        merge_into_dacl(path, &explicit)?;
        debug!(path = %path.display(), entries = entries.len(), "DACL updated");
        Ok(())
    }

    fn revoke(&self, path: &Path, principal: &str) -> Result<(), PlatformError> {
        let explicit =
            ExplicitEntries::build(std::iter::once((principal, 0)), REVOKE_ACCESS, NO_INHERITANCE);
        merge_into_dacl(path, &explicit)
    }

    fn reset(&self, path: &Path) -> Result<(), PlatformError> {
        let object = HSTRING::from(path.as_os_str());
        let mut empty: *mut ACL = ptr::null_mut();
        check_status("SetEntriesInAclW", unsafe { SetEntriesInAclW(None, None, &raw mut empty) })?;
        let _empty = LocalBuffer::new(empty.cast());
        // An empty unprotected DACL leaves only the ACEs inherited from the parent.
        let information = DACL_SECURITY_INFORMATION | UNPROTECTED_DACL_SECURITY_INFORMATION;
        write_dacl(path, &object, empty, information)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use winbridge_core::platform::PlatformErrorKind;
    use winbridge_core::types::AccessRights;

    #[rstest]
    fn grant_revoke_and_reset_on_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("acl.txt");
        std::fs::write(&file, b"x").unwrap();

        WINDOWS_ACL.apply(&file, &[AclEntry::new("Users", AccessRights::Read)]).unwrap();
        WINDOWS_ACL.revoke(&file, "Users").unwrap();
        WINDOWS_ACL.reset(&file).unwrap();
    }

    #[rstest]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = WINDOWS_ACL.reset(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), PlatformErrorKind::NotFound);
    }
}
