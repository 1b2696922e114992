//! Windows specific platform integration for winbridge.
//!
//! Process enumeration and termination (Toolhelp32), registry access
//! (`winreg`), UAC elevation (`ShellExecuteExW` with the `runas` verb) and
//! file ACL editing (`SetEntriesInAclW`) are registered with the shared
//! provider macros from `winbridge-core`.

#[cfg(target_os = "windows")]
mod acl;
#[cfg(target_os = "windows")]
mod elevation;
#[cfg(target_os = "windows")]
mod error;
#[cfg(target_os = "windows")]
mod handle;
#[cfg(target_os = "windows")]
mod init;
#[cfg(target_os = "windows")]
mod process;
#[cfg(target_os = "windows")]
mod registry;

#[cfg(target_os = "windows")]
pub use init::platform_module;

#[cfg(not(target_os = "windows"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowsPlatformStub;
