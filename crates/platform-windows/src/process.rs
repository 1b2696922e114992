use std::mem::size_of;

use tracing::trace;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Security::{GetTokenInformation, TOKEN_ELEVATION, TOKEN_QUERY, TokenElevation};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    OpenProcess, OpenProcessToken, PROCESS_ACCESS_RIGHTS, PROCESS_QUERY_LIMITED_INFORMATION,
    PROCESS_TERMINATE, TerminateProcess,
};
use winbridge_core::platform::{PlatformError, PlatformErrorKind, ProcessProvider};
use winbridge_core::register_process_provider;
use winbridge_core::types::ProcessRecord;

use crate::error::win32_error;
use crate::handle::OwnedHandle;

static WINDOWS_PROCESS_PROVIDER: WindowsProcessProvider = WindowsProcessProvider;

register_process_provider!(&WINDOWS_PROCESS_PROVIDER);

/// Exit code handed to `TerminateProcess`.
const TERMINATED_EXIT_CODE: u32 = 1;

struct WindowsProcessProvider;

fn open_process(pid: u32, access: PROCESS_ACCESS_RIGHTS) -> Result<OwnedHandle, PlatformError> {
    unsafe { OpenProcess(access, false, pid) }
        .map(OwnedHandle::new)
        .map_err(|err| win32_error(format_args!("OpenProcess({pid})"), &err))
}

fn record_from_entry(entry: &PROCESSENTRY32W) -> ProcessRecord {
    let len = entry.szExeFile.iter().position(|&ch| ch == 0).unwrap_or(entry.szExeFile.len());
    let name = String::from_utf16_lossy(&entry.szExeFile[..len]);
    let pid = entry.th32ProcessID;
    let parent = entry.th32ParentProcessID;
    // The idle process names itself as parent; pid 0 never is a real parent.
    let parent_pid = (parent != 0 && parent != pid).then_some(parent);
    ProcessRecord::new(pid, name, parent_pid)
}

/// Elevation flag of the token behind `process`.
pub(crate) fn token_elevated(process: HANDLE) -> Result<bool, PlatformError> {
    let mut token = HANDLE::default();
    unsafe { OpenProcessToken(process, TOKEN_QUERY, &raw mut token) }
        .map_err(|err| win32_error("OpenProcessToken", &err))?;
    let token = OwnedHandle::new(token);

    let mut elevation = TOKEN_ELEVATION::default();
    let mut returned = 0u32;
    unsafe {
        GetTokenInformation(
            token.raw(),
            TokenElevation,
            Some((&raw mut elevation).cast()),
            size_of::<TOKEN_ELEVATION>() as u32,
            &raw mut returned,
        )
    }
    .map_err(|err| win32_error("GetTokenInformation(TokenElevation)", &err))?;
    Ok(elevation.TokenIsElevated != 0)
}

impl ProcessProvider for WindowsProcessProvider {
    fn name(&self) -> &'static str {
        "Toolhelp32"
    }

    fn snapshot(&self) -> Result<Vec<ProcessRecord>, PlatformError> {
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }.map_err(|err| {
            PlatformError::new(
                PlatformErrorKind::SubsystemUnavailable,
                format!("CreateToolhelp32Snapshot: {err}"),
            )
        })?;
        let snapshot = OwnedHandle::new(snapshot);

        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };
        let mut records = Vec::new();
        let mut next = unsafe { Process32FirstW(snapshot.raw(), &raw mut entry) };
        while next.is_ok() {
            records.push(record_from_entry(&entry));
            next = unsafe { Process32NextW(snapshot.raw(), &raw mut entry) };
        }
        trace!(count = records.len(), "process snapshot taken");
        Ok(records)
    }

    fn terminate(&self, pid: u32) -> Result<(), PlatformError> {
        let process = open_process(pid, PROCESS_TERMINATE)?;
        unsafe { TerminateProcess(process.raw(), TERMINATED_EXIT_CODE) }
            .map_err(|err| win32_error(format_args!("TerminateProcess({pid})"), &err))
    }

    fn is_elevated(&self, pid: u32) -> Result<bool, PlatformError> {
        let process = open_process(pid, PROCESS_QUERY_LIMITED_INFORMATION)?;
        token_elevated(process.raw())
    }
}
