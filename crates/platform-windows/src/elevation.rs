use std::env;
use std::mem::size_of;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use windows::Win32::Foundation::ERROR_CANCELLED;
use windows::Win32::System::Threading::GetCurrentProcess;
use windows::Win32::UI::Shell::{
    SEE_MASK_NOASYNC, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW, ShellExecuteExW,
};
use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;
use windows::core::{HSTRING, PCWSTR, w};
use winbridge_core::command_line::join_arguments;
use winbridge_core::platform::{ElevationOutcome, ElevationProvider, PlatformError};
use winbridge_core::register_elevation_provider;

use crate::error::win32_error;
use crate::handle::OwnedHandle;
use crate::process::token_elevated;

static WINDOWS_ELEVATION: WindowsElevation = WindowsElevation;

register_elevation_provider!(&WINDOWS_ELEVATION);

struct WindowsElevation;

/// Known system locations with their default paths.
const PROTECTED_LOCATIONS: [(&str, &str); 4] = [
    ("SystemRoot", r"C:\Windows"),
    ("ProgramFiles", r"C:\Program Files"),
    ("ProgramFiles(x86)", r"C:\Program Files (x86)"),
    ("ProgramData", r"C:\ProgramData"),
];

pub(crate) fn current_process_elevated() -> Result<bool, PlatformError> {
    // The pseudo handle needs no closing.
    token_elevated(unsafe { GetCurrentProcess() })
}

impl ElevationProvider for WindowsElevation {
    fn name(&self) -> &'static str {
        "UAC"
    }

    fn is_elevated(&self) -> Result<bool, PlatformError> {
        current_process_elevated()
    }

    fn launch_elevated(
        &self,
        executable: &Path,
        args: &[String],
    ) -> Result<ElevationOutcome, PlatformError> {
        let file = HSTRING::from(executable.as_os_str());
        let parameters = HSTRING::from(join_arguments(args));
        let mut request = SHELLEXECUTEINFOW {
            cbSize: size_of::<SHELLEXECUTEINFOW>() as u32,
            fMask: SEE_MASK_NOCLOSEPROCESS | SEE_MASK_NOASYNC,
            lpVerb: w!("runas"),
            lpFile: PCWSTR(file.as_ptr()),
            lpParameters: PCWSTR(parameters.as_ptr()),
            nShow: SW_SHOWNORMAL.0,
            ..Default::default()
        };

        match unsafe { ShellExecuteExW(&raw mut request) } {
            Ok(()) => {
                // The elevated instance runs independently; release our handle to it.
                drop(OwnedHandle::new(request.hProcess));
                info!(executable = %executable.display(), "elevated process started");
                Ok(ElevationOutcome::Started)
            }
            Err(err) if err.code() == ERROR_CANCELLED.to_hresult() => {
                debug!(executable = %executable.display(), "elevation prompt declined");
                Ok(ElevationOutcome::Declined)
            }
            Err(err) => {
                let context = format_args!("ShellExecuteExW(runas, {})", executable.display());
                Err(win32_error(context, &err))
            }
        }
    }

    fn protected_directories(&self) -> Vec<PathBuf> {
        let mut directories: Vec<PathBuf> = Vec::with_capacity(PROTECTED_LOCATIONS.len());
        for (variable, fallback) in PROTECTED_LOCATIONS {
            let directory =
                env::var_os(variable).map_or_else(|| PathBuf::from(fallback), PathBuf::from);
            if !directories.contains(&directory) {
                directories.push(directory);
            }
        }
        directories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn elevation_query_is_stable() {
        let first = WINDOWS_ELEVATION.is_elevated().unwrap();
        assert_eq!(WINDOWS_ELEVATION.is_elevated().unwrap(), first);
    }

    #[rstest]
    fn protected_directories_include_system_root() {
        let directories = WINDOWS_ELEVATION.protected_directories();
        assert!(
            directories
                .iter()
                .any(|dir| dir.to_string_lossy().to_ascii_lowercase().ends_with("windows"))
        );
    }

    #[rstest]
    #[ignore = "shows a UAC prompt"]
    fn elevated_launch_prompts() {
        let cmd = Path::new(r"C:\Windows\System32\cmd.exe");
        let outcome = WINDOWS_ELEVATION.launch_elevated(cmd, &["/C".into(), "exit".into()]);
        assert!(outcome.is_ok());
    }
}
