use std::io;

use windows::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_INVALID_PARAMETER, ERROR_PATH_NOT_FOUND,
    WIN32_ERROR,
};
use winbridge_core::platform::{PlatformError, PlatformErrorKind};

/// Classifies a Win32 failure. `ERROR_INVALID_PARAMETER` is what `OpenProcess`
/// reports for a pid that no longer exists.
pub(crate) fn win32_error(
    context: impl std::fmt::Display,
    err: &windows::core::Error,
) -> PlatformError {
    let code = err.code();
    let kind = if code == ERROR_ACCESS_DENIED.to_hresult() {
        PlatformErrorKind::AccessDenied
    } else if [ERROR_INVALID_PARAMETER, ERROR_FILE_NOT_FOUND, ERROR_PATH_NOT_FOUND]
        .iter()
        .any(|candidate| candidate.to_hresult() == code)
    {
        PlatformErrorKind::NotFound
    } else {
        PlatformErrorKind::OperationFailed
    };
    PlatformError::new(kind, format!("{context}: {}", err.message()))
}

pub(crate) fn check_status(
    context: impl std::fmt::Display,
    status: WIN32_ERROR,
) -> Result<(), PlatformError> {
    status.ok().map_err(|err| win32_error(context, &err))
}

/// Registry failures other than missing keys or denied access mean the store
/// itself misbehaved.
pub(crate) fn registry_error(context: impl std::fmt::Display, err: &io::Error) -> PlatformError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            PlatformError::from_io(context, err)
        }
        _ => PlatformError::new(PlatformErrorKind::StoreUnavailable, format!("{context}: {err}")),
    }
}
