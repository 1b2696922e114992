use std::ffi::c_void;

use windows::Win32::Foundation::{CloseHandle, HANDLE, HLOCAL, LocalFree};

/// Kernel handle closed on drop.
pub(crate) struct OwnedHandle(HANDLE);

impl OwnedHandle {
    pub(crate) fn new(handle: HANDLE) -> Self {
        Self(handle)
    }

    pub(crate) fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            let _ = unsafe { CloseHandle(self.0) };
        }
    }
}

/// Buffer allocated by the system with `LocalAlloc`, released on drop.
pub(crate) struct LocalBuffer(*mut c_void);

impl LocalBuffer {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }
}

impl Drop for LocalBuffer {
    fn drop(&mut self) {
        if !self.0.is_null() {
            let _ = unsafe { LocalFree(Some(HLOCAL(self.0))) };
        }
    }
}
