use serde::Serialize;
use std::time::SystemTime;

/// Best-effort snapshot of what the current user may do with a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EffectivePermissions {
    pub can_read: bool,
    pub can_write: bool,
    pub can_execute: bool,
    pub can_delete: bool,
}

/// Elevation of the current process at `checked_at`. Recomputed per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElevationState {
    pub is_elevated: bool,
    pub checked_at: SystemTime,
}

impl ElevationState {
    pub fn now(is_elevated: bool) -> Self {
        Self { is_elevated, checked_at: SystemTime::now() }
    }
}
