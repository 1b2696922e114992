use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use winbridge_core::platform::{PlatformError, PlatformErrorKind, ProcessProvider};
use winbridge_core::types::ProcessRecord;

use crate::lock;

struct ProcessTableState {
    processes: BTreeMap<u32, ProcessRecord>,
    elevated: BTreeSet<u32>,
    protected: BTreeSet<u32>,
    sealed: BTreeSet<u32>,
    vanishing: BTreeSet<u32>,
    unavailable: bool,
    terminated: Vec<u32>,
}

impl ProcessTableState {
    const fn new() -> Self {
        Self {
            processes: BTreeMap::new(),
            elevated: BTreeSet::new(),
            protected: BTreeSet::new(),
            sealed: BTreeSet::new(),
            vanishing: BTreeSet::new(),
            unavailable: false,
            terminated: Vec::new(),
        }
    }
}

/// Seeded process table. Terminated processes disappear from later snapshots.
pub struct MockProcessTable {
    state: Mutex<ProcessTableState>,
}

impl MockProcessTable {
    pub const fn new() -> Self {
        Self { state: Mutex::new(ProcessTableState::new()) }
    }

    pub fn reset(&self) {
        *lock(&self.state) = ProcessTableState::new();
    }

    pub fn spawn(&self, pid: u32, name: &str, parent_pid: Option<u32>) {
        lock(&self.state).processes.insert(pid, ProcessRecord::new(pid, name, parent_pid));
    }

    pub fn set_elevated(&self, pid: u32, elevated: bool) {
        let mut state = lock(&self.state);
        if elevated {
            state.elevated.insert(pid);
        } else {
            state.elevated.remove(&pid);
        }
    }

    /// Terminating `pid` fails with `AccessDenied` from now on.
    pub fn deny_terminate(&self, pid: u32) {
        lock(&self.state).protected.insert(pid);
    }

    /// Querying the token of `pid` fails with `AccessDenied` from now on.
    pub fn deny_elevation_query(&self, pid: u32) {
        lock(&self.state).sealed.insert(pid);
    }

    /// `pid` exits on its own right before the termination request reaches it.
    pub fn vanish_on_terminate(&self, pid: u32) {
        lock(&self.state).vanishing.insert(pid);
    }

    /// Removes `pid` without recording a termination.
    pub fn exit(&self, pid: u32) {
        lock(&self.state).processes.remove(&pid);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    pub fn is_running(&self, pid: u32) -> bool {
        lock(&self.state).processes.contains_key(&pid)
    }

    /// Pids terminated since the last call, in termination order.
    pub fn take_terminated(&self) -> Vec<u32> {
        std::mem::take(&mut lock(&self.state).terminated)
    }
}

impl Default for MockProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

fn unavailable() -> PlatformError {
    PlatformError::new(PlatformErrorKind::SubsystemUnavailable, "mock process table is offline")
}

impl ProcessProvider for MockProcessTable {
    fn name(&self) -> &'static str {
        crate::MOCK_NAME
    }

    fn snapshot(&self) -> Result<Vec<ProcessRecord>, PlatformError> {
        let state = lock(&self.state);
        if state.unavailable {
            return Err(unavailable());
        }
        Ok(state.processes.values().cloned().collect())
    }

    fn terminate(&self, pid: u32) -> Result<(), PlatformError> {
        let mut state = lock(&self.state);
        if state.unavailable {
            return Err(unavailable());
        }
        if state.vanishing.remove(&pid) {
            state.processes.remove(&pid);
        }
        if !state.processes.contains_key(&pid) {
            return Err(PlatformError::not_found(format!("process {pid} is not running")));
        }
        if state.protected.contains(&pid) {
            return Err(PlatformError::access_denied(format!("process {pid} cannot be terminated")));
        }
        state.processes.remove(&pid);
        state.terminated.push(pid);
        Ok(())
    }

    fn is_elevated(&self, pid: u32) -> Result<bool, PlatformError> {
        let state = lock(&self.state);
        if !state.processes.contains_key(&pid) {
            return Err(PlatformError::not_found(format!("process {pid} is not running")));
        }
        if state.sealed.contains(&pid) {
            return Err(PlatformError::access_denied(format!("cannot open token of {pid}")));
        }
        Ok(state.elevated.contains(&pid))
    }
}
