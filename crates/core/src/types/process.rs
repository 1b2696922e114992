use serde::Serialize;

/// A process as seen by one enumeration. Never persisted; pids are recycled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    /// Image name, e.g. `notepad.exe`.
    pub name: String,
    /// `None` for roots and for processes whose parent link the OS does not report.
    pub parent_pid: Option<u32>,
    pub is_elevated: bool,
}

impl ProcessRecord {
    pub fn new(pid: u32, name: impl Into<String>, parent_pid: Option<u32>) -> Self {
        Self { pid, name: name.into(), parent_pid, is_elevated: false }
    }

    pub fn with_elevated(mut self, is_elevated: bool) -> Self {
        self.is_elevated = is_elevated;
        self
    }

    /// Case-insensitive exact match on the image name.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || (!self.name.is_ascii() && self.name.to_lowercase() == name.to_lowercase())
    }
}
