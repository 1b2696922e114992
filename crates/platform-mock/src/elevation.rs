use std::path::{Path, PathBuf};
use std::sync::Mutex;

use winbridge_core::platform::{ElevationOutcome, ElevationProvider, PlatformError};

use crate::lock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElevationRequest {
    pub executable: PathBuf,
    pub args: Vec<String>,
}

struct ElevationState {
    elevated: bool,
    outcome: ElevationOutcome,
    protected: Vec<PathBuf>,
    requests: Vec<ElevationRequest>,
}

impl ElevationState {
    const fn new() -> Self {
        Self {
            elevated: false,
            outcome: ElevationOutcome::Started,
            protected: Vec::new(),
            requests: Vec::new(),
        }
    }
}

/// Elevation switch with a scripted prompt answer.
pub struct MockElevation {
    state: Mutex<ElevationState>,
}

impl MockElevation {
    pub const fn new() -> Self {
        Self { state: Mutex::new(ElevationState::new()) }
    }

    pub fn reset(&self) {
        *lock(&self.state) = ElevationState::new();
    }

    pub fn set_elevated(&self, elevated: bool) {
        lock(&self.state).elevated = elevated;
    }

    /// Answer given to subsequent elevation prompts.
    pub fn answer_prompt(&self, outcome: ElevationOutcome) {
        lock(&self.state).outcome = outcome;
    }

    pub fn set_protected_directories(&self, directories: Vec<PathBuf>) {
        lock(&self.state).protected = directories;
    }

    pub fn take_requests(&self) -> Vec<ElevationRequest> {
        std::mem::take(&mut lock(&self.state).requests)
    }
}

impl Default for MockElevation {
    fn default() -> Self {
        Self::new()
    }
}

impl ElevationProvider for MockElevation {
    fn name(&self) -> &'static str {
        crate::MOCK_NAME
    }

    fn is_elevated(&self) -> Result<bool, PlatformError> {
        Ok(lock(&self.state).elevated)
    }

    fn launch_elevated(
        &self,
        executable: &Path,
        args: &[String],
    ) -> Result<ElevationOutcome, PlatformError> {
        let mut state = lock(&self.state);
        let request =
            ElevationRequest { executable: executable.to_path_buf(), args: args.to_vec() };
        state.requests.push(request);
        Ok(state.outcome)
    }

    fn protected_directories(&self) -> Vec<PathBuf> {
        lock(&self.state).protected.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn prompt_answer_is_scripted_and_requests_are_logged() {
        let elevation = MockElevation::new();
        elevation.answer_prompt(ElevationOutcome::Declined);

        let outcome =
            elevation.launch_elevated(Path::new("/opt/app"), &["--repair".to_owned()]).unwrap();

        assert_eq!(outcome, ElevationOutcome::Declined);
        assert_eq!(
            elevation.take_requests(),
            vec![ElevationRequest {
                executable: PathBuf::from("/opt/app"),
                args: vec!["--repair".into()]
            }]
        );
    }
}
