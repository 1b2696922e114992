use std::path::PathBuf;

use rstest::fixture;
use tempfile::TempDir;
use winbridge_platform_mock::MockPlatform;

/// rstest fixture: a private mock platform per test.
#[fixture]
pub fn mock_platform() -> &'static MockPlatform {
    MockPlatform::leaked()
}

/// rstest fixture: an existing `app.exe` inside a temporary directory. Keep
/// the directory alive for as long as the path is used.
#[fixture]
pub fn fake_executable() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let exe = dir.path().join("app.exe");
    std::fs::write(&exe, b"MZ").expect("write fake executable");
    (dir, exe)
}
