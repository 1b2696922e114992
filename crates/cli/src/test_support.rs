use rstest::fixture;
use winbridge_platform_mock::MockPlatform;
use winbridge_runtime::{BridgeConfig, Runtime};

/// rstest fixture: a runtime on a private mock platform.
#[fixture]
pub fn mock_runtime() -> (&'static MockPlatform, Runtime) {
    let mock = MockPlatform::leaked();
    (mock, Runtime::with_providers(mock.providers(), BridgeConfig::default()))
}
