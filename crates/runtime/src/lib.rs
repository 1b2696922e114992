mod config;
mod error;
mod journal;
mod privilege;
pub mod process;
pub mod registry;
pub mod runtime;
#[cfg(test)]
mod test_support;

pub use config::{BridgeConfig, ClassesScope, ConfigError};
pub use error::{BridgeError, ErrorKind};
pub use journal::RegistryTransaction;
pub use privilege::PrivilegeManager;
pub use process::{KillReport, ProcessController, ProcessTree, RootOutcome, TerminationFailure};
pub use registry::{RUN_KEY, RegistryManager};
pub use runtime::Runtime;
pub use tokio_util::sync::CancellationToken;
