use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;
use winbridge_core::platform::{PlatformError, PlatformErrorKind};

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    InvalidArgument,
    StoreUnavailable,
    SubsystemUnavailable,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::AccessDenied => "access denied",
            Self::InvalidArgument => "invalid argument",
            Self::StoreUnavailable => "store unavailable",
            Self::SubsystemUnavailable => "subsystem unavailable",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("registry store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("subsystem unavailable: {0}")]
    SubsystemUnavailable(String),
    #[error("operation cancelled")]
    Cancelled,
    /// A multi-step change failed and undoing the steps already applied failed too.
    #[error("{source} (rollback incomplete: {})", rollback_failures.join("; "))]
    Incomplete { source: Box<BridgeError>, rollback_failures: Vec<String> },
}

impl BridgeError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Kind of the primary failure, looking through [`BridgeError::Incomplete`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Self::SubsystemUnavailable(_) => ErrorKind::SubsystemUnavailable,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Incomplete { source, .. } => source.kind(),
        }
    }

    pub fn rollback_failures(&self) -> &[String] {
        match self {
            Self::Incomplete { rollback_failures, .. } => rollback_failures,
            _ => &[],
        }
    }

    pub(crate) fn io(context: impl fmt::Display, err: &io::Error) -> Self {
        PlatformError::from_io(context, err).into()
    }
}

impl From<PlatformError> for BridgeError {
    fn from(err: PlatformError) -> Self {
        let message = err.to_string();
        match err.kind() {
            PlatformErrorKind::NotFound => Self::NotFound(message),
            PlatformErrorKind::AccessDenied => Self::AccessDenied(message),
            PlatformErrorKind::InvalidArgument => Self::InvalidArgument(message),
            PlatformErrorKind::StoreUnavailable => Self::StoreUnavailable(message),
            PlatformErrorKind::SubsystemUnavailable
            | PlatformErrorKind::OperationFailed
            | PlatformErrorKind::UnsupportedPlatform
            | PlatformErrorKind::InitializationFailed => Self::SubsystemUnavailable(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PlatformErrorKind::NotFound, ErrorKind::NotFound)]
    #[case(PlatformErrorKind::AccessDenied, ErrorKind::AccessDenied)]
    #[case(PlatformErrorKind::StoreUnavailable, ErrorKind::StoreUnavailable)]
    #[case(PlatformErrorKind::OperationFailed, ErrorKind::SubsystemUnavailable)]
    #[case(PlatformErrorKind::UnsupportedPlatform, ErrorKind::SubsystemUnavailable)]
    fn platform_errors_keep_their_kind(
        #[case] platform: PlatformErrorKind,
        #[case] expected: ErrorKind,
    ) {
        let err: BridgeError = PlatformError::new(platform, "boom").into();
        assert_eq!(err.kind(), expected);
        assert!(err.to_string().ends_with("boom"));
    }

    #[rstest]
    fn incomplete_reports_primary_kind_first() {
        let err = BridgeError::Incomplete {
            source: Box::new(BridgeError::AccessDenied("write HKCR\\.txt".into())),
            rollback_failures: vec!["delete HKCR\\App.Doc".into()],
        };
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        assert_eq!(err.rollback_failures().len(), 1);
        assert!(err.to_string().starts_with("access denied: write HKCR\\.txt"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
