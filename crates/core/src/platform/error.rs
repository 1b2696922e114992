use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

/// Error reported by a platform provider.
///
/// Providers keep the native detail in `message`; callers branch on `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    pub message: Option<String>,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: Some(message.into()) }
    }

    pub fn simple(kind: PlatformErrorKind) -> Self {
        Self { kind, message: None }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::NotFound, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::AccessDenied, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::InvalidArgument, message)
    }

    pub fn kind(&self) -> PlatformErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == PlatformErrorKind::NotFound
    }

    /// Wraps an I/O error with context, keeping the classification of the
    /// two kinds callers act on.
    pub fn from_io(context: impl Display, err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => PlatformErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => PlatformErrorKind::AccessDenied,
            _ => PlatformErrorKind::OperationFailed,
        };
        Self::new(kind, format!("{context}: {err}"))
    }
}

impl Display for PlatformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{msg}"),
            None => write!(f, "{:#?}", self.kind),
        }
    }
}

impl Error for PlatformError {}

impl From<io::Error> for PlatformError {
    fn from(err: io::Error) -> Self {
        Self::from_io("I/O error", &err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformErrorKind {
    /// The addressed process, key, value or path does not exist.
    NotFound,
    /// The OS refused the operation for lack of privilege.
    AccessDenied,
    /// Input rejected before any OS call was made.
    InvalidArgument,
    /// The registry subsystem itself failed.
    StoreUnavailable,
    /// A native facility (process listing, token, shell) could not be reached.
    SubsystemUnavailable,
    OperationFailed,
    UnsupportedPlatform,
    InitializationFailed,
}
