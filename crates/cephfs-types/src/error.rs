//! Structured error returned by every fallible session operation.

use crate::error_code::{self, native_code_t, ErrorKind};

/// An error from the session layer.
///
/// Native failures keep the raw return code for diagnostics; lifecycle and
/// argument errors carry a synthetic negated errno so [`CephError::code`]
/// is always meaningful.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CephError {
    #[error("{op}: cannot create mount handle (ret={code})")]
    Init { op: &'static str, code: native_code_t },

    #[error("{op}: configuration error (ret={code})")]
    Config { op: &'static str, code: native_code_t },

    #[error("{op}: mount failed (ret={code})")]
    Mount { op: &'static str, code: native_code_t },

    #[error("{op}: not found (ret={code})")]
    NotFound { op: &'static str, code: native_code_t },

    #[error("{op}: already exists (ret={code})")]
    AlreadyExists { op: &'static str, code: native_code_t },

    #[error("{op}: permission denied (ret={code})")]
    Permission { op: &'static str, code: native_code_t },

    #[error("{op}: session closed")]
    ClosedSession { op: &'static str },

    #[error("{op}: session is {actual}, requires {expected}")]
    InvalidState {
        op: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{op}: invalid argument: {reason}")]
    InvalidArgument {
        op: &'static str,
        code: native_code_t,
        reason: String,
    },

    #[error("{op}: I/O error (ret={code})")]
    Io { op: &'static str, code: native_code_t },
}

impl CephError {
    /// Translate a failed native return code using the shared classifier.
    pub fn from_code(op: &'static str, code: native_code_t) -> Self {
        match error_code::classify(code) {
            ErrorKind::NotFound => CephError::NotFound { op, code },
            ErrorKind::AlreadyExists => CephError::AlreadyExists { op, code },
            ErrorKind::Permission => CephError::Permission { op, code },
            _ => CephError::Io { op, code },
        }
    }

    pub fn init(op: &'static str, code: native_code_t) -> Self {
        CephError::Init { op, code }
    }

    pub fn config(op: &'static str, code: native_code_t) -> Self {
        CephError::Config { op, code }
    }

    pub fn mount(op: &'static str, code: native_code_t) -> Self {
        CephError::Mount { op, code }
    }

    pub fn invalid_argument(op: &'static str, code: native_code_t, reason: impl Into<String>) -> Self {
        CephError::InvalidArgument {
            op,
            code,
            reason: reason.into(),
        }
    }

    /// The raw (or synthetic) negated errno behind this error.
    pub fn code(&self) -> native_code_t {
        match self {
            CephError::Init { code, .. }
            | CephError::Config { code, .. }
            | CephError::Mount { code, .. }
            | CephError::NotFound { code, .. }
            | CephError::AlreadyExists { code, .. }
            | CephError::Permission { code, .. }
            | CephError::InvalidArgument { code, .. }
            | CephError::Io { code, .. } => *code,
            CephError::ClosedSession { .. } => -libc::EBADF,
            CephError::InvalidState { .. } => -libc::ENOTCONN,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CephError::Init { .. } => ErrorKind::Init,
            CephError::Config { .. } => ErrorKind::Config,
            CephError::Mount { .. } => ErrorKind::Mount,
            CephError::NotFound { .. } => ErrorKind::NotFound,
            CephError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            CephError::Permission { .. } => ErrorKind::Permission,
            CephError::ClosedSession { .. } => ErrorKind::ClosedSession,
            CephError::InvalidState { .. } => ErrorKind::InvalidState,
            CephError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            CephError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Name of the operation that failed.
    pub fn op(&self) -> &'static str {
        match self {
            CephError::Init { op, .. }
            | CephError::Config { op, .. }
            | CephError::Mount { op, .. }
            | CephError::NotFound { op, .. }
            | CephError::AlreadyExists { op, .. }
            | CephError::Permission { op, .. }
            | CephError::ClosedSession { op }
            | CephError::InvalidState { op, .. }
            | CephError::InvalidArgument { op, .. }
            | CephError::Io { op, .. } => *op,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Symbolic errno of [`code`](Self::code), e.g. `"ENOENT"`.
    pub fn errno(&self) -> &'static str {
        error_code::errno_name(self.code())
    }
}

/// Result type used throughout the session layer.
pub type Result<T> = std::result::Result<T, CephError>;

/// Convert a native return value into `Ok(value)` or a classified error.
pub fn check(op: &'static str, ret: native_code_t) -> Result<native_code_t> {
    if error_code::is_error(ret) {
        Err(CephError::from_code(op, ret))
    } else {
        Ok(ret)
    }
}
