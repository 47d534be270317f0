//! Classification of native libcephfs return codes.
//!
//! libcephfs reports failure as a negated errno (`-ENOENT`, `-ERANGE`, ...).
//! Every such code is mapped onto an [`ErrorKind`] exactly once, here, so
//! callers branch on named kinds instead of numeric literals.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw native return code type (`int` in the C API).
#[allow(non_camel_case_types)]
pub type native_code_t = i32;

/// errno reported when an extended attribute does not exist.
#[cfg(target_os = "linux")]
pub const ENOATTR: native_code_t = libc::ENODATA;

/// errno reported when an extended attribute does not exist.
#[cfg(not(target_os = "linux"))]
pub const ENOATTR: native_code_t = libc::ENOATTR;

/// The error taxonomy exposed by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The native library could not allocate a mount handle.
    Init,
    /// Reading or applying client configuration failed.
    Config,
    /// Establishing the mount failed.
    Mount,
    /// No such entity or attribute.
    NotFound,
    /// The entity or attribute already exists.
    AlreadyExists,
    /// Permission denied.
    Permission,
    /// The session has been closed.
    ClosedSession,
    /// The session is not in a state that allows the operation.
    InvalidState,
    /// An argument cannot be passed to the native library.
    InvalidArgument,
    /// Any other native failure.
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Init => "Init",
            ErrorKind::Config => "Config",
            ErrorKind::Mount => "Mount",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::Permission => "Permission",
            ErrorKind::ClosedSession => "ClosedSession",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::Io => "IO",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a native return value signals failure.
#[inline]
pub fn is_error(code: native_code_t) -> bool {
    code < 0
}

/// Map a negative native return code to its error kind.
///
/// The sign is ignored so that both `-ENOENT` and `ENOENT` classify the
/// same way.
pub fn classify(code: native_code_t) -> ErrorKind {
    match code.wrapping_abs() {
        libc::ENOENT => ErrorKind::NotFound,
        c if c == ENOATTR => ErrorKind::NotFound,
        libc::EEXIST => ErrorKind::AlreadyExists,
        libc::EPERM | libc::EACCES => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

/// Whether `code` means "buffer too small" for a sized native call.
#[inline]
pub fn is_buffer_too_small(code: native_code_t) -> bool {
    code == -libc::ERANGE
}

/// Whether `code` means the attribute itself is absent (as opposed to the
/// path it was looked up on).
#[inline]
pub fn is_missing_attribute(code: native_code_t) -> bool {
    code == -ENOATTR
}

/// Symbolic name of an errno, for diagnostics.
pub fn errno_name(code: native_code_t) -> &'static str {
    match code.wrapping_abs() {
        0 => "OK",
        libc::EPERM => "EPERM",
        libc::ENOENT => "ENOENT",
        libc::EIO => "EIO",
        libc::EBADF => "EBADF",
        libc::ENOMEM => "ENOMEM",
        libc::EACCES => "EACCES",
        libc::EEXIST => "EEXIST",
        libc::ENOTDIR => "ENOTDIR",
        libc::EISDIR => "EISDIR",
        libc::EINVAL => "EINVAL",
        libc::ENOSPC => "ENOSPC",
        libc::E2BIG => "E2BIG",
        libc::ERANGE => "ERANGE",
        libc::ENAMETOOLONG => "ENAMETOOLONG",
        libc::ENOTEMPTY => "ENOTEMPTY",
        libc::ENOTCONN => "ENOTCONN",
        libc::ETIMEDOUT => "ETIMEDOUT",
        c if c == ENOATTR => "ENOATTR",
        _ => "UNKNOWN",
    }
}
