pub mod error_code;
pub mod error;
pub mod path;
pub mod stats;
pub mod xattr;

// Re-export commonly used items at the crate root.
pub use error::{check, CephError, Result};
pub use error_code::{classify, native_code_t, ErrorKind, ENOATTR};
pub use stats::{FsStats, RawStatVfs};
pub use xattr::{ExtAttribute, XattrFlags};
