//! Mount stub traits.

use std::ffi::CStr;

use cephfs_types::{native_code_t, RawStatVfs, XattrFlags};

/// One native mount handle.
///
/// Each method corresponds to a single libcephfs call and returns its raw
/// result: `>= 0` on success (a byte count where the call reports one),
/// a negated errno on failure. Implementations own the handle and must
/// free it on drop if [`MountStub::release`] was never called.
pub trait MountStub: Send {
    /// Native directory cursor.
    type Dir: Send;

    /// Load configuration. `None` searches the default locations.
    fn conf_read_file(&mut self, path: Option<&CStr>) -> native_code_t;

    fn conf_set(&mut self, option: &CStr, value: &CStr) -> native_code_t;

    /// Mount the filesystem. `None` mounts `/`.
    fn mount(&mut self, root: Option<&CStr>) -> native_code_t;

    fn sync_fs(&mut self) -> native_code_t;

    fn chdir(&mut self, path: &CStr) -> native_code_t;

    fn mkdir(&mut self, path: &CStr, mode: u32) -> native_code_t;

    fn rmdir(&mut self, path: &CStr) -> native_code_t;

    fn rename(&mut self, from: &CStr, to: &CStr) -> native_code_t;

    fn opendir(&mut self, path: &CStr) -> Result<Self::Dir, native_code_t>;

    /// Read the next entry name into `name`.
    ///
    /// Returns 1 when an entry was read, 0 at end of directory, or a
    /// negated errno.
    fn readdir(&mut self, dir: &mut Self::Dir, name: &mut Vec<u8>) -> native_code_t;

    fn closedir(&mut self, dir: Self::Dir) -> native_code_t;

    fn statfs(&mut self, path: &CStr, out: &mut RawStatVfs) -> native_code_t;

    /// Read an attribute value into `buf`.
    ///
    /// An empty `buf` returns the value length without copying; a
    /// non-empty `buf` that is too small fails with `-ERANGE`.
    fn getxattr(&mut self, path: &CStr, name: &CStr, buf: &mut [u8]) -> native_code_t;

    /// List attribute names as NUL-terminated strings, with the same
    /// length protocol as [`MountStub::getxattr`].
    fn listxattr(&mut self, path: &CStr, buf: &mut [u8]) -> native_code_t;

    fn setxattr(
        &mut self,
        path: &CStr,
        name: &CStr,
        value: &[u8],
        flags: XattrFlags,
    ) -> native_code_t;

    fn removexattr(&mut self, path: &CStr, name: &CStr) -> native_code_t;

    /// Unmount (if mounted) and free the handle. Called at most once by
    /// the session layer.
    fn release(&mut self) -> native_code_t;
}

/// Factory for mount handles (`ceph_create`).
pub trait MountConnector {
    type Mount: MountStub;

    /// Allocate a new handle. `client_id` of `None` uses the library default.
    fn create(&self, client_id: Option<&CStr>) -> Result<Self::Mount, native_code_t>;
}
