//! Directory listing.

use std::fmt;
use std::thread::{self, ThreadId};

use cephfs_stubs::MountStub;
use cephfs_types::error_code::errno_name;
use cephfs_types::{native_code_t, CephError, Result};
use parking_lot::{Mutex, MutexGuard};

use crate::session::{cstring, Inner, MountSession};

/// A lazy, single-pass listing of one directory.
///
/// Holds the session lock for as long as it lives, so no other operation
/// on the same session can interleave with the open cursor. Other threads
/// wait; a session call from the iterating thread itself fails with
/// `InvalidState`. Collect with [`MountSession::list_directory`] first when
/// each entry needs further session calls.
///
/// The native cursor is closed exactly once: at end of directory, on the
/// first read error, or when the iterator is dropped early. Entries come in
/// native order; `.` and `..` are skipped.
pub struct ReadDir<'a, M: MountStub> {
    guard: MutexGuard<'a, Inner<M>>,
    lister: &'a Mutex<Option<ThreadId>>,
    dir: Option<M::Dir>,
    path: String,
    name: Vec<u8>,
}

impl<'a, M: MountStub> ReadDir<'a, M> {
    /// Absolute path being listed.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Close the cursor if it is still open, returning the native result.
    fn finish(&mut self) -> native_code_t {
        let Some(dir) = self.dir.take() else {
            return 0;
        };
        match self.guard.mount.as_mut() {
            Some(mount) => mount.closedir(dir),
            None => 0,
        }
    }
}

impl<'a, M: MountStub> Iterator for ReadDir<'a, M> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dir = self.dir.as_mut()?;
            let ret = match self.guard.mount.as_mut() {
                Some(mount) => mount.readdir(dir, &mut self.name),
                None => -libc::EBADF,
            };
            match ret {
                0 => {
                    let ret = self.finish();
                    if ret < 0 {
                        tracing::debug!(path = %self.path, code = ret, "closedir failed");
                        return Some(Err(CephError::from_code("closedir", ret)));
                    }
                    return None;
                }
                ret if ret < 0 => {
                    let close_ret = self.finish();
                    if close_ret < 0 {
                        tracing::warn!(path = %self.path, code = close_ret, "closedir failed after readdir error");
                    }
                    tracing::debug!(path = %self.path, code = ret, errno = errno_name(ret), "readdir failed");
                    return Some(Err(CephError::from_code("readdir", ret)));
                }
                _ => {
                    if self.name == b"." || self.name == b".." {
                        continue;
                    }
                    return Some(Ok(String::from_utf8_lossy(&self.name).into_owned()));
                }
            }
        }
    }
}

impl<'a, M: MountStub> std::iter::FusedIterator for ReadDir<'a, M> {}

impl<'a, M: MountStub> Drop for ReadDir<'a, M> {
    fn drop(&mut self) {
        let ret = self.finish();
        if ret < 0 {
            tracing::warn!(path = %self.path, code = ret, "closedir failed on drop");
        }
        *self.lister.lock() = None;
    }
}

impl<'a, M: MountStub> fmt::Debug for ReadDir<'a, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadDir")
            .field("path", &self.path)
            .field("open", &self.dir.is_some())
            .finish()
    }
}

impl<M: MountStub> MountSession<M> {
    /// Open a directory for lazy iteration.
    pub fn read_dir(&self, p: &str) -> Result<ReadDir<'_, M>> {
        const OP: &str = "opendir";
        let mut guard = self.lock_mounted(OP)?;
        let path = guard.resolve(p);
        let c_path = cstring(OP, &path)?;
        let dir = match guard.handle(OP)?.opendir(&c_path) {
            Ok(dir) => dir,
            Err(code) => {
                tracing::debug!(path = %path, code, errno = errno_name(code), "opendir failed");
                return Err(CephError::from_code(OP, code));
            }
        };
        tracing::debug!(path = %path, "opendir");
        *self.lister.lock() = Some(thread::current().id());
        Ok(ReadDir {
            guard,
            lister: &self.lister,
            dir: Some(dir),
            path,
            name: Vec::with_capacity(256),
        })
    }

    /// List every entry name of a directory.
    ///
    /// The first read error aborts the listing; the cursor is closed
    /// either way.
    pub fn list_directory(&self, p: &str) -> Result<Vec<String>> {
        self.read_dir(p)?.collect()
    }

    /// List the tracked working directory.
    pub fn list_current_directory(&self) -> Result<Vec<String>> {
        self.list_directory(".")
    }
}
