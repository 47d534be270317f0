//! Extended attribute store.
//!
//! Reads negotiate their buffer size with the native library instead of
//! assuming a fixed size: a read that reports `ERANGE` is retried with the
//! length reported by a zero-length call (or double the previous size when
//! that length is stale), up to a configured ceiling. Writes larger than
//! the same ceiling are rejected before anything reaches the library.

use cephfs_stubs::MountStub;
use cephfs_types::error::check;
use cephfs_types::error_code::{errno_name, is_buffer_too_small, is_missing_attribute};
use cephfs_types::xattr::parse_name_list;
use cephfs_types::{native_code_t, CephError, ExtAttribute, Result, XattrFlags};

use crate::config::XattrWriteMode;
use crate::session::{cstring, MountSession};

fn too_large(op: &'static str, reason: String) -> CephError {
    tracing::debug!(op, %reason, "attribute exceeds buffer ceiling");
    CephError::invalid_argument(op, -libc::ERANGE, reason)
}

/// Run a sized native read, growing the buffer until the result fits.
///
/// `call` is invoked with an empty slice to query the required length and
/// with a non-empty slice to read. Returns exactly the bytes reported.
pub(crate) fn read_sized<F>(
    op: &'static str,
    initial: usize,
    ceiling: usize,
    mut call: F,
) -> Result<Vec<u8>>
where
    F: FnMut(&mut [u8]) -> native_code_t,
{
    let mut size = initial.clamp(1, ceiling.max(1));
    loop {
        let mut buf = vec![0u8; size];
        let ret = call(&mut buf);
        if ret >= 0 {
            buf.truncate(ret as usize);
            return Ok(buf);
        }
        if !is_buffer_too_small(ret) {
            tracing::trace!(op, code = ret, errno = errno_name(ret), "sized read failed");
            return Err(CephError::from_code(op, ret));
        }

        if size >= ceiling {
            return Err(too_large(op, format!("value does not fit in {} bytes", ceiling)));
        }
        let needed = check(op, call(&mut []))? as usize;
        if needed > ceiling {
            return Err(too_large(
                op,
                format!("value needs {} bytes, limit is {}", needed, ceiling),
            ));
        }
        // A reported length no larger than the buffer that just failed is
        // stale; keep growing, but never past the ceiling.
        let next = if needed > size {
            needed
        } else {
            size.saturating_mul(2).min(ceiling)
        };
        tracing::trace!(op, from = size, to = next, "growing attribute buffer");
        size = next;
    }
}

impl<M: MountStub> MountSession<M> {
    /// Read one attribute. A missing attribute is `NotFound`.
    pub fn get_extended_attribute(&self, p: &str, name: &str) -> Result<ExtAttribute> {
        const OP: &str = "getxattr";
        let mut inner = self.lock_mounted(OP)?;
        let path = inner.resolve(p);
        let (c_path, c_name) = (cstring(OP, &path)?, cstring(OP, name)?);
        let limits = &self.config().xattr;

        let mount = inner.handle(OP)?;
        let value = read_sized(OP, limits.initial_buffer, limits.max_value_size, |buf| {
            mount.getxattr(&c_path, &c_name, buf)
        })?;
        tracing::debug!(path = %path, name, len = value.len(), "getxattr");
        Ok(ExtAttribute::new(name, value))
    }

    /// Read every attribute of a path as key/value pairs.
    ///
    /// A path with no attributes yields an empty list. A key that disappears
    /// between the name listing and its read is skipped.
    pub fn list_extended_attributes(&self, p: &str) -> Result<Vec<ExtAttribute>> {
        const OP: &str = "listxattr";
        let mut inner = self.lock_mounted(OP)?;
        let path = inner.resolve(p);
        let c_path = cstring(OP, &path)?;
        let limits = &self.config().xattr;

        let mount = inner.handle(OP)?;
        let names = read_sized(OP, limits.initial_buffer, limits.max_list_size, |buf| {
            mount.listxattr(&c_path, buf)
        })?;

        let mut attrs = Vec::new();
        for key in parse_name_list(&names) {
            let c_name = cstring("getxattr", &key)?;
            let value = match read_sized(
                "getxattr",
                limits.initial_buffer,
                limits.max_value_size,
                |buf| mount.getxattr(&c_path, &c_name, buf),
            ) {
                Ok(value) => value,
                Err(err) if err.is_not_found() => {
                    tracing::debug!(path = %path, name = %key, "attribute vanished during listing");
                    continue;
                }
                Err(err) => return Err(err),
            };
            attrs.push(ExtAttribute::new(key, value));
        }
        tracing::debug!(path = %path, count = attrs.len(), "listxattr");
        Ok(attrs)
    }

    /// Write one attribute.
    ///
    /// A value longer than `xattr.max_value_size` is rejected with `-E2BIG`
    /// without touching the library, so every stored value stays readable
    /// through [`get_extended_attribute`](Self::get_extended_attribute).
    /// In `probe` mode the attribute is looked up first and then written
    /// create-only if absent or replace-only if present; any other lookup
    /// failure aborts the write. In `upsert` mode the write carries no flag.
    pub fn set_extended_attribute(
        &self,
        p: &str,
        name: &str,
        value: impl AsRef<[u8]>,
    ) -> Result<()> {
        const OP: &str = "setxattr";
        let value = value.as_ref();
        let mut inner = self.lock_mounted(OP)?;
        let path = inner.resolve(p);
        let (c_path, c_name) = (cstring(OP, &path)?, cstring(OP, name)?);
        let limits = &self.config().xattr;
        if value.len() > limits.max_value_size {
            tracing::debug!(path = %path, name, len = value.len(), limit = limits.max_value_size, "setxattr value too large");
            return Err(CephError::invalid_argument(
                OP,
                -libc::E2BIG,
                format!("value is {} bytes, limit is {}", value.len(), limits.max_value_size),
            ));
        }

        let mount = inner.handle(OP)?;
        let flags = match limits.write_mode {
            XattrWriteMode::Upsert => XattrFlags::Upsert,
            XattrWriteMode::Probe => {
                let existing = mount.getxattr(&c_path, &c_name, &mut []);
                if existing >= 0 {
                    XattrFlags::Replace
                } else if is_missing_attribute(existing) {
                    XattrFlags::Create
                } else {
                    tracing::debug!(
                        path = %path,
                        name,
                        code = existing,
                        errno = errno_name(existing),
                        "setxattr existence check failed"
                    );
                    return Err(CephError::from_code("getxattr", existing));
                }
            }
        };

        let ret = mount.setxattr(&c_path, &c_name, value, flags);
        if ret < 0 {
            tracing::debug!(path = %path, name, ?flags, code = ret, errno = errno_name(ret), "setxattr failed");
            return Err(CephError::from_code(OP, ret));
        }
        tracing::debug!(path = %path, name, len = value.len(), ?flags, "setxattr");
        Ok(())
    }

    pub fn remove_extended_attribute(&self, p: &str, name: &str) -> Result<()> {
        const OP: &str = "removexattr";
        let mut inner = self.lock_mounted(OP)?;
        let path = inner.resolve(p);
        let (c_path, c_name) = (cstring(OP, &path)?, cstring(OP, name)?);
        check(OP, inner.handle(OP)?.removexattr(&c_path, &c_name))?;
        tracing::debug!(path = %path, name, "removexattr");
        Ok(())
    }
}
