//! libcephfs-backed mount handles.
//!
//! Only compiled with the `native` feature, which links `libcephfs`.

use std::ffi::CStr;
use std::ptr;

use cephfs_stubs::{MountConnector, MountStub};
use cephfs_sys as sys;
use cephfs_types::{native_code_t, RawStatVfs, Result, XattrFlags};

use crate::config::ClientConfig;
use crate::session::MountSession;

const _: () = assert!(
    XattrFlags::Upsert.as_raw() == 0
        && XattrFlags::Create.as_raw() == sys::CEPH_XATTR_CREATE
        && XattrFlags::Replace.as_raw() == sys::CEPH_XATTR_REPLACE
);

fn opt_ptr(s: Option<&CStr>) -> *const libc::c_char {
    s.map_or(ptr::null(), CStr::as_ptr)
}

/// Allocates handles with `ceph_create`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConnector;

impl MountConnector for NativeConnector {
    type Mount = NativeMount;

    fn create(&self, client_id: Option<&CStr>) -> std::result::Result<NativeMount, native_code_t> {
        let mut cmount: *mut sys::ceph_mount_info = ptr::null_mut();
        // SAFETY: `cmount` is a valid out-pointer and `client_id` outlives the call.
        let ret = unsafe { sys::ceph_create(&mut cmount, opt_ptr(client_id)) };
        if ret < 0 {
            return Err(ret);
        }
        if cmount.is_null() {
            return Err(-libc::ENOMEM);
        }
        Ok(NativeMount { cmount })
    }
}

/// Owning wrapper around a `ceph_mount_info` pointer.
///
/// The pointer is nulled by [`MountStub::release`]; every call on a
/// released handle returns `-ENOTCONN` without touching the library.
#[derive(Debug)]
pub struct NativeMount {
    cmount: *mut sys::ceph_mount_info,
}

// SAFETY: a mount handle may move between threads; the session mutex
// guarantees it is never used from two threads at once.
unsafe impl Send for NativeMount {}

/// An open `ceph_dir_result` cursor.
#[derive(Debug)]
pub struct NativeDir {
    dirp: *mut sys::ceph_dir_result,
}

// SAFETY: cursors are only used while the owning session's lock is held.
unsafe impl Send for NativeDir {}

macro_rules! with_handle {
    ($self:ident, |$cm:ident| $body:expr) => {{
        if $self.cmount.is_null() {
            return -libc::ENOTCONN;
        }
        let $cm = $self.cmount;
        // SAFETY: the handle is live (non-null) and all pointer arguments
        // are borrowed for the duration of the call.
        unsafe { $body }
    }};
}

impl MountStub for NativeMount {
    type Dir = NativeDir;

    fn conf_read_file(&mut self, path: Option<&CStr>) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_conf_read_file(cm, opt_ptr(path)))
    }

    fn conf_set(&mut self, option: &CStr, value: &CStr) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_conf_set(cm, option.as_ptr(), value.as_ptr()))
    }

    fn mount(&mut self, root: Option<&CStr>) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_mount(cm, opt_ptr(root)))
    }

    fn sync_fs(&mut self) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_sync_fs(cm))
    }

    fn chdir(&mut self, path: &CStr) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_chdir(cm, path.as_ptr()))
    }

    fn mkdir(&mut self, path: &CStr, mode: u32) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_mkdir(cm, path.as_ptr(), mode as libc::mode_t))
    }

    fn rmdir(&mut self, path: &CStr) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_rmdir(cm, path.as_ptr()))
    }

    fn rename(&mut self, from: &CStr, to: &CStr) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_rename(cm, from.as_ptr(), to.as_ptr()))
    }

    fn opendir(&mut self, path: &CStr) -> std::result::Result<NativeDir, native_code_t> {
        if self.cmount.is_null() {
            return Err(-libc::ENOTCONN);
        }
        let mut dirp: *mut sys::ceph_dir_result = ptr::null_mut();
        // SAFETY: live handle, valid out-pointer.
        let ret = unsafe { sys::ceph_opendir(self.cmount, path.as_ptr(), &mut dirp) };
        if ret < 0 {
            return Err(ret);
        }
        if dirp.is_null() {
            return Err(-libc::EIO);
        }
        Ok(NativeDir { dirp })
    }

    fn readdir(&mut self, dir: &mut NativeDir, name: &mut Vec<u8>) -> native_code_t {
        if dir.dirp.is_null() {
            return -libc::EBADF;
        }
        // SAFETY: dirent is plain old data; all-zero is a valid value.
        let mut de: libc::dirent = unsafe { std::mem::zeroed() };
        let ret = with_handle!(self, |cm| sys::ceph_readdir_r(cm, dir.dirp, &mut de));
        if ret == 1 {
            // SAFETY: the library NUL-terminates d_name.
            let entry = unsafe { CStr::from_ptr(de.d_name.as_ptr()) };
            name.clear();
            name.extend_from_slice(entry.to_bytes());
        }
        ret
    }

    fn closedir(&mut self, dir: NativeDir) -> native_code_t {
        if dir.dirp.is_null() {
            return 0;
        }
        with_handle!(self, |cm| sys::ceph_closedir(cm, dir.dirp))
    }

    fn statfs(&mut self, path: &CStr, out: &mut RawStatVfs) -> native_code_t {
        // SAFETY: statvfs is plain old data; all-zero is a valid value.
        let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
        let ret = with_handle!(self, |cm| sys::ceph_statfs(cm, path.as_ptr(), &mut st));
        if ret < 0 {
            return ret;
        }
        *out = RawStatVfs {
            bsize: st.f_bsize as u64,
            frsize: st.f_frsize as u64,
            blocks: st.f_blocks as u64,
            bfree: st.f_bfree as u64,
            bavail: st.f_bavail as u64,
            files: st.f_files as u64,
            ffree: st.f_ffree as u64,
            favail: st.f_favail as u64,
            fsid: st.f_fsid as u64,
            flag: st.f_flag as u64,
            namemax: st.f_namemax as u64,
        };
        ret
    }

    fn getxattr(&mut self, path: &CStr, name: &CStr, buf: &mut [u8]) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_getxattr(
            cm,
            path.as_ptr(),
            name.as_ptr(),
            buf.as_mut_ptr().cast(),
            buf.len()
        ))
    }

    fn listxattr(&mut self, path: &CStr, buf: &mut [u8]) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_listxattr(
            cm,
            path.as_ptr(),
            buf.as_mut_ptr().cast(),
            buf.len()
        ))
    }

    fn setxattr(
        &mut self,
        path: &CStr,
        name: &CStr,
        value: &[u8],
        flags: XattrFlags,
    ) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_setxattr(
            cm,
            path.as_ptr(),
            name.as_ptr(),
            value.as_ptr().cast(),
            value.len(),
            flags.as_raw()
        ))
    }

    fn removexattr(&mut self, path: &CStr, name: &CStr) -> native_code_t {
        with_handle!(self, |cm| sys::ceph_removexattr(cm, path.as_ptr(), name.as_ptr()))
    }

    fn release(&mut self) -> native_code_t {
        let cmount = std::mem::replace(&mut self.cmount, ptr::null_mut());
        if cmount.is_null() {
            return 0;
        }
        // SAFETY: the handle is live and is never used again after this call.
        unsafe { sys::ceph_shutdown(cmount) };
        0
    }
}

impl Drop for NativeMount {
    fn drop(&mut self) {
        self.release();
    }
}

/// Create a session against the cluster described by the local ceph config.
pub fn connect(config: ClientConfig) -> Result<MountSession<NativeMount>> {
    MountSession::create(&NativeConnector, config)
}

/// Create, configure and mount a session in one step.
pub fn connect_and_mount(config: ClientConfig) -> Result<MountSession<NativeMount>> {
    let session = connect(config)?;
    session.read_default_config()?;
    session.mount()?;
    Ok(session)
}
