//! Raw bindings to `libcephfs`.
//!
//! Declarations follow `cephfs/libcephfs.h`. Every function returns `0` or
//! a non-negative count on success and a negated errno on failure unless
//! noted otherwise. Nothing here is safe to call directly; the
//! `cephfs-client` crate wraps these behind an owning handle.

#![allow(non_camel_case_types)]

use libc::{c_char, c_int, c_void, dirent, mode_t, size_t, statvfs};

/// Opaque mount handle (`struct ceph_mount_info`).
#[repr(C)]
pub struct ceph_mount_info {
    _private: [u8; 0],
}

/// Opaque directory cursor (`struct ceph_dir_result`).
#[repr(C)]
pub struct ceph_dir_result {
    _private: [u8; 0],
}

/// `setxattr` flag: fail if the attribute already exists.
pub const CEPH_XATTR_CREATE: c_int = 1;

/// `setxattr` flag: fail if the attribute does not exist.
pub const CEPH_XATTR_REPLACE: c_int = 2;

#[link(name = "cephfs")]
extern "C" {
    /// Allocate a mount handle. `id` may be null for the default client id.
    pub fn ceph_create(cmount: *mut *mut ceph_mount_info, id: *const c_char) -> c_int;

    /// Read configuration; a null `path_list` searches the default locations.
    pub fn ceph_conf_read_file(cmount: *mut ceph_mount_info, path_list: *const c_char) -> c_int;

    pub fn ceph_conf_set(
        cmount: *mut ceph_mount_info,
        option: *const c_char,
        value: *const c_char,
    ) -> c_int;

    /// Mount the filesystem. A null `root` mounts `/`.
    pub fn ceph_mount(cmount: *mut ceph_mount_info, root: *const c_char) -> c_int;

    /// Unmount if needed and free the handle. The handle is invalid afterwards.
    pub fn ceph_shutdown(cmount: *mut ceph_mount_info);

    pub fn ceph_sync_fs(cmount: *mut ceph_mount_info) -> c_int;

    pub fn ceph_chdir(cmount: *mut ceph_mount_info, path: *const c_char) -> c_int;

    pub fn ceph_mkdir(cmount: *mut ceph_mount_info, path: *const c_char, mode: mode_t) -> c_int;

    pub fn ceph_rmdir(cmount: *mut ceph_mount_info, path: *const c_char) -> c_int;

    pub fn ceph_rename(
        cmount: *mut ceph_mount_info,
        from: *const c_char,
        to: *const c_char,
    ) -> c_int;

    pub fn ceph_opendir(
        cmount: *mut ceph_mount_info,
        name: *const c_char,
        dirpp: *mut *mut ceph_dir_result,
    ) -> c_int;

    pub fn ceph_closedir(cmount: *mut ceph_mount_info, dirp: *mut ceph_dir_result) -> c_int;

    /// Read the next entry into `de`. Returns 1 for an entry, 0 at the end.
    pub fn ceph_readdir_r(
        cmount: *mut ceph_mount_info,
        dirp: *mut ceph_dir_result,
        de: *mut dirent,
    ) -> c_int;

    pub fn ceph_statfs(
        cmount: *mut ceph_mount_info,
        path: *const c_char,
        stbuf: *mut statvfs,
    ) -> c_int;

    /// Returns the value length. With `size == 0` only the length is reported;
    /// a non-zero `size` smaller than the value fails with `-ERANGE`.
    pub fn ceph_getxattr(
        cmount: *mut ceph_mount_info,
        path: *const c_char,
        name: *const c_char,
        value: *mut c_void,
        size: size_t,
    ) -> c_int;

    /// Same length protocol as `ceph_getxattr`, filling NUL-separated names.
    pub fn ceph_listxattr(
        cmount: *mut ceph_mount_info,
        path: *const c_char,
        list: *mut c_char,
        size: size_t,
    ) -> c_int;

    pub fn ceph_setxattr(
        cmount: *mut ceph_mount_info,
        path: *const c_char,
        name: *const c_char,
        value: *const c_void,
        size: size_t,
        flags: c_int,
    ) -> c_int;

    pub fn ceph_removexattr(
        cmount: *mut ceph_mount_info,
        path: *const c_char,
        name: *const c_char,
    ) -> c_int;
}
