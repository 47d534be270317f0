//! Mount session lifecycle.
//!
//! A [`MountSession`] owns exactly one native mount handle and walks it
//! through `Created -> ConfigLoaded -> Mounted -> Closed`. All calls on one
//! session are serialized through a mutex: neither the tracked working
//! directory nor the native handle state is safe for concurrent use.
//! Independent sessions share nothing and may run in parallel.

use std::ffi::CString;
use std::fmt;
use std::thread::{self, ThreadId};

use cephfs_stubs::{MountConnector, MountStub};
use cephfs_types::error::check;
use cephfs_types::error_code::errno_name;
use cephfs_types::{path, CephError, Result};
use parking_lot::{Mutex, MutexGuard};

use crate::config::ClientConfig;

/// Lifecycle state of a [`MountSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    ConfigLoaded,
    Mounted,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "Created",
            SessionState::ConfigLoaded => "ConfigLoaded",
            SessionState::Mounted => "Mounted",
            SessionState::Closed => "Closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a path or name for the native call, rejecting interior NULs.
pub(crate) fn cstring(op: &'static str, s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| {
        CephError::invalid_argument(op, -libc::EINVAL, format!("{:?} contains a NUL byte", s))
    })
}

/// State guarded by the session mutex.
pub(crate) struct Inner<M: MountStub> {
    /// `None` once the handle has been released.
    pub(crate) mount: Option<M>,
    pub(crate) state: SessionState,
    pub(crate) cwd: String,
}

impl<M: MountStub> Inner<M> {
    /// Fail unless the session is in one of `allowed`.
    fn require(
        &self,
        op: &'static str,
        allowed: &[SessionState],
        expected: &'static str,
    ) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(CephError::ClosedSession { op });
        }
        if !allowed.contains(&self.state) {
            return Err(CephError::InvalidState {
                op,
                expected,
                actual: self.state.as_str(),
            });
        }
        Ok(())
    }

    pub(crate) fn handle(&mut self, op: &'static str) -> Result<&mut M> {
        self.mount.as_mut().ok_or(CephError::ClosedSession { op })
    }

    /// Resolve `p` against the tracked working directory.
    pub(crate) fn resolve(&self, p: &str) -> String {
        path::resolve(&self.cwd, p)
    }
}

/// A session over one native mount handle.
pub struct MountSession<M: MountStub> {
    inner: Mutex<Inner<M>>,
    /// Thread holding `inner` through an open [`ReadDir`](crate::ReadDir).
    pub(crate) lister: Mutex<Option<ThreadId>>,
    config: ClientConfig,
}

impl<M: MountStub> MountSession<M> {
    /// Allocate a native handle (`createMount`).
    pub fn create<C>(connector: &C, config: ClientConfig) -> Result<Self>
    where
        C: MountConnector<Mount = M>,
    {
        let client_id = config
            .client_id
            .as_deref()
            .map(|id| cstring("create", id))
            .transpose()?;
        let mount = connector
            .create(client_id.as_deref())
            .map_err(|code| CephError::init("create", code))?;

        tracing::info!(client_id = ?config.client_id, "created mount handle");
        Ok(Self {
            inner: Mutex::new(Inner {
                mount: Some(mount),
                state: SessionState::Created,
                cwd: "/".to_string(),
            }),
            lister: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.listing_on_this_thread() {
            // Listings are only opened on a mounted session.
            return SessionState::Mounted;
        }
        self.inner.lock().state
    }

    fn listing_on_this_thread(&self) -> bool {
        *self.lister.lock() == Some(thread::current().id())
    }

    /// Lock the session. A call made from the thread that is iterating a
    /// [`ReadDir`](crate::ReadDir) on this session fails instead of
    /// waiting on a lock it already holds.
    fn lock(&self, op: &'static str) -> Result<MutexGuard<'_, Inner<M>>> {
        if self.listing_on_this_thread() {
            tracing::debug!(op, "session call while a listing is open on this thread");
            return Err(CephError::InvalidState {
                op,
                expected: "no open listing on this thread",
                actual: "Listing",
            });
        }
        Ok(self.inner.lock())
    }

    /// Lock the session and check that it is mounted.
    pub(crate) fn lock_mounted(&self, op: &'static str) -> Result<MutexGuard<'_, Inner<M>>> {
        let inner = self.lock(op)?;
        inner.require(op, &[SessionState::Mounted], "Mounted")?;
        Ok(inner)
    }

    /// Load library configuration (`readDefaultConfigFile`).
    ///
    /// Reads `conf_file` from the session config, or the library's default
    /// search path when unset, then applies `conf_options`.
    pub fn read_default_config(&self) -> Result<()> {
        let path = self
            .config
            .conf_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        self.load_config(path.as_deref())
    }

    /// Load library configuration from an explicit file.
    pub fn read_config_file(&self, path: &str) -> Result<()> {
        self.load_config(Some(path))
    }

    fn load_config(&self, path: Option<&str>) -> Result<()> {
        const OP: &str = "conf_read_file";
        let mut inner = self.lock(OP)?;
        inner.require(
            OP,
            &[SessionState::Created, SessionState::ConfigLoaded],
            "Created or ConfigLoaded",
        )?;
        let c_path = path.map(|p| cstring(OP, p)).transpose()?;
        let options = self
            .config
            .conf_options
            .iter()
            .map(|(k, v)| Ok((cstring(OP, k)?, cstring(OP, v)?)))
            .collect::<Result<Vec<_>>>()?;

        let mount = inner.handle(OP)?;
        let ret = mount.conf_read_file(c_path.as_deref());
        if ret < 0 {
            tracing::debug!(path = ?path, code = ret, errno = errno_name(ret), "conf_read_file failed");
            return Err(CephError::config(OP, ret));
        }
        for (key, value) in &options {
            let ret = mount.conf_set(key, value);
            if ret < 0 {
                tracing::debug!(option = ?key, code = ret, "conf_set failed");
                return Err(CephError::config("conf_set", ret));
            }
        }

        inner.state = SessionState::ConfigLoaded;
        tracing::info!(path = path.unwrap_or("<default>"), "loaded client configuration");
        Ok(())
    }

    /// Set a single library configuration option.
    pub fn set_config_option(&self, key: &str, value: &str) -> Result<()> {
        const OP: &str = "conf_set";
        let mut inner = self.lock(OP)?;
        inner.require(
            OP,
            &[SessionState::Created, SessionState::ConfigLoaded],
            "Created or ConfigLoaded",
        )?;
        let (c_key, c_value) = (cstring(OP, key)?, cstring(OP, value)?);
        let ret = inner.handle(OP)?.conf_set(&c_key, &c_value);
        if ret < 0 {
            return Err(CephError::config(OP, ret));
        }
        tracing::debug!(key, value, "set config option");
        Ok(())
    }

    /// Mount the filesystem. A failed mount leaves the session in
    /// `ConfigLoaded`; it is not retried.
    pub fn mount(&self) -> Result<()> {
        const OP: &str = "mount";
        let mut inner = self.lock(OP)?;
        inner.require(OP, &[SessionState::ConfigLoaded], "ConfigLoaded")?;
        let root = self
            .config
            .mount_root
            .as_deref()
            .map(|r| cstring(OP, r))
            .transpose()?;

        let ret = inner.handle(OP)?.mount(root.as_deref());
        if ret < 0 {
            tracing::warn!(
                root = ?self.config.mount_root,
                code = ret,
                errno = errno_name(ret),
                "mount failed"
            );
            return Err(CephError::mount(OP, ret));
        }

        inner.state = SessionState::Mounted;
        inner.cwd = "/".to_string();
        tracing::info!(root = self.config.mount_root.as_deref().unwrap_or("/"), "mounted");
        Ok(())
    }

    /// Flush pending state to the cluster.
    pub fn sync_fs(&self) -> Result<()> {
        const OP: &str = "sync_fs";
        let mut inner = self.lock_mounted(OP)?;
        let ret = inner.handle(OP)?.sync_fs();
        if ret < 0 {
            return Err(CephError::Io { op: OP, code: ret });
        }
        Ok(())
    }

    /// The tracked working directory.
    pub fn current_directory(&self) -> Result<String> {
        let inner = self.lock_mounted("getcwd")?;
        Ok(inner.cwd.clone())
    }

    /// Change the tracked working directory after the native library
    /// confirms the target exists. State is unchanged on failure.
    pub fn change_directory(&self, p: &str) -> Result<()> {
        const OP: &str = "chdir";
        let mut inner = self.lock_mounted(OP)?;
        let target = inner.resolve(p);
        let c_path = cstring(OP, &target)?;
        check(OP, inner.handle(OP)?.chdir(&c_path))?;
        tracing::debug!(from = %inner.cwd, to = %target, "chdir");
        inner.cwd = target;
        Ok(())
    }

    pub fn make_directory(&self, p: &str, mode: u32) -> Result<()> {
        const OP: &str = "mkdir";
        let mut inner = self.lock_mounted(OP)?;
        let target = inner.resolve(p);
        let c_path = cstring(OP, &target)?;
        check(OP, inner.handle(OP)?.mkdir(&c_path, mode))?;
        tracing::debug!(path = %target, mode = %format!("{:o}", mode), "mkdir");
        Ok(())
    }

    pub fn remove_directory(&self, p: &str) -> Result<()> {
        const OP: &str = "rmdir";
        let mut inner = self.lock_mounted(OP)?;
        let target = inner.resolve(p);
        let c_path = cstring(OP, &target)?;
        check(OP, inner.handle(OP)?.rmdir(&c_path))?;
        tracing::debug!(path = %target, "rmdir");
        Ok(())
    }

    /// Atomically rename `from` to `to`.
    ///
    /// If the tracked working directory lies under `from` it follows the
    /// rename.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        const OP: &str = "rename";
        let mut inner = self.lock_mounted(OP)?;
        let (src, dst) = (inner.resolve(from), inner.resolve(to));
        let (c_src, c_dst) = (cstring(OP, &src)?, cstring(OP, &dst)?);
        check(OP, inner.handle(OP)?.rename(&c_src, &c_dst))?;

        if inner.cwd == src || inner.cwd.starts_with(&format!("{}/", src)) {
            let moved = format!("{}{}", dst, &inner.cwd[src.len()..]);
            inner.cwd = moved;
        }
        tracing::debug!(from = %src, to = %dst, "rename");
        Ok(())
    }

    /// Release the native handle. Calling `close` again is a no-op; every
    /// other operation fails with `ClosedSession` afterwards.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock("close")?;
        if inner.state == SessionState::Closed {
            return Ok(());
        }
        inner.state = SessionState::Closed;
        let ret = match inner.mount.take() {
            Some(mut mount) => mount.release(),
            None => 0,
        };
        if ret < 0 {
            tracing::warn!(code = ret, errno = errno_name(ret), "releasing mount handle failed");
            return Err(CephError::Io { op: "close", code: ret });
        }
        tracing::info!("closed mount session");
        Ok(())
    }
}

impl<M: MountStub> Drop for MountSession<M> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl<M: MountStub> fmt::Debug for MountSession<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(inner) => f
                .debug_struct("MountSession")
                .field("state", &inner.state)
                .field("cwd", &inner.cwd)
                .finish(),
            None => f.debug_struct("MountSession").finish_non_exhaustive(),
        }
    }
}
