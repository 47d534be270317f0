//! Client-side session layer over libcephfs.
//!
//! A [`MountSession`] owns one native mount handle and exposes the
//! filesystem operations on it: lifecycle (create, configure, mount,
//! close), directory navigation and listing, extended attributes, and
//! capacity statistics. Every failure is returned as a
//! [`CephError`] carrying the raw native code and its classified kind.
//!
//! The native library is reached through [`cephfs_stubs::MountStub`]. With
//! the `native` feature, [`native::NativeConnector`] links libcephfs;
//! without it, sessions run against [`cephfs_stubs::MockCluster`].

pub mod config;
pub mod dir;
pub mod session;
mod stats;
pub mod xattr;

#[cfg(feature = "native")]
pub mod native;

pub use cephfs_stubs::{MountConnector, MountStub};
pub use cephfs_types::{CephError, ErrorKind, ExtAttribute, FsStats, Result};
pub use config::{ClientConfig, ConfigLoadError, XattrConfig, XattrWriteMode};
pub use dir::ReadDir;
pub use session::{MountSession, SessionState};

#[cfg(feature = "native")]
pub use native::{NativeConnector, NativeMount};
