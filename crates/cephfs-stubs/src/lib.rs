//! The native call surface of the session layer, expressed as traits.
//!
//! [`MountStub`] mirrors the libcephfs calls the session layer issues,
//! keeping their raw return-code conventions. The real implementation
//! (backed by `cephfs-sys`) lives in `cephfs-client`. This crate also
//! provides [`MockCluster`], an in-memory implementation that reproduces
//! the native return codes, for testing without a running cluster.

pub mod mount_stub;
pub mod mock;

pub use mock::{MockCluster, MockDir, MockMount, MockOp};
pub use mount_stub::{MountConnector, MountStub};
