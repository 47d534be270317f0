use cephfs_stubs::MountStub;
use cephfs_types::error::check;
use cephfs_types::{FsStats, RawStatVfs, Result};

use crate::session::{cstring, MountSession};

impl<M: MountStub> MountSession<M> {
    /// Capacity statistics for the mounted filesystem, taken at its root.
    ///
    /// Either every field is filled from one native call or an error is
    /// returned.
    pub fn get_fs_stats(&self) -> Result<FsStats> {
        const OP: &str = "statfs";
        let mut inner = self.lock_mounted(OP)?;
        let c_root = cstring(OP, "/")?;
        let mut raw = RawStatVfs::default();
        check(OP, inner.handle(OP)?.statfs(&c_root, &mut raw))?;

        let stats = FsStats::from_raw(&raw);
        tracing::debug!(
            total_kb = stats.total_kb,
            used_kb = stats.used_kb,
            available_kb = stats.available_kb,
            "statfs"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientConfig;
    use cephfs_stubs::{MockCluster, MockMount, MockOp};
    use cephfs_types::ErrorKind;

    fn mounted(cluster: &MockCluster) -> MountSession<MockMount> {
        let session = MountSession::create(cluster, ClientConfig::default()).unwrap();
        session.read_default_config().unwrap();
        session.mount().unwrap();
        session
    }

    #[test]
    fn test_fs_stats_default_cluster() {
        let cluster = MockCluster::new();
        let session = mounted(&cluster);
        let stats = session.get_fs_stats().unwrap();
        // 1024 blocks of 4 MiB, 768 free.
        assert_eq!(stats.block_size_kb, 4096);
        assert_eq!(stats.fragment_size_kb, 4096);
        assert_eq!(stats.total_kb, 1024 * 4096);
        assert_eq!(stats.available_kb, 768 * 4096);
        assert_eq!(stats.used_kb, 256 * 4096);
        assert_eq!(stats.fs_id, 0xcef5);
        assert_eq!(stats.max_file_name_length, 255);
    }

    #[test]
    fn test_fs_stats_no_bit_conversion() {
        let cluster = MockCluster::new();
        cluster.set_statfs(RawStatVfs {
            bsize: 1024,
            frsize: 1024,
            blocks: 100,
            bfree: 40,
            ..Default::default()
        });
        let session = mounted(&cluster);
        let stats = session.get_fs_stats().unwrap();
        assert_eq!(stats.total_kb, 100);
        assert_eq!(stats.available_kb, 40);
        assert_eq!(stats.used_kb, 60);
    }

    #[test]
    fn test_fs_stats_used_plus_available_is_total() {
        let cluster = MockCluster::new();
        for (bsize, frsize, blocks, bfree) in [
            (4096u64, 4096u64, 10u64, 3u64),
            (1 << 22, 1 << 20, 500, 499),
            (8192, 4096, 10, 10),
            (512, 512, 1, 0),
            (u64::MAX, u64::MAX, u64::MAX, u64::MAX),
        ] {
            cluster.set_statfs(RawStatVfs {
                bsize,
                frsize,
                blocks,
                bfree,
                ..Default::default()
            });
            let session = mounted(&cluster);
            let stats = session.get_fs_stats().unwrap();
            assert_eq!(stats.used_kb + stats.available_kb, stats.total_kb);
        }
    }

    #[test]
    fn test_fs_stats_failure() {
        let cluster = MockCluster::new();
        let session = mounted(&cluster);
        cluster.fail_next(MockOp::Statfs, -libc::EIO);
        let err = session.get_fs_stats().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.op(), "statfs");
    }

    #[test]
    fn test_fs_stats_before_mount() {
        let cluster = MockCluster::new();
        let session = MountSession::create(&cluster, ClientConfig::default()).unwrap();
        assert_eq!(session.get_fs_stats().unwrap_err().kind(), ErrorKind::InvalidState);
    }
}
