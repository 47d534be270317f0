//! Filesystem statistics.
//!
//! [`RawStatVfs`] carries the statvfs fields as reported by the native
//! library; [`FsStats`] is the normalized record handed to callers.

use serde::{Deserialize, Serialize};

/// Raw statvfs fields, widened to `u64`.
///
/// `bsize` and `frsize` are in bytes; the block counts are in units of
/// `frsize` (`blocks`) and `bsize` (`bfree`, `bavail`) respectively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatVfs {
    pub bsize: u64,
    pub frsize: u64,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub favail: u64,
    pub fsid: u64,
    pub flag: u64,
    pub namemax: u64,
}

/// Normalized filesystem statistics, sizes in kilobytes.
///
/// `used_kb` is derived as `total_kb - available_kb` and never read from
/// the native layer, so `used_kb + available_kb == total_kb` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsStats {
    pub fs_id: u64,
    pub max_file_name_length: u64,
    pub flags: u64,
    pub block_size_kb: u64,
    pub fragment_size_kb: u64,
    pub total_kb: u64,
    pub used_kb: u64,
    pub available_kb: u64,
}

/// Convert a byte count to kilobytes.
#[inline]
pub fn bytes_to_kb(bytes: u64) -> u64 {
    bytes / 1024
}

impl FsStats {
    pub fn from_raw(raw: &RawStatVfs) -> Self {
        let block_size_kb = bytes_to_kb(raw.bsize);
        let fragment_size_kb = bytes_to_kb(raw.frsize);

        let total_kb = raw.blocks.saturating_mul(fragment_size_kb);
        // bfree is counted in bsize units; clamp so the derived used never underflows.
        let available_kb = raw.bfree.saturating_mul(block_size_kb).min(total_kb);

        Self {
            fs_id: raw.fsid,
            max_file_name_length: raw.namemax,
            flags: raw.flag,
            block_size_kb,
            fragment_size_kb,
            total_kb,
            used_kb: total_kb - available_kb,
            available_kb,
        }
    }

    /// Fraction of capacity in use, in `[0.0, 1.0]`.
    pub fn usage_ratio(&self) -> f64 {
        if self.total_kb == 0 {
            0.0
        } else {
            self.used_kb as f64 / self.total_kb as f64
        }
    }
}

impl From<RawStatVfs> for FsStats {
    fn from(raw: RawStatVfs) -> Self {
        FsStats::from_raw(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_4m(blocks: u64, bfree: u64) -> RawStatVfs {
        RawStatVfs {
            bsize: 4 << 20,
            frsize: 4 << 20,
            blocks,
            bfree,
            bavail: bfree,
            fsid: 42,
            flag: 0,
            namemax: 255,
            ..Default::default()
        }
    }

    #[test]
    fn test_from_raw_basic() {
        let stats = FsStats::from_raw(&raw_4m(1000, 250));
        assert_eq!(stats.block_size_kb, 4096);
        assert_eq!(stats.fragment_size_kb, 4096);
        assert_eq!(stats.total_kb, 1000 * 4096);
        assert_eq!(stats.available_kb, 250 * 4096);
        assert_eq!(stats.used_kb, 750 * 4096);
        assert_eq!(stats.fs_id, 42);
        assert_eq!(stats.max_file_name_length, 255);
    }

    #[test]
    fn test_kb_is_bytes_over_1024() {
        let raw = RawStatVfs {
            bsize: 8192,
            frsize: 8192,
            blocks: 10,
            bfree: 4,
            ..Default::default()
        };
        let stats = FsStats::from_raw(&raw);
        assert_eq!(stats.block_size_kb, 8);
        assert_eq!(stats.total_kb, 80);
        assert_eq!(stats.available_kb, 32);
    }

    #[test]
    fn test_used_plus_available_is_total() {
        for (bsize, frsize, blocks, bfree) in [
            (4096u64, 4096u64, 0u64, 0u64),
            (4096, 1024, 100, 90),
            (1 << 22, 1 << 22, u64::MAX / 2, 7),
            (1 << 20, 4096, 10, 10),
        ] {
            let raw = RawStatVfs {
                bsize,
                frsize,
                blocks,
                bfree,
                ..Default::default()
            };
            let stats = FsStats::from_raw(&raw);
            assert_eq!(stats.used_kb + stats.available_kb, stats.total_kb);
        }
    }

    #[test]
    fn test_sub_kilobyte_blocks() {
        let raw = RawStatVfs {
            bsize: 512,
            frsize: 512,
            blocks: 100,
            bfree: 50,
            ..Default::default()
        };
        let stats = FsStats::from_raw(&raw);
        assert_eq!(stats.total_kb, 0);
        assert_eq!(stats.used_kb, 0);
        assert_eq!(stats.usage_ratio(), 0.0);
    }

    #[test]
    fn test_usage_ratio() {
        let stats = FsStats::from_raw(&raw_4m(4, 1));
        assert!((stats.usage_ratio() - 0.75).abs() < f64::EPSILON);
    }
}
