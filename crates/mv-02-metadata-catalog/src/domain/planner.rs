//! # Block Planning
//!
//! Splits a logical file of known size into block records with fresh ids.

use shared_types::{BlockId, BlockRecord, FsConfig};

/// Plan the blocks of `name` holding `total_len` bytes.
///
/// Desktop deployments never split; otherwise blocks are `block_size` long
/// with a shorter tail. A zero-length file still gets one (empty) block.
pub fn plan_blocks(name: &str, total_len: u64, config: &FsConfig) -> Vec<BlockRecord> {
    let block_size = config.block_size.max(1);
    if config.is_desktop() || total_len <= block_size {
        return vec![BlockRecord::new(name, BlockId::generate(), total_len as i64)];
    }

    let mut blocks = Vec::with_capacity(total_len.div_ceil(block_size) as usize);
    let mut remaining = total_len;
    while remaining > 0 {
        let len = remaining.min(block_size);
        blocks.push(BlockRecord::new(name, BlockId::generate(), len as i64));
        remaining -= len;
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_splits_with_tail() {
        let config = FsConfig::default().with_block_size(100);
        let blocks = plan_blocks("report1.bin", 250, &config);

        let lengths: Vec<i64> = blocks.iter().map(|b| b.logical_length()).collect();
        assert_eq!(lengths, vec![100, 100, 50]);
        assert!(blocks.iter().all(|b| b.parent_file_name() == "report1.bin"));

        let ids: HashSet<_> = blocks.iter().map(|b| b.block_id().clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| id.is_path_safe()));
    }

    #[test]
    fn test_desktop_never_splits() {
        let config = FsConfig::default().with_block_size(10).with_desktop(true);
        let blocks = plan_blocks("big.bin", 1_000, &config);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].logical_length(), 1_000);
    }

    #[test]
    fn test_empty_file_gets_one_block() {
        let blocks = plan_blocks("empty.bin", 0, &FsConfig::default());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].logical_length(), 0);
    }
}
