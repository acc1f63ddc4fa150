//! # Block Store Service - Inter-Node Transfer
//!
//! Blocks leave a node as a `TransferFrame` and are committed on the receiver
//! through the regular `add` path.

use super::*;
use crate::domain::transfer::TransferFrame;
use tracing::warn;

impl<S, C> BlockStore<S, C>
where
    S: IndexSerializer,
    C: ChecksumProvider,
{
    /// Encode a block and its payload for shipment to another node.
    pub fn export_block(&self, id: &BlockId) -> Option<Vec<u8>> {
        let block = self.get(id)?;
        let payload = self.read(id)?;
        match TransferFrame::new(block, payload).encode() {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("[mv-01] Failed to encode block {}: {}", id, e);
                None
            }
        }
    }

    /// Commit a block received from another node.
    pub fn import_block(&self, frame: &[u8]) -> Option<NodeBlockRecord> {
        let frame = match TransferFrame::decode(frame) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("[mv-01] Rejected transfer frame: {}", e);
                return None;
            }
        };

        let physical = frame.block.physical();
        if physical.is_present() && physical.physical_length != frame.payload.len() as i64 {
            warn!(
                "[mv-01] Rejected block {}: frame declares {} bytes, carries {}",
                frame.block.block_id(),
                physical.physical_length,
                frame.payload.len()
            );
            return None;
        }
        self.add(frame.block.record(), &frame.payload)
    }
}
