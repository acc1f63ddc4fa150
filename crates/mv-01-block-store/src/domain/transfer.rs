//! # Transfer Frame
//!
//! A block travelling between nodes: the record in wire form followed by its
//! length-prefixed payload.
//!
//! ```text
//! frame := RecordVariant::WithPhysical  payload_len:i64  payload[payload_len]
//! ```

use shared_types::{CodecError, NodeBlockRecord, RecordVariant, WireFormat};
use std::io::Read;

/// Largest payload accepted in a single frame.
pub const MAX_FRAME_PAYLOAD: usize = 1 << 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFrame {
    pub block: NodeBlockRecord,
    pub payload: Vec<u8>,
}

impl TransferFrame {
    pub fn new(block: NodeBlockRecord, payload: Vec<u8>) -> Self {
        Self { block, payload }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = RecordVariant::WithPhysical(self.block.clone()).to_wire()?;
        buf.extend_from_slice(&(self.payload.len() as i64).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Decode a frame. Any record shape is accepted; only its logical part and
    /// physical length (when present) are kept.
    pub fn decode(mut bytes: &[u8]) -> Result<Self, CodecError> {
        let variant = RecordVariant::read_wire(&mut bytes)?;
        let block = match variant {
            RecordVariant::WithPhysical(block) => block,
            other => NodeBlockRecord::unbacked(other.into_logical()),
        };

        let mut len = [0u8; 8];
        bytes.read_exact(&mut len)?;
        let len = i64::from_be_bytes(len);
        if len < 0 || len as usize > MAX_FRAME_PAYLOAD {
            return Err(CodecError::FieldTooLong {
                length: len.max(0) as usize,
                limit: MAX_FRAME_PAYLOAD,
            });
        }
        let mut payload = vec![0u8; len as usize];
        bytes.read_exact(&mut payload)?;
        Ok(Self { block, payload })
    }
}
