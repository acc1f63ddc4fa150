use crate::domain::errors::BlockStoreError;
use crate::domain::index::{IndexSnapshot, INDEX_FORMAT};
use crate::ports::outbound::IndexSerializer;

/// Default index serializer using bincode.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeIndexSerializer;

impl IndexSerializer for BincodeIndexSerializer {
    fn serialize(&self, snapshot: &IndexSnapshot) -> Result<Vec<u8>, BlockStoreError> {
        bincode::serialize(snapshot).map_err(|e| BlockStoreError::Serialization(e.to_string()))
    }

    fn deserialize(&self, data: &[u8]) -> Result<IndexSnapshot, BlockStoreError> {
        let snapshot: IndexSnapshot = bincode::deserialize(data)
            .map_err(|e| BlockStoreError::Serialization(e.to_string()))?;
        if snapshot.format != INDEX_FORMAT {
            return Err(BlockStoreError::Serialization(format!(
                "unsupported index format {}",
                snapshot.format
            )));
        }
        Ok(snapshot)
    }
}
