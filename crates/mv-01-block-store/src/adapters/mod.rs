//! # Adapters
//!
//! - `serializer` - bincode index serializer
//! - `infra` - crc32 checksum provider

pub mod infra;
pub mod serializer;

pub use infra::Crc32Checksum;
pub use serializer::BincodeIndexSerializer;
