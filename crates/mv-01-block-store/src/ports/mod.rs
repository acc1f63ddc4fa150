//! # Ports
//!
//! - `inbound` - the API collaborators call (`BlockStoreApi`)
//! - `outbound` - what the store needs from its host (index serializer, checksums)

pub mod inbound;
pub mod outbound;
