//! # Ports
//!
//! - `inbound` - the API collaborators call (`MetadataCatalogApi`)
//! - `outbound` - where the catalog keeps its documents (`CatalogPersistence`)

pub mod inbound;
pub mod outbound;
