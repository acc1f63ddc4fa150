//! # Adapters
//!
//! - `xml` - `<XFile>`/`<XBlock>` document codec
//! - `persistence` - directory-backed and in-memory document stores

pub mod persistence;
pub mod xml;

pub use persistence::{InMemoryCatalogStore, XmlDirectoryStore};
