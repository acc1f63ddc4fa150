//! # Persistence Adapters
//!
//! - `XmlDirectoryStore`: production store, one XML file per logical file
//! - `InMemoryCatalogStore`: ephemeral store for tests and desktop previews

mod directory;
mod memory;

pub use directory::XmlDirectoryStore;
pub use memory::InMemoryCatalogStore;
