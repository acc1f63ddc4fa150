//! # Outbound Ports (Driven Ports)
//!
//! Document storage the catalog requires from its host.

use crate::domain::document::FileDocument;
use crate::domain::errors::CatalogError;

/// Result of loading every persisted document.
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<FileDocument>,
    /// Documents that could not be decoded; each is skipped.
    pub corrupt: Vec<CatalogError>,
}

/// One document per logical file, keyed by file name.
pub trait CatalogPersistence: Send + Sync {
    fn load_all(&self) -> Result<LoadedDocuments, CatalogError>;

    /// Create or replace the document of `doc.name`.
    fn store(&self, doc: &FileDocument) -> Result<(), CatalogError>;

    /// Delete the document of `name`; absent documents are not an error.
    fn delete(&self, name: &str) -> Result<(), CatalogError>;
}

impl<T> CatalogPersistence for std::sync::Arc<T>
where
    T: CatalogPersistence + ?Sized,
{
    fn load_all(&self) -> Result<LoadedDocuments, CatalogError> {
        (**self).load_all()
    }

    fn store(&self, doc: &FileDocument) -> Result<(), CatalogError> {
        (**self).store(doc)
    }

    fn delete(&self, name: &str) -> Result<(), CatalogError> {
        (**self).delete(name)
    }
}
