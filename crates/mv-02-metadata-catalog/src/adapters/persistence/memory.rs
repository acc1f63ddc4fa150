use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::adapters::xml;
use crate::domain::document::FileDocument;
use crate::domain::errors::CatalogError;
use crate::ports::outbound::{CatalogPersistence, LoadedDocuments};

/// In-memory document store for unit tests.
///
/// Documents are kept in their XML form so the codec is exercised exactly as
/// with `XmlDirectoryStore`.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    documents: Mutex<BTreeMap<String, String>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text under `name`, bypassing the encoder.
    pub fn insert_raw(&self, name: &str, text: &str) {
        self.documents.lock().insert(name.to_string(), text.to_string());
    }

    pub fn names(&self) -> Vec<String> {
        self.documents.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}

impl CatalogPersistence for InMemoryCatalogStore {
    fn load_all(&self) -> Result<LoadedDocuments, CatalogError> {
        let documents = self.documents.lock();
        let mut loaded = LoadedDocuments::default();
        for (name, text) in documents.iter() {
            match xml::decode(text) {
                Ok(doc) => loaded.documents.push(doc),
                Err(e) => loaded.corrupt.push(CatalogError::corrupt(name.clone(), e)),
            }
        }
        Ok(loaded)
    }

    fn store(&self, doc: &FileDocument) -> Result<(), CatalogError> {
        let text = xml::encode(doc).map_err(|e| CatalogError::corrupt(doc.name.clone(), e))?;
        self.documents.lock().insert(doc.name.clone(), text);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), CatalogError> {
        self.documents.lock().remove(name);
        Ok(())
    }
}
