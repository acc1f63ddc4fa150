//! Directory-backed document store.
//!
//! ```text
//! catalog_dir/
//! ├── 7265706f7274312e62696e.xml    hex("report1.bin")
//! └── ...
//! ```
//!
//! File names are the hex encoding of the logical name, so any name (slashes,
//! colons from org qualification) maps to one flat, portable file. Writes go
//! through a synced scratch file and a rename.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::adapters::xml;
use crate::domain::document::FileDocument;
use crate::domain::errors::CatalogError;
use crate::ports::outbound::{CatalogPersistence, LoadedDocuments};

const DOC_EXT: &str = "xml";

/// One XML document per logical file under a single directory.
#[derive(Debug, Clone)]
pub struct XmlDirectoryStore {
    dir: PathBuf,
}

impl XmlDirectoryStore {
    /// Open the store, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CatalogError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Document path of a logical file.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", hex::encode(name), DOC_EXT))
    }

    fn read_document(path: &Path) -> Result<FileDocument, CatalogError> {
        let label = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| CatalogError::CorruptCatalog {
            document: label.clone(),
            message: e.to_string(),
        })?;
        let doc = xml::decode(&text).map_err(|e| CatalogError::corrupt(label.clone(), e))?;

        let expected = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if hex::encode(&doc.name) != expected {
            return Err(CatalogError::CorruptCatalog {
                document: label,
                message: format!("document names `{}` but is stored under another name", doc.name),
            });
        }
        Ok(doc)
    }
}

impl CatalogPersistence for XmlDirectoryStore {
    fn load_all(&self) -> Result<LoadedDocuments, CatalogError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| CatalogError::io(&self.dir, e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == DOC_EXT))
            .collect();
        paths.sort();

        let mut loaded = LoadedDocuments::default();
        for path in paths {
            match Self::read_document(&path) {
                Ok(doc) => loaded.documents.push(doc),
                Err(e) => loaded.corrupt.push(e),
            }
        }
        debug!(
            "[mv-02] Loaded {} catalog documents from {} ({} unreadable)",
            loaded.documents.len(),
            self.dir.display(),
            loaded.corrupt.len()
        );
        Ok(loaded)
    }

    fn store(&self, doc: &FileDocument) -> Result<(), CatalogError> {
        let text = xml::encode(doc).map_err(|e| CatalogError::corrupt(doc.name.clone(), e))?;
        let path = self.path_for(&doc.name);
        let temp = path.with_extension("xml.tmp");

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&temp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp, &path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&temp);
            CatalogError::io(&path, e)
        })
    }

    fn delete(&self, name: &str) -> Result<(), CatalogError> {
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CatalogError::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::BlockDocument;
    use shared_types::{BlockRecord, BlockStats};
    use tempfile::TempDir;

    fn doc(name: &str) -> FileDocument {
        FileDocument {
            name: name.to_string(),
            version: 1,
            last_modified: 42,
            blocks: vec![BlockDocument {
                record: BlockRecord::new(name, "b1", 8),
                stats: BlockStats::default(),
            }],
        }
    }

    #[test]
    fn test_store_load_delete() {
        let dir = TempDir::new().unwrap();
        let store = XmlDirectoryStore::new(dir.path().join("catalog")).unwrap();

        store.store(&doc("acme:reports/q1.bin")).unwrap();
        store.store(&doc("report1.bin")).unwrap();
        assert!(store.path_for("report1.bin").exists());

        let loaded = store.load_all().unwrap();
        assert!(loaded.corrupt.is_empty());
        let mut names: Vec<String> = loaded.documents.into_iter().map(|d| d.name).collect();
        names.sort();
        assert_eq!(names, vec!["acme:reports/q1.bin", "report1.bin"]);

        store.delete("report1.bin").unwrap();
        store.delete("report1.bin").unwrap();
        assert_eq!(store.load_all().unwrap().documents.len(), 1);
    }

    #[test]
    fn test_corrupt_document_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let store = XmlDirectoryStore::new(dir.path()).unwrap();
        store.store(&doc("good.bin")).unwrap();
        fs::write(store.path_for("bad.bin"), "<XFile name=").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.documents.len(), 1);
        assert_eq!(loaded.corrupt.len(), 1);
        assert!(matches!(loaded.corrupt[0], CatalogError::CorruptCatalog { .. }));
    }

    #[test]
    fn test_misfiled_document_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = XmlDirectoryStore::new(dir.path()).unwrap();
        store.store(&doc("a.bin")).unwrap();
        fs::rename(store.path_for("a.bin"), store.path_for("b.bin")).unwrap();

        let loaded = store.load_all().unwrap();
        assert!(loaded.documents.is_empty());
        assert_eq!(loaded.corrupt.len(), 1);
    }
}
