//! Global block-id ownership: which logical file each block belongs to.

use shared_types::BlockId;
use std::collections::{HashMap, HashSet};

use super::errors::CatalogError;

#[derive(Debug, Default)]
pub(crate) struct BlockOwners {
    owner: HashMap<BlockId, String>,
}

impl BlockOwners {
    /// Claim unowned ids for `file`. Nothing is claimed if any id is already
    /// owned (by any file) or repeated.
    pub(crate) fn claim(&mut self, ids: &[BlockId], file: &str) -> Result<(), CatalogError> {
        self.check(ids, |_| false)?;
        self.assign(ids, file);
        Ok(())
    }

    /// Make `ids` the complete block set of `file`: ids may be unowned or
    /// already owned by `file`; ids of `file` not listed are released.
    pub(crate) fn replace_file(&mut self, ids: &[BlockId], file: &str) -> Result<(), CatalogError> {
        self.check(ids, |current| current == file)?;
        self.release_file(file);
        self.assign(ids, file);
        Ok(())
    }

    fn check(&self, ids: &[BlockId], reusable: impl Fn(&str) -> bool) -> Result<(), CatalogError> {
        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id) {
                return Err(CatalogError::DuplicateBlock(id.clone()));
            }
            if let Some(current) = self.owner.get(id) {
                if !reusable(current.as_str()) {
                    return Err(CatalogError::DuplicateBlock(id.clone()));
                }
            }
        }
        Ok(())
    }

    fn assign(&mut self, ids: &[BlockId], file: &str) {
        for id in ids {
            self.owner.insert(id.clone(), file.to_string());
        }
    }

    pub(crate) fn reassign(&mut self, ids: &[BlockId], file: &str) {
        self.assign(ids, file);
    }

    pub(crate) fn release(&mut self, ids: &[BlockId]) {
        for id in ids {
            self.owner.remove(id);
        }
    }

    pub(crate) fn release_file(&mut self, file: &str) {
        self.owner.retain(|_, owner| owner.as_str() != file);
    }

    pub(crate) fn rename_file(&mut self, from: &str, to: &str) {
        for owner in self.owner.values_mut() {
            if owner.as_str() == from {
                *owner = to.to_string();
            }
        }
    }

    pub(crate) fn owner_of(&self, id: &BlockId) -> Option<&str> {
        self.owner.get(id).map(String::as_str)
    }

    pub(crate) fn clear(&mut self) {
        self.owner.clear();
    }
}
