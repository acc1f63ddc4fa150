//! Catalog reload and reconciliation against data-node inventories.

use super::*;
use crate::domain::report::RefreshReport;
use shared_types::{BlockSource, LocationRecord, ReplicaSet};
use std::collections::HashMap;

impl<P> MetadataCatalog<P>
where
    P: CatalogPersistence,
{
    pub(crate) fn reconcile(
        &self,
        sources: &[&dyn BlockSource],
        force: bool,
    ) -> Result<RefreshReport, CatalogError> {
        self.check_open()?;
        let mut report = RefreshReport::default();
        if force || !self.loaded.load(Ordering::Acquire) {
            self.reload(&mut report)?;
        }

        for source in sources {
            let node = source.node_id().clone();
            for block in source.list_blocks() {
                if !block.is_valid() {
                    report.skipped_invalid += 1;
                    continue;
                }
                let location = LocationRecord::from_node_record(node.clone(), &block);
                let file = self
                    .owner_of(block.block_id())
                    .and_then(|owner| self.get(&owner));
                match file.and_then(|f| f.attach_location(location)) {
                    Some(outcome) if outcome.is_attached() => report.attached += 1,
                    Some(_) => report.rejected += 1,
                    None => report.orphans.push(block.block_id().clone()),
                }
            }
        }

        if !report.orphans.is_empty() {
            warn!(
                "[mv-02] ⚠️ {} store blocks are not referenced by any file",
                report.orphans.len()
            );
        }
        info!(
            "[mv-02] 🔍 Refresh: {} attached, {} rejected, {} invalid, {} orphans",
            report.attached,
            report.rejected,
            report.skipped_invalid,
            report.orphans.len()
        );
        Ok(report)
    }

    /// Replace the in-memory tree with the persisted documents. A document
    /// that cannot be decoded, or whose blocks are already owned by an earlier
    /// document, is discarded. Blocks already known keep their replicas and
    /// readiness.
    fn reload(&self, report: &mut RefreshReport) -> Result<(), CatalogError> {
        let loaded = self.persistence.load_all()?;
        for err in &loaded.corrupt {
            warn!("[mv-02] Discarding catalog document: {}", err);
        }
        report.discarded = loaded.corrupt.len();
        let carried = self.live_readiness();

        let mut files = BTreeMap::new();
        let mut owners = BlockOwners::default();
        for doc in loaded.documents {
            let name = doc.name.clone();
            if files.contains_key(&name) {
                warn!("[mv-02] Discarding second document of {}", name);
                report.discarded += 1;
                continue;
            }
            let mut file = match LogicalFile::from_document(doc, self.max_replicas) {
                Ok(file) => file,
                Err(e) => {
                    warn!("[mv-02] Discarding catalog document: {}", e);
                    report.discarded += 1;
                    continue;
                }
            };
            if let Err(e) = owners.claim(&file.block_ids(), &name) {
                warn!("[mv-02] Discarding {}: {}", name, e);
                report.discarded += 1;
                continue;
            }
            file.adopt_readiness(&carried);
            files.insert(name, Arc::new(file));
        }
        report.files_loaded = files.len();

        {
            let mut map = self.files.write();
            *map = files;
            *self.owners.lock() = owners;
        }
        self.loaded.store(true, Ordering::Release);
        Ok(())
    }

    fn live_readiness(&self) -> HashMap<BlockId, Arc<ReplicaSet>> {
        let live: Vec<Arc<LogicalFile>> = self.files.read().values().cloned().collect();
        live.iter().flat_map(|file| file.readiness_by_block()).collect()
    }
}
