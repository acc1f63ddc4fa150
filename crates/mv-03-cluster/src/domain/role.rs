//! # Node Role
//!
//! The services a process holds for the role it was elected to.

use mv_01_block_store::{BlockStore, BlockStoreApi};
use mv_02_metadata_catalog::{MetadataCatalog, MetadataCatalogApi};
use shared_types::NodeId;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Server,
    Data,
}

/// Process-local wrapper over the catalog and/or block store of a role.
pub struct NodeRole {
    kind: RoleKind,
    node_id: NodeId,
    catalog: Option<Arc<MetadataCatalog>>,
    store: Arc<BlockStore>,
}

impl NodeRole {
    pub fn server(node_id: NodeId, catalog: Arc<MetadataCatalog>, store: Arc<BlockStore>) -> Self {
        Self {
            kind: RoleKind::Server,
            node_id,
            catalog: Some(catalog),
            store,
        }
    }

    pub fn data(node_id: NodeId, store: Arc<BlockStore>) -> Self {
        Self {
            kind: RoleKind::Data,
            node_id,
            catalog: None,
            store,
        }
    }

    pub fn kind(&self) -> RoleKind {
        self.kind
    }

    pub fn is_server(&self) -> bool {
        self.kind == RoleKind::Server
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Only the server role holds the catalog.
    pub fn catalog(&self) -> Option<&Arc<MetadataCatalog>> {
        self.catalog.as_ref()
    }

    pub fn store(&self) -> &Arc<BlockStore> {
        &self.store
    }

    /// Persist and release the held services.
    pub fn dispose(&self) {
        if let Some(catalog) = &self.catalog {
            catalog.dispose();
        }
        self.store.dispose();
    }
}

impl std::fmt::Debug for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRole")
            .field("kind", &self.kind)
            .field("node_id", &self.node_id)
            .field("files", &self.catalog.as_ref().map(|c| c.len()))
            .field("blocks", &self.store.len())
            .finish()
    }
}
