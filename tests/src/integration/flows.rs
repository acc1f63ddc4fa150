//! # Integration Test Flows
//!
//! Block stores on several nodes feeding one metadata catalog.
//!
//! ## Flows Tested:
//!
//! 1. **Write path**: plan blocks → store payloads on a data node → register
//!    the logical file → reconcile → blocks are ready
//! 2. **Catalog lifecycle**: add, rename and remove a logical file
//! 3. **Cold start**: a reader blocks on a cataloged block until the owning
//!    data node reports it
//! 4. **Replication**: a block shipped between nodes gains a second replica,
//!    and readers pick the nearest one
//! 5. **Cluster refresh**: the server reaches every member

#[cfg(test)]
mod tests {
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    use mv_01_block_store::{BlockStore, BlockStoreApi};
    use mv_02_metadata_catalog::{plan_blocks, MetadataCatalog, MetadataCatalogApi};
    use mv_03_cluster::{
        ClusterCoordinator, ClusterDependencies, DesignatedServer, InProcessCluster,
        LocalNamedLock,
    };
    use shared_types::{BlockId, BlockRecord, BlockSource, FsConfig, NodeId};
    use tempfile::TempDir;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn config(dir: &TempDir) -> FsConfig {
        FsConfig::default()
            .with_work_root(dir.path())
            .with_block_size(4)
            .with_job_timeout(Duration::from_secs(10))
    }

    fn open_store(config: &FsConfig, node: &str) -> BlockStore {
        BlockStore::open(config, NodeId::from(node)).unwrap()
    }

    /// Plan `payload` as `name`, write each block to `store`, and return the
    /// planned records.
    fn write_file(store: &BlockStore, config: &FsConfig, name: &str, payload: &[u8]) -> Vec<BlockRecord> {
        let planned = plan_blocks(name, payload.len() as u64, config);
        let mut offset = 0usize;
        for record in &planned {
            let len = record.logical_length() as usize;
            store.add(record, &payload[offset..offset + len]).unwrap();
            offset += len;
        }
        planned
    }

    // =============================================================================
    // WRITE PATH
    // =============================================================================

    #[test]
    fn test_planned_file_becomes_readable() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let store = open_store(&cfg, "rack1.n1");
        let catalog = MetadataCatalog::open(&cfg).unwrap();

        let planned = write_file(&store, &cfg, "sales.bin", b"0123456789");
        assert_eq!(planned.len(), 3);

        let file = catalog.add("sales.bin", planned.clone()).unwrap();
        assert!(planned
            .iter()
            .all(|b| file.is_block_ready(b.block_id()) == Some(false)));

        let sources: [&dyn BlockSource; 1] = [&store];
        let report = catalog.refresh(&sources, false).unwrap();
        assert_eq!(report.attached, 3);
        assert!(report.orphans.is_empty());

        for record in &planned {
            assert_eq!(file.is_block_ready(record.block_id()), Some(true));
            let location = file.get_block(record.block_id()).unwrap().location().unwrap();
            assert_eq!(location.node(), &NodeId::from("rack1.n1"));
        }
        let bytes: Vec<u8> = planned
            .iter()
            .flat_map(|b| store.read(b.block_id()).unwrap())
            .collect();
        assert_eq!(bytes, b"0123456789");
    }

    #[test]
    fn test_store_blocks_without_catalog_entry_are_orphans() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let store = open_store(&cfg, "rack1.n1");
        let catalog = MetadataCatalog::open(&cfg).unwrap();

        store
            .add(&BlockRecord::new("stray.bin", "stray-1", 2), b"xy")
            .unwrap();

        let sources: [&dyn BlockSource; 1] = [&store];
        let report = catalog.refresh(&sources, false).unwrap();
        assert_eq!(report.attached, 0);
        assert_eq!(report.orphans.len(), 1);
    }

    // =============================================================================
    // CATALOG LIFECYCLE
    // =============================================================================

    #[test]
    fn test_add_rename_remove_survives_restart() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        {
            let catalog = MetadataCatalog::open(&cfg).unwrap();
            let file = catalog
                .add(
                    "report1.bin",
                    vec![BlockRecord::new("", "A", 4), BlockRecord::new("", "B", 4)],
                )
                .unwrap();
            assert_eq!(file.version(), 1);
            assert_eq!(file.len(), 2);

            assert!(catalog.rename("report1.bin", "report2.bin"));
            assert!(!catalog.contains("report1.bin"));
            catalog.dispose();
        }

        let catalog = MetadataCatalog::open(&cfg).unwrap();
        assert!(!catalog.contains("report1.bin"));
        let file = catalog.get("report2.bin").unwrap();
        assert_eq!(file.block_ids(), vec![BlockId::from("A"), BlockId::from("B")]);

        assert!(catalog.remove("report2.bin"));
        drop(catalog);
        assert!(MetadataCatalog::open(&cfg).unwrap().is_empty());
    }

    // =============================================================================
    // COLD START
    // =============================================================================

    #[test]
    fn test_reader_waits_for_cold_block() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let catalog = MetadataCatalog::open(&cfg).unwrap();
        catalog
            .add("cold.bin", vec![BlockRecord::new("", "c1", 3)])
            .unwrap();

        let file = catalog.get("cold.bin").unwrap();
        let (tx, rx) = mpsc::channel();
        let reader = thread::spawn(move || {
            let ready = file.await_block_ready_for(&BlockId::from("c1"), Duration::from_secs(10));
            tx.send(()).unwrap();
            ready
        });
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        // The data node comes up and reports its inventory.
        let store = open_store(&cfg, "rack1.n1");
        store
            .add(&BlockRecord::new("cold.bin", "c1", 3), b"abc")
            .unwrap();
        let sources: [&dyn BlockSource; 1] = [&store];
        catalog.refresh(&sources, false).unwrap();

        assert_eq!(reader.join().unwrap(), Some(true));
    }

    // =============================================================================
    // REPLICATION
    // =============================================================================

    #[test]
    fn test_transferred_block_gains_nearest_replica() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir).with_max_replicas(2);
        let origin = open_store(&cfg, "dc1.rack1.n1");
        let replica = open_store(&cfg, "dc1.rack2.n1");
        let catalog = MetadataCatalog::open(&cfg).unwrap();

        let block = BlockRecord::new("hot.bin", "h1", 4);
        origin.add(&block, b"data").unwrap();
        catalog.add("hot.bin", vec![block.clone()]).unwrap();

        let frame = origin.export_block(block.block_id()).unwrap();
        let imported = replica.import_block(&frame).unwrap();
        assert!(imported.is_valid());
        assert_eq!(replica.read(block.block_id()).unwrap(), b"data");

        let sources: [&dyn BlockSource; 2] = [&origin, &replica];
        let report = catalog.refresh(&sources, false).unwrap();
        assert_eq!(report.attached, 2);

        let server_block = catalog
            .get("hot.bin")
            .unwrap()
            .get_block(block.block_id())
            .unwrap();
        assert_eq!(server_block.locations().len(), 2);

        let near_replica = server_block
            .nearest_location(&NodeId::from("dc1.rack2.n7"))
            .unwrap();
        assert_eq!(near_replica.node(), &NodeId::from("dc1.rack2.n1"));
        let near_origin = server_block
            .nearest_location(&NodeId::from("dc1.rack1.n3"))
            .unwrap();
        assert_eq!(near_origin.node(), &NodeId::from("dc1.rack1.n1"));
    }

    #[test]
    fn test_corrupt_frame_is_rejected() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let origin = open_store(&cfg, "rack1.n1");
        let replica = open_store(&cfg, "rack1.n2");

        let block = BlockRecord::new("f.bin", "f1", 4);
        origin.add(&block, b"abcd").unwrap();
        let mut frame = origin.export_block(block.block_id()).unwrap();
        frame.truncate(frame.len() - 1);

        assert!(replica.import_block(&frame).is_none());
        assert!(!replica.contains(block.block_id()));
    }

    // =============================================================================
    // CLUSTER REFRESH
    // =============================================================================

    #[test]
    fn test_cluster_refresh_links_server_blocks() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let locks = LocalNamedLock::new();
        let cluster = Arc::new(InProcessCluster::new());

        let member = |node: &str| {
            let deps = ClusterDependencies {
                lock: Arc::new(locks.clone()),
                membership: cluster.clone(),
                elector: Arc::new(DesignatedServer(NodeId::from("rack1.n1"))),
            };
            let coordinator = Arc::new(ClusterCoordinator::new(
                cfg.clone().with_node_id(node),
                deps,
            ));
            cluster.join(coordinator.clone());
            coordinator
        };
        let server = member("rack1.n1");
        let data = member("rack2.n1");

        let role = server.server().unwrap();
        let planned = write_file(role.store(), &cfg, "cube.bin", b"abcdef");
        role.catalog().unwrap().add("cube.bin", planned.clone()).unwrap();

        let summary = server.refresh_cluster(true);
        assert_eq!(summary.submitted, 2);
        assert!(summary.is_complete());

        let file = role.catalog().unwrap().get("cube.bin").unwrap();
        assert!(planned
            .iter()
            .all(|b| file.is_block_ready(b.block_id()) == Some(true)));
        assert!(data.data_node().unwrap().store().is_empty());

        server.shutdown();
        data.shutdown();
    }
}
