//! # Block Records
//!
//! Value types describing a logical block, its physical counterpart on a data
//! node, and the server-side view that tracks where the block lives.
//!
//! ## Shape
//!
//! ```text
//! BlockRecord ──┬── + PhysicalInfo ─────────────── NodeBlockRecord
//!               │                                      │ (+ NodeId)
//!               │                                      ↓
//!               │                                 LocationRecord
//!               └── + BlockStats + ReplicaSet ──── ServerBlockRecord
//! ```
//!
//! The three shapes are composed rather than inherited; `RecordVariant` is the
//! tagged sum used wherever any of them may travel.
//!
//! ## Invariants
//!
//! - A `BlockId` is globally unique. Equality and hashing of every record type
//!   depend on the block id alone, never on the parent file name.
//! - `version` never decreases.
//! - A `ServerBlockRecord` becomes ready on its first attached location and
//!   never reverts.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Physical length marker for "no physical copy".
pub const ABSENT_LENGTH: i64 = -1;

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Globally unique, caller-assigned block identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id can be used verbatim as a file name on a data node.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Dotted hierarchical node identifier, e.g. `rack1.node3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dot-separated segments, outermost first.
    pub fn segments(&self) -> std::str::Split<'_, char> {
        self.0.split('.')
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// LOGICAL BLOCK
// =============================================================================

/// A logical block: one contiguous chunk of a logical file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRecord {
    parent_file_name: String,
    block_id: BlockId,
    logical_length: i64,
    version: u64,
}

impl BlockRecord {
    pub fn new(
        parent_file_name: impl Into<String>,
        block_id: impl Into<BlockId>,
        logical_length: i64,
    ) -> Self {
        Self {
            parent_file_name: parent_file_name.into(),
            block_id: block_id.into(),
            logical_length,
            version: 0,
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn parent_file_name(&self) -> &str {
        &self.parent_file_name
    }

    pub fn block_id(&self) -> &BlockId {
        &self.block_id
    }

    pub fn logical_length(&self) -> i64 {
        self.logical_length
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_parent_file_name(&mut self, name: impl Into<String>) {
        self.parent_file_name = name.into();
    }

    pub fn set_logical_length(&mut self, length: i64) {
        self.logical_length = length;
    }

    pub fn set_block_id(&mut self, id: BlockId) {
        self.block_id = id;
    }

    /// Raise the version to `version`; lower values are ignored.
    pub fn advance_version(&mut self, version: u64) {
        self.version = self.version.max(version);
    }

    /// Increment the version and return the new value.
    pub fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }
}

impl PartialEq for BlockRecord {
    fn eq(&self, other: &Self) -> bool {
        self.block_id == other.block_id
    }
}

impl Eq for BlockRecord {}

impl Hash for BlockRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.block_id.hash(state);
    }
}

// =============================================================================
// PHYSICAL BLOCK (DATA NODE)
// =============================================================================

/// Physical extent of a block on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalInfo {
    pub physical_length: i64,
}

impl PhysicalInfo {
    pub fn absent() -> Self {
        Self {
            physical_length: ABSENT_LENGTH,
        }
    }

    pub fn present(length: i64) -> Self {
        Self {
            physical_length: length,
        }
    }

    pub fn is_present(&self) -> bool {
        self.physical_length >= 0
    }
}

impl Default for PhysicalInfo {
    fn default() -> Self {
        Self::absent()
    }
}

/// A block as held by a data node's block store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBlockRecord {
    record: BlockRecord,
    physical: PhysicalInfo,
}

impl NodeBlockRecord {
    pub fn new(record: BlockRecord, physical: PhysicalInfo) -> Self {
        Self { record, physical }
    }

    /// Node record with no physical copy yet.
    pub fn unbacked(record: BlockRecord) -> Self {
        Self::new(record, PhysicalInfo::absent())
    }

    pub fn record(&self) -> &BlockRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut BlockRecord {
        &mut self.record
    }

    pub fn into_record(self) -> BlockRecord {
        self.record
    }

    pub fn block_id(&self) -> &BlockId {
        self.record.block_id()
    }

    pub fn physical(&self) -> PhysicalInfo {
        self.physical
    }

    pub fn physical_length(&self) -> i64 {
        self.physical.physical_length
    }

    pub fn set_physical_length(&mut self, length: i64) {
        self.physical.physical_length = length;
    }

    /// Mark the physical copy as missing.
    pub fn invalidate(&mut self) {
        self.physical = PhysicalInfo::absent();
    }

    /// The physical copy is complete: its length equals the logical length.
    pub fn is_valid(&self) -> bool {
        self.physical.is_present() && self.physical.physical_length == self.record.logical_length()
    }
}

impl PartialEq for NodeBlockRecord {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Eq for NodeBlockRecord {}

impl Hash for NodeBlockRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.record.hash(state);
    }
}

/// One physical replica of a block on a specific data node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRecord {
    node: NodeId,
    block: NodeBlockRecord,
}

impl LocationRecord {
    /// Build a location by copying an existing node record's length and version fields.
    pub fn from_node_record(node: NodeId, source: &NodeBlockRecord) -> Self {
        let record = BlockRecord::new(
            source.record().parent_file_name(),
            source.block_id().clone(),
            source.record().logical_length(),
        )
        .with_version(source.record().version());
        Self {
            node,
            block: NodeBlockRecord::new(record, source.physical()),
        }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn block(&self) -> &NodeBlockRecord {
        &self.block
    }

    pub fn block_id(&self) -> &BlockId {
        self.block.block_id()
    }

    pub fn is_valid(&self) -> bool {
        self.block.is_valid()
    }
}

// =============================================================================
// SERVER BLOCK (METADATA CATALOG)
// =============================================================================

/// Inclusive value range of a column chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: String,
    pub max: String,
}

impl ValueRange {
    pub fn new(min: impl Into<String>, max: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    /// True when no value of this range can fall inside `[min, max]`.
    pub fn is_outside(&self, min: &str, max: &str) -> bool {
        self.max.as_str() < min || self.min.as_str() > max
    }
}

/// Per-block statistics maintained by the materialized-view engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStats {
    /// Number of rows in the chunk.
    pub rows: u64,
    /// Distinct values, when the chunk is dictionary encoded.
    pub dictionary: Option<Vec<String>>,
    pub range: Option<ValueRange>,
}

/// Result of attaching a replica to a server block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// First location: the block transitioned to ready.
    BecameReady,
    /// Added alongside existing replicas.
    Added,
    /// Replaced a replica held by the same node.
    Replaced,
    /// Replica capacity is exhausted.
    Rejected,
}

impl AttachOutcome {
    pub fn is_attached(self) -> bool {
        !matches!(self, AttachOutcome::Rejected)
    }
}

#[derive(Debug)]
struct ReplicaState {
    locations: Vec<LocationRecord>,
    capacity: usize,
    ready: bool,
}

/// Replica list plus the one-way readiness latch, guarded by its own mutex.
///
/// This lock never nests under the owning file's lock, so attaching a location
/// cannot wait on a reader that is itself waiting for readiness.
#[derive(Debug)]
pub struct ReplicaSet {
    state: Mutex<ReplicaState>,
    ready_signal: Condvar,
}

impl ReplicaSet {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(ReplicaState {
                locations: Vec::new(),
                capacity: capacity.max(1),
                ready: false,
            }),
            ready_signal: Condvar::new(),
        }
    }

    fn attach(&self, location: LocationRecord) -> AttachOutcome {
        let mut state = self.state.lock();
        let outcome = if let Some(pos) = state
            .locations
            .iter()
            .position(|l| l.node == location.node)
        {
            state.locations[pos] = location;
            AttachOutcome::Replaced
        } else if state.locations.len() < state.capacity {
            state.locations.push(location);
            if state.ready {
                AttachOutcome::Added
            } else {
                AttachOutcome::BecameReady
            }
        } else {
            return AttachOutcome::Rejected;
        };

        if !state.ready {
            state.ready = true;
            self.ready_signal.notify_all();
        }
        outcome
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Block until ready or until `timeout` elapses; returns the final state.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.ready {
            if self
                .ready_signal
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        state.ready
    }

    fn snapshot(&self) -> ReplicaSet {
        let state = self.state.lock();
        ReplicaSet {
            state: Mutex::new(ReplicaState {
                locations: state.locations.clone(),
                capacity: state.capacity,
                ready: state.ready,
            }),
            ready_signal: Condvar::new(),
        }
    }
}

/// Server-side view of a block: where its replicas live and whether it is ready.
#[derive(Debug)]
pub struct ServerBlockRecord {
    record: BlockRecord,
    stats: BlockStats,
    replicas: Arc<ReplicaSet>,
}

impl ServerBlockRecord {
    /// Single-replica record, the baseline configuration.
    pub fn new(record: BlockRecord) -> Self {
        Self::with_capacity(record, 1)
    }

    pub fn with_capacity(record: BlockRecord, max_replicas: usize) -> Self {
        Self {
            record,
            stats: BlockStats::default(),
            replicas: Arc::new(ReplicaSet::new(max_replicas)),
        }
    }

    pub fn with_stats(mut self, stats: BlockStats) -> Self {
        self.stats = stats;
        self
    }

    /// Use an existing replica set, so this record and every other holder of
    /// `replicas` see the same locations and wake the same waiters.
    pub fn with_readiness(mut self, replicas: Arc<ReplicaSet>) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn record(&self) -> &BlockRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut BlockRecord {
        &mut self.record
    }

    pub fn block_id(&self) -> &BlockId {
        self.record.block_id()
    }

    pub fn stats(&self) -> &BlockStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut BlockStats {
        &mut self.stats
    }

    pub fn replica_capacity(&self) -> usize {
        self.replicas.state.lock().capacity
    }

    /// Attach a replica. The first successful attach makes the block ready and
    /// wakes every waiter.
    pub fn attach(&self, location: LocationRecord) -> AttachOutcome {
        self.replicas.attach(location)
    }

    pub fn is_ready(&self) -> bool {
        self.replicas.is_ready()
    }

    /// All replicas currently known.
    pub fn locations(&self) -> Vec<LocationRecord> {
        self.replicas.state.lock().locations.clone()
    }

    /// The primary replica.
    pub fn location(&self) -> Option<LocationRecord> {
        self.replicas.state.lock().locations.first().cloned()
    }

    /// The replica closest to `from` by node distance.
    pub fn nearest_location(&self, from: &NodeId) -> Option<LocationRecord> {
        self.replicas
            .state
            .lock()
            .locations
            .iter()
            .min_by_key(|l| crate::distance::distance(from.as_str(), l.node.as_str()))
            .cloned()
    }

    /// Shared handle on the readiness latch, usable after the record itself is
    /// no longer borrowed.
    pub fn readiness(&self) -> Arc<ReplicaSet> {
        Arc::clone(&self.replicas)
    }
}

impl Clone for ServerBlockRecord {
    /// Deep copy: the clone owns an independent replica set.
    fn clone(&self) -> Self {
        Self {
            record: self.record.clone(),
            stats: self.stats.clone(),
            replicas: Arc::new(self.replicas.snapshot()),
        }
    }
}

impl PartialEq for ServerBlockRecord {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Eq for ServerBlockRecord {}

impl Hash for ServerBlockRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.record.hash(state);
    }
}

// =============================================================================
// SUM TYPE
// =============================================================================

/// Any block record shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordVariant {
    Logical(BlockRecord),
    WithPhysical(NodeBlockRecord),
    ServerTracked(ServerBlockRecord),
}

impl RecordVariant {
    pub fn record(&self) -> &BlockRecord {
        match self {
            RecordVariant::Logical(r) => r,
            RecordVariant::WithPhysical(n) => n.record(),
            RecordVariant::ServerTracked(s) => s.record(),
        }
    }

    pub fn block_id(&self) -> &BlockId {
        self.record().block_id()
    }

    pub fn physical(&self) -> Option<PhysicalInfo> {
        match self {
            RecordVariant::WithPhysical(n) => Some(n.physical()),
            _ => None,
        }
    }

    /// Logical part only, dropping physical and server-side data.
    pub fn into_logical(self) -> BlockRecord {
        match self {
            RecordVariant::Logical(r) => r,
            RecordVariant::WithPhysical(n) => n.into_record(),
            RecordVariant::ServerTracked(s) => s.record,
        }
    }
}
