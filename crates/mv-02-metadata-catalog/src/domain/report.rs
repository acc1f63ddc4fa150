use shared_types::BlockId;

/// Outcome of reconciling the catalog against data-node block stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Logical files loaded from persistence (0 when no reload happened).
    pub files_loaded: usize,
    /// Persisted documents discarded as corrupt.
    pub discarded: usize,
    /// Locations attached to catalog blocks.
    pub attached: usize,
    /// Locations refused because the block's replica capacity was full.
    pub rejected: usize,
    /// Store blocks skipped because their physical copy is incomplete.
    pub skipped_invalid: usize,
    /// Valid store blocks that no logical file references.
    pub orphans: Vec<BlockId>,
}
