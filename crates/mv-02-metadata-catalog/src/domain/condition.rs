//! Predicates selecting blocks for `delete_record`.

use shared_types::{BlockId, ServerBlockRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCondition {
    /// Blocks with any of these ids.
    BlockIds(Vec<BlockId>),
    /// Blocks holding no rows.
    EmptyBlocks,
    /// Blocks whose value range lies entirely outside `[min, max]`. Blocks
    /// without a range never match.
    OutsideRange { min: String, max: String },
}

impl RecordCondition {
    pub fn matches(&self, block: &ServerBlockRecord) -> bool {
        match self {
            RecordCondition::BlockIds(ids) => ids.contains(block.block_id()),
            RecordCondition::EmptyBlocks => block.stats().rows == 0,
            RecordCondition::OutsideRange { min, max } => block
                .stats()
                .range
                .as_ref()
                .map_or(false, |range| range.is_outside(min, max)),
        }
    }

    /// True when any condition matches.
    pub fn any_matches(conditions: &[RecordCondition], block: &ServerBlockRecord) -> bool {
        conditions.iter().any(|c| c.matches(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BlockRecord, BlockStats, ValueRange};

    fn block(id: &str, rows: u64, range: Option<(&str, &str)>) -> ServerBlockRecord {
        ServerBlockRecord::new(BlockRecord::new("f", id, 10)).with_stats(BlockStats {
            rows,
            dictionary: None,
            range: range.map(|(lo, hi)| ValueRange::new(lo, hi)),
        })
    }

    #[test]
    fn test_conditions() {
        let b = block("b1", 0, Some(("2020", "2021")));
        assert!(RecordCondition::BlockIds(vec![BlockId::from("b1")]).matches(&b));
        assert!(RecordCondition::EmptyBlocks.matches(&b));
        assert!(RecordCondition::OutsideRange {
            min: "2022".into(),
            max: "2023".into()
        }
        .matches(&b));
        assert!(!RecordCondition::OutsideRange {
            min: "2021".into(),
            max: "2023".into()
        }
        .matches(&b));
    }

    #[test]
    fn test_block_without_range_is_never_outside() {
        let b = block("b2", 5, None);
        let cond = RecordCondition::OutsideRange {
            min: "a".into(),
            max: "b".into(),
        };
        assert!(!cond.matches(&b));
        assert!(!RecordCondition::any_matches(
            &[cond, RecordCondition::EmptyBlocks],
            &b
        ));
    }
}
