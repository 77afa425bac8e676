//! Chain position identity.
//!
//! # Invariants
//!
//! - **Total order**: block, then transaction-in-block, then
//!   operation-in-transaction, ascending.
//! - **FUTURE is a sentinel**: it compares greater than every real moment and
//!   equal only to itself.
//! - **Immutable**: a moment is a value; nothing mutates it after construction.

use std::fmt;

/// Index encoding of [`ChainMoment::Future`] (14 digits of block number).
pub const FUTURE_INDEX_KEY: &str = "99999999999999.0000";

/// A point in the causal order of on-chain operations.
///
/// The derived ordering is the total order: `At` sorts by its fields in
/// declaration order and every `At` sorts before `Future`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChainMoment {
    At {
        block_num: u64,
        transaction_num: u32,
        operation_num: u32,
    },
    Future,
}

impl ChainMoment {
    pub const FUTURE: ChainMoment = ChainMoment::Future;

    pub fn new(block_num: u64, transaction_num: u32, operation_num: u32) -> Self {
        ChainMoment::At {
            block_num,
            transaction_num,
            operation_num,
        }
    }

    pub fn is_future(&self) -> bool {
        matches!(self, ChainMoment::Future)
    }

    pub fn block_num(&self) -> Option<u64> {
        match self {
            ChainMoment::At { block_num, .. } => Some(*block_num),
            ChainMoment::Future => None,
        }
    }

    pub fn transaction_num(&self) -> Option<u32> {
        match self {
            ChainMoment::At {
                transaction_num, ..
            } => Some(*transaction_num),
            ChainMoment::Future => None,
        }
    }

    pub fn operation_num(&self) -> Option<u32> {
        match self {
            ChainMoment::At { operation_num, .. } => Some(*operation_num),
            ChainMoment::Future => None,
        }
    }

    /// Moment encoding used by index queries: `"<block>.<trx:04>"`.
    ///
    /// The operation number is not part of the key; the index resolves
    /// moments at transaction granularity.
    pub fn to_index_key(&self) -> String {
        match self {
            ChainMoment::At {
                block_num,
                transaction_num,
                ..
            } => format!("{block_num}.{transaction_num:04}"),
            ChainMoment::Future => FUTURE_INDEX_KEY.to_string(),
        }
    }
}

impl fmt::Display for ChainMoment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainMoment::At {
                block_num,
                transaction_num,
                operation_num,
            } => write!(f, "{block_num}.{transaction_num}.{operation_num}"),
            ChainMoment::Future => write!(f, "FUTURE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn orders_by_block_then_transaction_then_operation() {
        let a = ChainMoment::new(10, 5, 9);
        let b = ChainMoment::new(11, 0, 0);
        let c = ChainMoment::new(11, 1, 0);
        let d = ChainMoment::new(11, 1, 2);
        assert!(a < b);
        assert!(b < c);
        assert!(c < d);
        assert_eq!(d.cmp(&ChainMoment::new(11, 1, 2)), Ordering::Equal);
    }

    #[test]
    fn exactly_one_relation_holds_for_real_moments() {
        let samples = [
            ChainMoment::new(0, 0, 0),
            ChainMoment::new(1, 0, 0),
            ChainMoment::new(1, 0, 1),
            ChainMoment::new(1, 2, 0),
            ChainMoment::new(u64::MAX, u32::MAX, u32::MAX),
        ];
        for a in samples {
            for b in samples {
                let relations = [a < b, a == b, a > b];
                assert_eq!(relations.iter().filter(|r| **r).count(), 1, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn future_is_greater_than_any_real_moment() {
        assert!(ChainMoment::FUTURE > ChainMoment::new(u64::MAX, u32::MAX, u32::MAX));
        assert!(ChainMoment::FUTURE > ChainMoment::new(0, 0, 0));
        assert_eq!(ChainMoment::FUTURE, ChainMoment::Future);
        assert!(ChainMoment::FUTURE.is_future());
        assert_eq!(ChainMoment::FUTURE.block_num(), None);
    }

    #[test]
    fn index_key_pads_transaction_number() {
        assert_eq!(ChainMoment::new(22_000_123, 7, 3).to_index_key(), "22000123.0007");
        assert_eq!(ChainMoment::new(5, 1234, 0).to_index_key(), "5.1234");
        assert_eq!(ChainMoment::FUTURE.to_index_key(), "99999999999999.0000");
    }

    #[test]
    fn display_is_dotted_triple() {
        assert_eq!(ChainMoment::new(3, 2, 1).to_string(), "3.2.1");
        assert_eq!(ChainMoment::FUTURE.to_string(), "FUTURE");
    }
}
