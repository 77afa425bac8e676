use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::ChainMoment;

/// One account-history entry exactly as a node returns it.
///
/// Wire shape: `[index, {block, trx_id, trx_in_block, op_in_trx, op: [type, payload], timestamp, virtual_op}]`.
/// Node timestamps carry no zone suffix; they are UTC.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireRawOperation")]
pub struct RawOperation {
    /// Global position in the account's history.
    pub index: u64,
    pub block: u64,
    pub trx_id: String,
    pub trx_in_block: u32,
    pub op_in_trx: u32,
    pub virtual_op: u32,
    pub timestamp: DateTime<Utc>,
    pub op_type: String,
    pub payload: Value,
}

impl RawOperation {
    pub fn moment(&self) -> ChainMoment {
        ChainMoment::new(self.block, self.trx_in_block, self.op_in_trx)
    }
}

#[derive(Deserialize)]
struct WireRawOperation(u64, WireRawBody);

#[derive(Deserialize)]
struct WireRawBody {
    block: u64,
    trx_id: String,
    trx_in_block: u32,
    #[serde(default)]
    op_in_trx: u32,
    #[serde(default)]
    virtual_op: u32,
    timestamp: NaiveDateTime,
    op: (String, Value),
}

impl From<WireRawOperation> for RawOperation {
    fn from(w: WireRawOperation) -> Self {
        let WireRawOperation(index, body) = w;
        let (op_type, payload) = body.op;
        Self {
            index,
            block: body.block,
            trx_id: body.trx_id,
            trx_in_block: body.trx_in_block,
            op_in_trx: body.op_in_trx,
            virtual_op: body.virtual_op,
            timestamp: body.timestamp.and_utc(),
            op_type,
            payload,
        }
    }
}

/// A single operation inside a [`Transaction`].
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op_in_trx: u32,
    pub op_type: String,
    pub payload: Value,
}

/// Operations sharing one transaction id, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub block_num: u64,
    pub transaction_num: u32,
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub ops: Vec<Operation>,
}

impl Transaction {
    /// Moment of the transaction itself (its first operation slot).
    pub fn moment(&self) -> ChainMoment {
        ChainMoment::new(self.block_num, self.transaction_num, 0)
    }

    pub fn moment_of(&self, op: &Operation) -> ChainMoment {
        ChainMoment::new(self.block_num, self.transaction_num, op.op_in_trx)
    }
}

/// Group one history batch into transactions, newest first.
///
/// Batches arrive oldest-first, so the output is sorted descending by
/// (block, transaction-in-block). Operations keep their source order.
pub fn group_batch(batch: Vec<RawOperation>) -> Vec<Transaction> {
    let mut grouped: BTreeMap<(u64, u32, String), Transaction> = BTreeMap::new();

    for raw in batch {
        let key = (raw.block, raw.trx_in_block, raw.trx_id.clone());
        let trx = grouped.entry(key).or_insert_with(|| Transaction {
            block_num: raw.block,
            transaction_num: raw.trx_in_block,
            transaction_id: raw.trx_id.clone(),
            timestamp: raw.timestamp,
            ops: Vec::new(),
        });
        trx.ops.push(Operation {
            op_in_trx: raw.op_in_trx,
            op_type: raw.op_type,
            payload: raw.payload,
        });
    }

    grouped.into_values().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(index: u64, block: u64, trx_in_block: u32, trx_id: &str, op_in_trx: u32) -> RawOperation {
        RawOperation {
            index,
            block,
            trx_id: trx_id.to_string(),
            trx_in_block,
            op_in_trx,
            virtual_op: 0,
            timestamp: DateTime::from_timestamp(1_520_000_000 + block as i64 * 3, 0).unwrap(),
            op_type: "custom_json".to_string(),
            payload: json!({ "n": index }),
        }
    }

    #[test]
    fn deserializes_node_tuple_shape() {
        let v = json!([
            1234,
            {
                "block": 20000000,
                "trx_id": "abc123",
                "trx_in_block": 4,
                "op_in_trx": 1,
                "virtual_op": 0,
                "timestamp": "2018-02-23T11:37:21",
                "op": ["vote", { "voter": "alice", "weight": 100 }]
            }
        ]);
        let op: RawOperation = serde_json::from_value(v).unwrap();
        assert_eq!(op.index, 1234);
        assert_eq!(op.block, 20_000_000);
        assert_eq!(op.op_type, "vote");
        assert_eq!(op.payload["voter"], "alice");
        assert_eq!(op.timestamp.to_rfc3339(), "2018-02-23T11:37:21+00:00");
        assert_eq!(op.moment(), ChainMoment::new(20_000_000, 4, 1));
    }

    #[test]
    fn groups_by_transaction_id_preserving_op_order() {
        let batch = vec![
            raw(1, 10, 0, "t1", 0),
            raw(2, 10, 0, "t1", 1),
            raw(3, 11, 2, "t2", 0),
            raw(4, 10, 0, "t1", 2),
        ];
        let trxs = group_batch(batch);
        assert_eq!(trxs.len(), 2);
        let t1 = &trxs[1];
        assert_eq!(t1.transaction_id, "t1");
        let order: Vec<u32> = t1.ops.iter().map(|o| o.op_in_trx).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn output_is_sorted_newest_first() {
        let batch = vec![
            raw(1, 10, 0, "a", 0),
            raw(2, 10, 3, "b", 0),
            raw(3, 12, 1, "c", 0),
            raw(4, 12, 0, "d", 0),
        ];
        let ids: Vec<String> = group_batch(batch)
            .into_iter()
            .map(|t| t.transaction_id)
            .collect();
        assert_eq!(ids, vec!["c", "d", "b", "a"]);
    }

    #[test]
    fn operation_moments_increase_within_transaction() {
        let trx = &group_batch(vec![raw(1, 7, 1, "x", 0), raw(2, 7, 1, "x", 1)])[0];
        let moments: Vec<ChainMoment> = trx.ops.iter().map(|o| trx.moment_of(o)).collect();
        assert!(moments.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(trx.moment(), ChainMoment::new(7, 1, 0));
    }
}
