//! History pipeline paging + backpressure.
//!
//! Validates:
//! 1) Full history is delivered newest-first across batch boundaries.
//! 2) A short batch ends the run with exactly one finish and no further fetch.
//! 3) A consumer answering `false` stops fetching (at most the in-flight batch).
//! 4) Transport errors arrive in-band; the consumer decides whether to go on.
//! 5) Paging reaches index 0, the account's first operation.
//! 6) Re-fetching a failing batch is bounded even if the consumer always
//!    asks to continue.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::json;
use wise_chain::*;

/// Serves indices `0..len`, one operation per transaction, block == index.
struct ScriptedSource {
    len: u64,
    calls: Mutex<Vec<(i64, u32)>>,
    fail_first: AtomicU32,
}

impl ScriptedSource {
    fn new(len: u64) -> Self {
        Self {
            len,
            calls: Mutex::new(Vec::new()),
            fail_first: AtomicU32::new(0),
        }
    }

    fn failing_first(len: u64, failures: u32) -> Self {
        let s = Self::new(len);
        s.fail_first.store(failures, Ordering::SeqCst);
        s
    }

    fn calls(&self) -> Vec<(i64, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

fn op(index: u64) -> RawOperation {
    RawOperation {
        index,
        block: index,
        trx_id: format!("trx-{index}"),
        trx_in_block: 0,
        op_in_trx: 0,
        virtual_op: 0,
        timestamp: DateTime::from_timestamp(1_500_000_000 + index as i64, 0).unwrap(),
        op_type: "custom_json".to_string(),
        payload: json!({ "id": "wise", "json": "[]" }),
    }
}

#[async_trait]
impl HistorySource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_history_batch(
        &self,
        _account: &str,
        from: i64,
        limit: u32,
    ) -> Result<Vec<RawOperation>, TransportError> {
        self.calls.lock().unwrap().push((from, limit));
        if self.fail_first.load(Ordering::SeqCst) > 0 {
            self.fail_first.fetch_sub(1, Ordering::SeqCst);
            return Err(TransportError::Unreachable("node timeout".to_string()));
        }
        if self.len == 0 {
            return Ok(Vec::new());
        }
        let top = if from < 0 { self.len - 1 } else { (from as u64).min(self.len - 1) };
        let bottom = (top + 1).saturating_sub(limit as u64);
        Ok((bottom..=top).map(op).collect())
    }
}

#[tokio::test]
async fn full_history_is_delivered_newest_first_across_batches() {
    let source = Arc::new(ScriptedSource::new(25));
    let history = AccountHistory::new(source.clone(), "delegator").with_batch_size(10);

    let mut blocks = Vec::new();
    let summary = history
        .run(&mut |item: ChainItem<Transaction>| {
            blocks.push(item.unwrap().block_num);
            true
        })
        .await;

    assert_eq!(summary.reason, FinishReason::Exhausted);
    assert_eq!(blocks, (0..25).rev().collect::<Vec<u64>>());
    assert_eq!(source.calls(), vec![(-1, 10), (14, 10), (4, 5)]);
}

#[tokio::test]
async fn short_batch_finishes_once_without_further_fetch() {
    let source = Arc::new(ScriptedSource::new(7));
    let history = AccountHistory::new(source.clone(), "delegator").with_batch_size(10);

    let mut count = 0;
    let summary = history
        .run(&mut |_item: ChainItem<Transaction>| {
            count += 1;
            true
        })
        .await;

    assert_eq!(summary.reason, FinishReason::Exhausted);
    assert_eq!(summary.batches_fetched, 1);
    assert_eq!(source.calls().len(), 1);
    assert_eq!(count, 7);
}

#[tokio::test]
async fn consumer_stop_halts_fetching() {
    let source = Arc::new(ScriptedSource::new(1_000));
    let history = AccountHistory::new(source.clone(), "delegator").with_batch_size(10);

    let mut taken = 0;
    let summary = history
        .run(&mut |_item: ChainItem<Transaction>| {
            taken += 1;
            taken < 15
        })
        .await;

    assert_eq!(summary.reason, FinishReason::Stopped);
    assert_eq!(taken, 15);
    assert_eq!(summary.transactions_emitted, 15);
    assert!(source.calls().len() <= 2, "fetched {:?}", source.calls());
}

#[tokio::test]
async fn stop_through_filter_chain_propagates_upstream() {
    let source = Arc::new(ScriptedSource::new(1_000));
    let history = AccountHistory::new(source.clone(), "delegator").with_batch_size(50);

    let mut first: Option<u64> = None;
    let mut chain = filters::custom_json_id(&["wise"], |item: ChainItem<Transaction>| {
        first = Some(item.unwrap().block_num);
        false
    });
    let summary = history.run(&mut chain).await;

    assert_eq!(summary.reason, FinishReason::Stopped);
    assert_eq!(source.calls().len(), 1);
    drop(chain);
    assert_eq!(first, Some(999));
}

#[tokio::test]
async fn transport_error_is_delivered_and_consumer_may_stop() {
    let source = Arc::new(ScriptedSource::failing_first(10, 1));
    let history = AccountHistory::new(source.clone(), "delegator");

    let mut errors = 0;
    let summary = history
        .run(&mut |item: ChainItem<Transaction>| {
            if item.is_err() {
                errors += 1;
                return false;
            }
            true
        })
        .await;

    assert_eq!(summary.reason, FinishReason::Stopped);
    assert_eq!(summary.transport_errors, 1);
    assert_eq!(errors, 1);
    assert_eq!(source.calls().len(), 1);
}

#[tokio::test]
async fn consumer_continuing_after_error_retries_the_batch() {
    let source = Arc::new(ScriptedSource::failing_first(4, 2));
    let history = AccountHistory::new(source.clone(), "delegator");

    let mut ok = 0;
    let mut errors = 0;
    let summary = history
        .run(&mut |item: ChainItem<Transaction>| {
            match item {
                Ok(_) => ok += 1,
                Err(_) => errors += 1,
            }
            true
        })
        .await;

    assert_eq!(summary.reason, FinishReason::Exhausted);
    assert_eq!(errors, 2);
    assert_eq!(ok, 4);
    assert_eq!(source.calls(), vec![(-1, 1000), (-1, 1000), (-1, 1000)]);
}

#[tokio::test]
async fn paging_reaches_the_first_operation() {
    let source = Arc::new(ScriptedSource::new(3));
    let history = AccountHistory::new(source.clone(), "fresh-account").with_batch_size(1);

    let mut blocks = Vec::new();
    let summary = history
        .run(&mut |item: ChainItem<Transaction>| {
            blocks.push(item.unwrap().block_num);
            true
        })
        .await;

    assert_eq!(summary.reason, FinishReason::Exhausted);
    assert_eq!(blocks, vec![2, 1, 0]);
    assert_eq!(source.calls(), vec![(-1, 1), (1, 1), (0, 1)]);
}

#[tokio::test]
async fn endless_transport_failure_gives_up_after_max_retries() {
    let source = Arc::new(ScriptedSource::failing_first(10, u32::MAX));
    let history = AccountHistory::new(source.clone(), "delegator").with_max_retries(2);

    let mut errors = 0;
    let summary = history
        .run(&mut |item: ChainItem<Transaction>| {
            assert!(item.is_err());
            errors += 1;
            true
        })
        .await;

    assert_eq!(summary.reason, FinishReason::TransportFailed);
    assert_eq!(summary.transport_errors, 3);
    assert_eq!(summary.batches_fetched, 0);
    assert_eq!(errors, 3);
    assert_eq!(source.calls().len(), 3);
}
