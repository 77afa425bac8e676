//! Newest-first account history pipeline.
//!
//! # Invariants
//!
//! - **One fetch in flight**: the next batch is requested only after every
//!   transaction of the current batch was consumed.
//! - **Stop is final**: once the consumer answers `false`, no further fetch is
//!   issued.
//! - **Single finish**: `run` returns exactly one [`HistorySummary`].
//! - **Short batch terminates**: a batch shorter than the requested limit (or
//!   empty) is the last one.
//! - **Bounded retry**: a failed batch is requested again only while the
//!   consumer asks for it and at most `max_retries` times in a row.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{group_batch, Consumer, HistorySource, Transaction};

pub const DEFAULT_BATCH_SIZE: u32 = 1000;

/// Consecutive re-fetches of one failed batch before the run gives up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Why a history run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishReason {
    /// The source has nothing older to give.
    Exhausted,
    /// The consumer answered `false`.
    Stopped,
    /// The same batch kept failing after `max_retries` re-fetches.
    TransportFailed,
}

/// Outcome of one [`AccountHistory::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistorySummary {
    pub reason: FinishReason,
    pub batches_fetched: u32,
    pub transactions_emitted: u64,
    pub transport_errors: u32,
}

/// Pages through one account's history and pushes transactions into a consumer.
///
/// Instances share no mutable state; run as many in parallel as needed.
pub struct AccountHistory {
    source: Arc<dyn HistorySource>,
    account: String,
    batch_size: u32,
    max_retries: u32,
}

impl AccountHistory {
    pub fn new(source: Arc<dyn HistorySource>, account: impl Into<String>) -> Self {
        Self {
            source,
            account: account.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Limit for a fetch starting at `from`.
    ///
    /// A fetch covers `(from - limit, from]`. Near the beginning of history
    /// the limit is clamped so the window ends exactly at index 0.
    fn limit_for(&self, from: i64) -> u32 {
        if from < 0 {
            self.batch_size
        } else {
            (from as u64 + 1).min(self.batch_size as u64) as u32
        }
    }

    /// Stream the history newest-first into `consumer`.
    ///
    /// A transport failure is handed to the consumer as an `Err` item. If the
    /// consumer still answers `true`, the failed batch is requested again, up
    /// to `max_retries` times in a row; past that the run finishes with
    /// [`FinishReason::TransportFailed`].
    pub async fn run<C>(&self, consumer: &mut C) -> HistorySummary
    where
        C: Consumer<Transaction> + ?Sized,
    {
        let mut summary = HistorySummary {
            reason: FinishReason::Exhausted,
            batches_fetched: 0,
            transactions_emitted: 0,
            transport_errors: 0,
        };
        let mut from: i64 = -1;
        let mut failures_in_row: u32 = 0;

        loop {
            let limit = self.limit_for(from);
            debug!(
                account = %self.account,
                source = self.source.name(),
                from,
                limit,
                "fetching history batch"
            );

            let batch = match self
                .source
                .fetch_history_batch(&self.account, from, limit)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    summary.transport_errors = summary.transport_errors.saturating_add(1);
                    failures_in_row = failures_in_row.saturating_add(1);
                    warn!(
                        account = %self.account,
                        from,
                        attempt = failures_in_row,
                        error = %e,
                        "history fetch failed"
                    );
                    if !consumer.consume(Err(e)) {
                        return self.finish(summary, FinishReason::Stopped);
                    }
                    if failures_in_row > self.max_retries {
                        return self.finish(summary, FinishReason::TransportFailed);
                    }
                    continue;
                }
            };
            failures_in_row = 0;
            summary.batches_fetched += 1;

            if batch.is_empty() {
                return self.finish(summary, FinishReason::Exhausted);
            }

            let short = batch.len() < limit as usize;
            let oldest = batch.iter().map(|op| op.index).min();

            for trx in group_batch(batch) {
                summary.transactions_emitted += 1;
                if !consumer.consume(Ok(trx)) {
                    return self.finish(summary, FinishReason::Stopped);
                }
            }

            if short {
                return self.finish(summary, FinishReason::Exhausted);
            }
            match oldest {
                Some(index) if index > 0 => from = (index - 1) as i64,
                _ => return self.finish(summary, FinishReason::Exhausted),
            }
        }
    }

    fn finish(&self, mut summary: HistorySummary, reason: FinishReason) -> HistorySummary {
        summary.reason = reason;
        info!(
            account = %self.account,
            reason = ?reason,
            batches = summary.batches_fetched,
            transactions = summary.transactions_emitted,
            transport_errors = summary.transport_errors,
            "history run finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HistorySource, RawOperation, TransportError};
    use async_trait::async_trait;

    struct NoSource;

    #[async_trait]
    impl HistorySource for NoSource {
        fn name(&self) -> &'static str {
            "none"
        }

        async fn fetch_history_batch(
            &self,
            _account: &str,
            _from: i64,
            _limit: u32,
        ) -> Result<Vec<RawOperation>, TransportError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn limit_is_clamped_near_history_start() {
        let h = AccountHistory::new(Arc::new(NoSource), "alice").with_batch_size(100);
        assert_eq!(h.limit_for(-1), 100);
        assert_eq!(h.limit_for(5_000), 100);
        assert_eq!(h.limit_for(99), 100);
        assert_eq!(h.limit_for(37), 38);
        assert_eq!(h.limit_for(0), 1);
    }

    #[test]
    fn zero_batch_size_is_raised_to_one() {
        let h = AccountHistory::new(Arc::new(NoSource), "alice").with_batch_size(0);
        assert_eq!(h.batch_size(), 1);
    }

    #[tokio::test]
    async fn empty_history_finishes_exhausted() {
        let h = AccountHistory::new(Arc::new(NoSource), "alice");
        let mut seen = 0;
        let summary = h
            .run(&mut |_item: crate::ChainItem<Transaction>| {
                seen += 1;
                true
            })
            .await;
        assert_eq!(summary.reason, FinishReason::Exhausted);
        assert_eq!(summary.batches_fetched, 1);
        assert_eq!(seen, 0);
    }
}
