//! wise-chain
//!
//! Chain positions and history traversal.
//!
//! - [`ChainMoment`]: total order over (block, transaction, operation).
//! - [`AccountHistory`]: pages an account's history newest-first through a
//!   [`HistorySource`], groups raw operations into [`Transaction`]s and pushes
//!   them into a [`Consumer`] chain.
//! - Backpressure is the consumer's `bool` return: `false` stops fetching.
//!
//! No concrete node transport lives here; callers plug one in through
//! [`HistorySource`].

mod consumer;
mod history;
mod moment;
mod source;
mod transaction;

pub mod filters;

pub use consumer::{ChainItem, Consumer, Filter, OperationFilter};
pub use history::{
    AccountHistory, FinishReason, HistorySummary, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES,
};
pub use moment::ChainMoment;
pub use source::{HistorySource, TransportError};
pub use transaction::{group_batch, Operation, RawOperation, Transaction};
