//! Push-side consumers.
//!
//! A consumer receives items one at a time and answers whether it wants more.
//! Returning `false` is the only cancellation primitive: the producer must not
//! fetch anything further once it sees it.
//!
//! Consumers own their downstream; there is no back-reference from a producer
//! into the chain beyond the `&mut` borrow held for one `run`.

use crate::{Operation, Transaction, TransportError};

/// An item delivered into a consumer chain. Transport failures travel in-band.
pub type ChainItem<T> = Result<T, TransportError>;

pub trait Consumer<T> {
    /// Take one item. Return `true` to keep receiving.
    fn consume(&mut self, item: ChainItem<T>) -> bool;
}

impl<T, F> Consumer<T> for F
where
    F: FnMut(ChainItem<T>) -> bool,
{
    fn consume(&mut self, item: ChainItem<T>) -> bool {
        self(item)
    }
}

/// Forwards items matching `predicate`; swallows the rest.
///
/// Errors are always forwarded so the terminal consumer can decide whether to
/// halt. A swallowed item answers `true`: filtering is not a reason to stop.
pub struct Filter<P, C> {
    predicate: P,
    downstream: C,
}

impl<P, C> Filter<P, C> {
    pub fn new(predicate: P, downstream: C) -> Self {
        Self {
            predicate,
            downstream,
        }
    }

    pub fn into_inner(self) -> C {
        self.downstream
    }
}

impl<T, P, C> Consumer<T> for Filter<P, C>
where
    P: FnMut(&T) -> bool,
    C: Consumer<T>,
{
    fn consume(&mut self, item: ChainItem<T>) -> bool {
        match item {
            Ok(t) if !(self.predicate)(&t) => true,
            other => self.downstream.consume(other),
        }
    }
}

/// Narrows each transaction to the operations matching `predicate`.
///
/// A transaction left with no operations is not forwarded.
pub struct OperationFilter<P, C> {
    predicate: P,
    downstream: C,
}

impl<P, C> OperationFilter<P, C> {
    pub fn new(predicate: P, downstream: C) -> Self {
        Self {
            predicate,
            downstream,
        }
    }

    pub fn into_inner(self) -> C {
        self.downstream
    }
}

impl<P, C> Consumer<Transaction> for OperationFilter<P, C>
where
    P: FnMut(&Transaction, &Operation) -> bool,
    C: Consumer<Transaction>,
{
    fn consume(&mut self, item: ChainItem<Transaction>) -> bool {
        let mut trx = match item {
            Ok(trx) => trx,
            Err(e) => return self.downstream.consume(Err(e)),
        };

        let ops = std::mem::take(&mut trx.ops);
        let mut kept = Vec::with_capacity(ops.len());
        for op in ops {
            if (self.predicate)(&trx, &op) {
                kept.push(op);
            }
        }

        if kept.is_empty() {
            return true;
        }
        trx.ops = kept;
        self.downstream.consume(Ok(trx))
    }
}
