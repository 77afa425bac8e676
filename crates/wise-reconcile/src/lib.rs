//! wise-reconcile
//!
//! Rules synchronization: bring a delegator's on-chain rules to a desired
//! state with the fewest publishes.
//!
//! Architectural decisions:
//! - Desired state is validated before anything is read or published
//! - Observed state is read fresh from the index on every pass, never cached
//! - Diff is pure and deterministic (voters in name order)
//! - One full-replace `set_rules` per changed voter; unchanged voters cost
//!   nothing, so a second pass over the same desired state publishes nothing
//! - Voters only present on chain are revoked (reconciled to empty rulesets)
//! - A failed publish for one voter never blocks the others

mod engine;
mod synchronizer;
mod types;

pub use engine::diff;
pub use synchronizer::Synchronizer;
pub use types::*;
