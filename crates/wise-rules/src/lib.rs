//! wise-rules
//!
//! Voteorder validation.
//!
//! Architectural decisions:
//! - Rule evaluation is pure: a voteorder, the binding rules and a fully
//!   pre-fetched [`RuleContext`] in, a [`Verdict`] out. No IO during evaluation.
//! - The rule set is a closed enum; [`Validate`] is matched exhaustively.
//! - A voteorder is accepted iff at least one binding ruleset accepts it.
//! - "No rules defined" and "no ruleset matched" are distinct rejections.
//! - Binding rules are the latest `set_rules` at or before the voteorder's
//!   moment, resolvable from decoded commands ([`resolve_binding`]), from an
//!   index ([`wise_protocol::RulesReader`]) or straight from chain history
//!   ([`ChainRulesReader`]).
//!
//! IO lives only in [`Validator`], [`ChainRulesReader`] and [`Confirmer`],
//! behind collaborator traits.

mod binding;
mod chain_reader;
mod confirmer;
mod engine;
mod errors;
mod validator;

pub use binding::resolve_binding;
pub use chain_reader::ChainRulesReader;
pub use confirmer::{ConfirmedVote, Confirmer};
pub use engine::{evaluate, validate_ruleset, RuleContext, Validate};
pub use errors::{ConfirmError, Rejection, RulesetFailure, ValidationException, ValidatorError, Verdict};
pub use validator::{Validator, MAX_VOTE_WEIGHT};
