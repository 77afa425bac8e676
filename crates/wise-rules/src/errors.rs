use std::fmt;

use thiserror::Error;
use wise_chain::TransportError;

/// One rule refused a voteorder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{rule}: {reason}")]
pub struct ValidationException {
    /// Variant name, see `Rule::kind`.
    pub rule: &'static str,
    pub reason: String,
}

impl ValidationException {
    pub fn new(rule: &'static str, reason: impl Into<String>) -> Self {
        Self {
            rule,
            reason: reason.into(),
        }
    }
}

/// First failing rule of one ruleset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesetFailure {
    pub ruleset: String,
    pub failure: ValidationException,
}

/// Why a voteorder was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No `set_rules` binds this (delegator, voter) pair, or it is empty.
    NoRulesDefined,
    /// Rules exist but every ruleset refused. One entry per ruleset, in order.
    NoRulesetMatched(Vec<RulesetFailure>),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoRulesDefined => f.write_str("no rules defined"),
            Rejection::NoRulesetMatched(failures) => {
                f.write_str("no ruleset matched")?;
                for (i, rf) in failures.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { "; " };
                    write!(f, "{sep}[{}] {}", rf.ruleset, rf.failure)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted { ruleset: String },
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }

    /// Text carried by a `confirm_vote`: empty when accepted.
    pub fn message(&self) -> String {
        match self {
            Verdict::Accepted { .. } => String::new(),
            Verdict::Rejected(r) => r.to_string(),
        }
    }
}

/// Validation could not reach a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    /// The voteorder itself is malformed; no rule was consulted.
    #[error("invalid voteorder: {0}")]
    InvalidVoteorder(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("validation of voteorder {tx_id} failed: {source}")]
    Validation {
        tx_id: String,
        #[source]
        source: ValidatorError,
    },
}
