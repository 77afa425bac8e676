use std::collections::BTreeMap;

use thiserror::Error;
use wise_chain::{ChainMoment, TransportError};
use wise_schemas::{ConfigError, SetRules};

/// What a publish does to one voter's rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    /// Voter has no rules on chain yet.
    Added,
    /// Voter has rules on chain that differ from the desired ones.
    Modified,
    /// Voter keeps no rules: publish an empty `set_rules`.
    Revoked,
}

/// One corrective `set_rules`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoterChange {
    pub voter: String,
    pub kind: ChangeKind,
    /// Full replacement, exactly what gets published.
    pub target: SetRules,
}

/// Minimal set of publishes, ordered by voter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub changes: Vec<VoterChange>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn voters(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.voter.as_str()).collect()
    }
}

/// Per-voter publish results of one applied plan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub published: BTreeMap<String, ChainMoment>,
    pub failed: BTreeMap<String, TransportError>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Observed state already matches; nothing was published.
    NoChanges,
    Applied(SyncReport),
}

impl SyncOutcome {
    pub fn is_no_changes(&self) -> bool {
        matches!(self, SyncOutcome::NoChanges)
    }
}

/// A pass that could not start. Per-voter publish failures are in the report
/// instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("reading observed rules failed: {0}")]
    Observe(#[from] TransportError),
}
