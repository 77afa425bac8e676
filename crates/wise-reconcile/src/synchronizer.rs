use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{info, warn};
use wise_chain::{ChainMoment, TransportError};
use wise_protocol::{Broadcaster, CommandEnvelope, Protocol, RulesIndex};
use wise_schemas::{Command, DesiredState, ObservedState};

use crate::{diff, ReconcilePlan, SyncError, SyncOutcome, SyncReport, VoterChange};

/// Keeps one delegator's on-chain rules equal to a desired state.
pub struct Synchronizer {
    delegator: String,
    index: Arc<dyn RulesIndex>,
    broadcaster: Arc<dyn Broadcaster>,
    protocol: Protocol,
}

impl Synchronizer {
    pub fn new(
        delegator: impl Into<String>,
        index: Arc<dyn RulesIndex>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            delegator: delegator.into(),
            index,
            broadcaster,
            protocol: Protocol::new(),
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn delegator(&self) -> &str {
        &self.delegator
    }

    /// Current rules of every voter, as of the latest confirmed state.
    pub async fn observe(&self) -> Result<ObservedState, TransportError> {
        let all = self
            .index
            .query_all_rulesets(&self.delegator, ChainMoment::FUTURE)
            .await?;
        Ok(all.into_values().collect())
    }

    /// Validate, observe and diff. Publishes nothing.
    pub async fn plan(&self, desired: &DesiredState) -> Result<ReconcilePlan, SyncError> {
        desired.validate()?;
        let observed = self.observe().await?;
        Ok(diff(desired, &observed))
    }

    /// Publish the minimal set of `set_rules` making observed == desired.
    pub async fn reconcile(&self, desired: &DesiredState) -> Result<SyncOutcome, SyncError> {
        let plan = self.plan(desired).await?;
        if plan.is_empty() {
            info!(delegator = %self.delegator, "rules already in sync");
            return Ok(SyncOutcome::NoChanges);
        }

        info!(
            delegator = %self.delegator,
            voters = ?plan.voters(),
            "publishing rules changes"
        );

        // Plan holds at most one change per voter, so no voter sees two
        // concurrent publishes.
        let results = join_all(plan.changes.iter().map(|change| self.publish(change))).await;

        let mut report = SyncReport::default();
        for (change, result) in plan.changes.iter().zip(results) {
            match result {
                Ok(moment) => {
                    info!(
                        delegator = %self.delegator,
                        voter = %change.voter,
                        kind = ?change.kind,
                        %moment,
                        "set_rules published"
                    );
                    report.published.insert(change.voter.clone(), moment);
                }
                Err(e) => {
                    warn!(
                        delegator = %self.delegator,
                        voter = %change.voter,
                        kind = ?change.kind,
                        error = %e,
                        "set_rules publish failed"
                    );
                    report.failed.insert(change.voter.clone(), e);
                }
            }
        }
        Ok(SyncOutcome::Applied(report))
    }

    async fn publish(&self, change: &VoterChange) -> Result<ChainMoment, TransportError> {
        let envelope = CommandEnvelope::new(
            self.delegator.as_str(),
            change.voter.as_str(),
            Command::SetRules(change.target.clone()),
        );
        self.broadcaster
            .broadcast(vec![self.protocol.encode(&envelope)])
            .await
    }
}
