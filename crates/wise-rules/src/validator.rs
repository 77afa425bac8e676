use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, info};
use wise_chain::ChainMoment;
use wise_protocol::{CustomRpcClient, PostLoader, RulesReader};
use wise_schemas::{CustomRpcRule, Rule, SetRules, VoteOrder};

use crate::{evaluate, Rejection, RuleContext, ValidatorError, Verdict};

/// Largest absolute vote weight, in basis points.
pub const MAX_VOTE_WEIGHT: i32 = 10_000;

/// Resolves binding rules and context for a voteorder, then evaluates it.
///
/// All IO happens before evaluation starts. A transport failure anywhere is a
/// [`ValidatorError`], never a rejection. A voteorder for a post that does not
/// exist is [`ValidatorError::InvalidVoteorder`].
pub struct Validator {
    rules: Arc<dyn RulesReader>,
    posts: Arc<dyn PostLoader>,
    rpc: Arc<dyn CustomRpcClient>,
}

impl Validator {
    pub fn new(
        rules: Arc<dyn RulesReader>,
        posts: Arc<dyn PostLoader>,
        rpc: Arc<dyn CustomRpcClient>,
    ) -> Self {
        Self { rules, posts, rpc }
    }

    /// Validate a voteorder issued at `moment` / `timestamp`.
    pub async fn validate(
        &self,
        voteorder: &VoteOrder,
        moment: ChainMoment,
        timestamp: DateTime<Utc>,
    ) -> Result<Verdict, ValidatorError> {
        check_voteorder(voteorder)?;

        let set_rules = self
            .rules
            .query_rulesets(&voteorder.delegator, &voteorder.voter, moment)
            .await?;
        debug!(
            reader = self.rules.name(),
            delegator = %voteorder.delegator,
            voter = %voteorder.voter,
            %moment,
            rulesets = set_rules.rulesets.len(),
            "binding rules resolved"
        );

        let verdict = if set_rules.is_empty() {
            Verdict::Rejected(Rejection::NoRulesDefined)
        } else {
            let post = self
                .posts
                .load_post(&voteorder.author, &voteorder.permlink)
                .await?
                .ok_or_else(|| {
                    ValidatorError::InvalidVoteorder(format!(
                        "post @{}/{} does not exist",
                        voteorder.author, voteorder.permlink
                    ))
                })?;
            let mut ctx = RuleContext::new(timestamp, post);
            for (rule, accepted) in self.fetch_rpc_verdicts(&set_rules, voteorder).await? {
                ctx.rpc_verdicts.insert(rule, accepted);
            }
            evaluate(&set_rules, voteorder, &ctx)
        };

        info!(
            delegator = %voteorder.delegator,
            voter = %voteorder.voter,
            trx_id = %voteorder.transaction_id,
            accepted = verdict.is_accepted(),
            detail = %verdict.message(),
            "voteorder validated"
        );
        Ok(verdict)
    }

    /// One call per distinct custom RPC rule, issued concurrently.
    async fn fetch_rpc_verdicts(
        &self,
        set_rules: &SetRules,
        voteorder: &VoteOrder,
    ) -> Result<Vec<(CustomRpcRule, bool)>, ValidatorError> {
        let rpc_rules: BTreeSet<&CustomRpcRule> = set_rules
            .rulesets
            .iter()
            .flat_map(|rs| rs.rules.iter())
            .filter_map(|rule| match rule {
                Rule::CustomRpc(r) => Some(r),
                _ => None,
            })
            .collect();
        if rpc_rules.is_empty() {
            return Ok(Vec::new());
        }

        let calls = rpc_rules.iter().map(|rule| self.rpc.call(rule, voteorder));
        let answers = join_all(calls).await;

        rpc_rules
            .into_iter()
            .zip(answers)
            .map(|(rule, answer)| -> Result<(CustomRpcRule, bool), ValidatorError> {
                Ok((rule.clone(), answer?))
            })
            .collect()
    }
}

fn check_voteorder(voteorder: &VoteOrder) -> Result<(), ValidatorError> {
    if voteorder.delegator.is_empty() || voteorder.voter.is_empty() {
        return Err(ValidatorError::InvalidVoteorder(
            "delegator and voter must be set".into(),
        ));
    }
    if voteorder.author.is_empty() || voteorder.permlink.is_empty() {
        return Err(ValidatorError::InvalidVoteorder(
            "author and permlink must be set".into(),
        ));
    }
    if voteorder.weight.unsigned_abs() > MAX_VOTE_WEIGHT.unsigned_abs() {
        return Err(ValidatorError::InvalidVoteorder(format!(
            "weight {} exceeds +/-{MAX_VOTE_WEIGHT}",
            voteorder.weight
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vo(weight: i32) -> VoteOrder {
        VoteOrder {
            delegator: "del".into(),
            voter: "vot".into(),
            author: "a".into(),
            permlink: "p".into(),
            weight,
            transaction_id: "t".into(),
        }
    }

    #[test]
    fn weight_range_is_checked_before_rules() {
        assert!(check_voteorder(&vo(MAX_VOTE_WEIGHT)).is_ok());
        assert!(check_voteorder(&vo(-MAX_VOTE_WEIGHT)).is_ok());
        assert!(matches!(
            check_voteorder(&vo(MAX_VOTE_WEIGHT + 1)),
            Err(ValidatorError::InvalidVoteorder(_))
        ));
    }

    #[test]
    fn empty_permlink_is_invalid() {
        let mut v = vo(1);
        v.permlink.clear();
        assert!(check_voteorder(&v).is_err());
    }
}
