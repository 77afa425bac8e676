//! Pure rule evaluation.
//!
//! # Invariants
//!
//! - Evaluation never performs IO; custom RPC verdicts arrive pre-fetched in
//!   the [`RuleContext`].
//! - A ruleset accepts iff every rule accepts. Rules run in declared order and
//!   the first failure is reported.
//! - A voteorder is accepted iff at least one ruleset accepts. Rulesets are
//!   tried in declared order; the first accepting one is named in the verdict.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use wise_schemas::{
    AgeOfPostMode, AgeOfPostRule, AuthorsMode, AuthorsRule, CustomRpcRule, PostMetadata, Rule,
    Ruleset, SetRules, TagsMode, TagsRule, VoteOrder, WeightMode, WeightRule,
};

use crate::{Rejection, RulesetFailure, ValidationException, Verdict};

/// Everything a rule may look at besides the voteorder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleContext {
    /// When the voteorder was issued.
    pub timestamp: DateTime<Utc>,
    pub post: PostMetadata,
    pub rpc_verdicts: BTreeMap<CustomRpcRule, bool>,
}

impl RuleContext {
    pub fn new(timestamp: DateTime<Utc>, post: PostMetadata) -> Self {
        Self {
            timestamp,
            post,
            rpc_verdicts: BTreeMap::new(),
        }
    }

    pub fn with_rpc_verdict(mut self, rule: CustomRpcRule, accepted: bool) -> Self {
        self.rpc_verdicts.insert(rule, accepted);
        self
    }

    /// Seconds from post creation to the voteorder.
    pub fn post_age_secs(&self) -> i64 {
        (self.timestamp - self.post.created).num_seconds()
    }
}

pub trait Validate {
    fn validate(&self, voteorder: &VoteOrder, ctx: &RuleContext) -> Result<(), ValidationException>;
}

impl Validate for WeightRule {
    fn validate(&self, voteorder: &VoteOrder, _ctx: &RuleContext) -> Result<(), ValidationException> {
        match self.mode {
            WeightMode::SingleVoteWeight => {
                if (self.min..=self.max).contains(&voteorder.weight) {
                    Ok(())
                } else {
                    Err(ValidationException::new(
                        "WeightRule",
                        format!(
                            "weight {} is outside [{}, {}]",
                            voteorder.weight, self.min, self.max
                        ),
                    ))
                }
            }
        }
    }
}

impl Validate for TagsRule {
    fn validate(&self, _voteorder: &VoteOrder, ctx: &RuleContext) -> Result<(), ValidationException> {
        let intersects = ctx.post.has_any_tag(&self.tags);
        match self.mode {
            TagsMode::Require if !intersects => Err(ValidationException::new(
                "TagsRule",
                format!("post has none of the required tags {:?}", self.tags),
            )),
            TagsMode::Deny if intersects => Err(ValidationException::new(
                "TagsRule",
                format!("post has a denied tag (one of {:?})", self.tags),
            )),
            _ => Ok(()),
        }
    }
}

impl Validate for AuthorsRule {
    fn validate(&self, voteorder: &VoteOrder, _ctx: &RuleContext) -> Result<(), ValidationException> {
        let listed = self.authors.iter().any(|a| *a == voteorder.author);
        match self.mode {
            AuthorsMode::Allow if !listed => Err(ValidationException::new(
                "AuthorsRule",
                format!("author @{} is not allowed", voteorder.author),
            )),
            AuthorsMode::Deny if listed => Err(ValidationException::new(
                "AuthorsRule",
                format!("author @{} is denied", voteorder.author),
            )),
            _ => Ok(()),
        }
    }
}

impl Validate for AgeOfPostRule {
    fn validate(&self, _voteorder: &VoteOrder, ctx: &RuleContext) -> Result<(), ValidationException> {
        let age = ctx.post_age_secs();
        let threshold = self.threshold_secs();
        match self.mode {
            AgeOfPostMode::OlderThan if age <= threshold => Err(ValidationException::new(
                "AgeOfPostRule",
                format!("post is {age}s old, must be older than {threshold}s"),
            )),
            AgeOfPostMode::YoungerThan if age >= threshold => Err(ValidationException::new(
                "AgeOfPostRule",
                format!("post is {age}s old, must be younger than {threshold}s"),
            )),
            _ => Ok(()),
        }
    }
}

impl Validate for CustomRpcRule {
    fn validate(&self, _voteorder: &VoteOrder, ctx: &RuleContext) -> Result<(), ValidationException> {
        match ctx.rpc_verdicts.get(self) {
            Some(true) => Ok(()),
            Some(false) => Err(ValidationException::new(
                "CustomRPCRule",
                format!("{}{} ({}) refused", self.host, self.path, self.method),
            )),
            None => Err(ValidationException::new(
                "CustomRPCRule",
                format!("no verdict from {}{}", self.host, self.path),
            )),
        }
    }
}

impl Validate for Rule {
    fn validate(&self, voteorder: &VoteOrder, ctx: &RuleContext) -> Result<(), ValidationException> {
        match self {
            Rule::Weight(r) => r.validate(voteorder, ctx),
            Rule::Tags(r) => r.validate(voteorder, ctx),
            Rule::Authors(r) => r.validate(voteorder, ctx),
            Rule::AgeOfPost(r) => r.validate(voteorder, ctx),
            Rule::CustomRpc(r) => r.validate(voteorder, ctx),
        }
    }
}

pub fn validate_ruleset(
    ruleset: &Ruleset,
    voteorder: &VoteOrder,
    ctx: &RuleContext,
) -> Result<(), ValidationException> {
    ruleset
        .rules
        .iter()
        .try_for_each(|rule| rule.validate(voteorder, ctx))
}

/// Evaluate a voteorder against the binding rules.
pub fn evaluate(set_rules: &SetRules, voteorder: &VoteOrder, ctx: &RuleContext) -> Verdict {
    if set_rules.is_empty() {
        return Verdict::Rejected(Rejection::NoRulesDefined);
    }

    let mut failures = Vec::with_capacity(set_rules.rulesets.len());
    for ruleset in &set_rules.rulesets {
        match validate_ruleset(ruleset, voteorder, ctx) {
            Ok(()) => {
                return Verdict::Accepted {
                    ruleset: ruleset.name.clone(),
                }
            }
            Err(failure) => failures.push(RulesetFailure {
                ruleset: ruleset.name.clone(),
                failure,
            }),
        }
    }
    Verdict::Rejected(Rejection::NoRulesetMatched(failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wise_schemas::TimeUnit;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn post(tags: &[&str], created: i64) -> PostMetadata {
        PostMetadata {
            author: "writer".into(),
            permlink: "a-post".into(),
            created: ts(created),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn vo(weight: i32) -> VoteOrder {
        VoteOrder {
            delegator: "del".into(),
            voter: "vot".into(),
            author: "writer".into(),
            permlink: "a-post".into(),
            weight,
            transaction_id: "t".into(),
        }
    }

    fn ctx(tags: &[&str]) -> RuleContext {
        RuleContext::new(ts(10_000), post(tags, 0))
    }

    #[test]
    fn weight_bounds_are_inclusive() {
        let r = WeightRule::new(0, 100);
        assert!(r.validate(&vo(0), &ctx(&[])).is_ok());
        assert!(r.validate(&vo(100), &ctx(&[])).is_ok());
        assert!(r.validate(&vo(101), &ctx(&[])).is_err());
        assert!(r.validate(&vo(-1), &ctx(&[])).is_err());
    }

    #[test]
    fn tags_require_and_deny_use_intersection() {
        let require = TagsRule::require(["x", "y"]);
        assert!(require.validate(&vo(1), &ctx(&["y", "z"])).is_ok());
        assert!(require.validate(&vo(1), &ctx(&["z"])).is_err());

        let deny = TagsRule::deny(["nsfw"]);
        assert!(deny.validate(&vo(1), &ctx(&["art"])).is_ok());
        assert!(deny.validate(&vo(1), &ctx(&["art", "nsfw"])).is_err());
    }

    #[test]
    fn authors_allow_and_deny() {
        assert!(AuthorsRule::allow(["writer"]).validate(&vo(1), &ctx(&[])).is_ok());
        assert!(AuthorsRule::allow(["other"]).validate(&vo(1), &ctx(&[])).is_err());
        assert!(AuthorsRule::deny(["writer"]).validate(&vo(1), &ctx(&[])).is_err());
        assert!(AuthorsRule::deny(["other"]).validate(&vo(1), &ctx(&[])).is_ok());
    }

    #[test]
    fn age_comparisons_are_strict() {
        // post created at 0, voteorder at 10_000s.
        let c = ctx(&[]);
        assert!(AgeOfPostRule::older_than(9_999, TimeUnit::Second).validate(&vo(1), &c).is_ok());
        assert!(AgeOfPostRule::older_than(10_000, TimeUnit::Second).validate(&vo(1), &c).is_err());
        assert!(AgeOfPostRule::younger_than(10_001, TimeUnit::Second).validate(&vo(1), &c).is_ok());
        assert!(AgeOfPostRule::younger_than(10_000, TimeUnit::Second).validate(&vo(1), &c).is_err());
        assert!(AgeOfPostRule::younger_than(1, TimeUnit::Day).validate(&vo(1), &c).is_ok());
    }

    #[test]
    fn custom_rpc_reads_prefetched_verdict() {
        let rule = CustomRpcRule::new("h", "/p", "m", "");
        let yes = ctx(&[]).with_rpc_verdict(rule.clone(), true);
        let no = ctx(&[]).with_rpc_verdict(rule.clone(), false);
        assert!(rule.validate(&vo(1), &yes).is_ok());
        assert_eq!(rule.validate(&vo(1), &no).unwrap_err().rule, "CustomRPCRule");
        assert!(rule.validate(&vo(1), &ctx(&[])).is_err());
    }

    #[test]
    fn ruleset_reports_first_failing_rule() {
        let rs = Ruleset::new(
            "r",
            vec![TagsRule::require(["x"]).into(), WeightRule::new(0, 10).into()],
        );
        let err = validate_ruleset(&rs, &vo(50), &ctx(&[])).unwrap_err();
        assert_eq!(err.rule, "TagsRule");
    }

    #[test]
    fn empty_rules_and_unmatched_rules_are_distinct() {
        assert_eq!(
            evaluate(&SetRules::empty(), &vo(1), &ctx(&[])),
            Verdict::Rejected(Rejection::NoRulesDefined)
        );

        let rules = SetRules::new(vec![Ruleset::new("r", vec![WeightRule::new(0, 100).into()])]);
        match evaluate(&rules, &vo(150), &ctx(&[])) {
            Verdict::Rejected(Rejection::NoRulesetMatched(f)) => {
                assert_eq!(f.len(), 1);
                assert_eq!(f[0].ruleset, "r");
            }
            other => panic!("unexpected verdict {other:?}"),
        }
        assert!(evaluate(&rules, &vo(50), &ctx(&[])).is_accepted());
    }

    #[test]
    fn any_accepting_ruleset_suffices() {
        let rules = SetRules::new(vec![
            Ruleset::new("strict", vec![WeightRule::new(0, 10).into()]),
            Ruleset::new("loose", vec![WeightRule::new(0, 1_000).into()]),
        ]);
        assert_eq!(
            evaluate(&rules, &vo(500), &ctx(&[])),
            Verdict::Accepted {
                ruleset: "loose".into()
            }
        );
    }
}
