use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wise_chain::ChainMoment;

use crate::Rule;

/// A named group of rules that must all pass together.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ruleset {
    pub name: String,
    pub rules: Vec<Rule>,
}

impl Ruleset {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    pub fn normalized(&self) -> Ruleset {
        Ruleset {
            name: self.name.clone(),
            rules: self.rules.iter().map(Rule::normalized).collect(),
        }
    }
}

/// Full replacement of one voter's rulesets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SetRules {
    pub rulesets: Vec<Ruleset>,
}

impl SetRules {
    pub fn new(rulesets: Vec<Ruleset>) -> Self {
        Self { rulesets }
    }

    /// The revocation target: no rulesets at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rulesets.is_empty()
    }

    pub fn ruleset(&self, name: &str) -> Option<&Ruleset> {
        self.rulesets.iter().find(|r| r.name == name)
    }

    /// Structural equality with tag/author lists compared as sets.
    ///
    /// Ruleset order and rule order inside a ruleset stay significant.
    pub fn same_configuration(&self, other: &SetRules) -> bool {
        self.rulesets.len() == other.rulesets.len()
            && self
                .rulesets
                .iter()
                .zip(other.rulesets.iter())
                .all(|(a, b)| a.normalized() == b.normalized())
    }
}

/// Body of a `send_voteorder` command. The voter is the sender.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SendVoteorder {
    pub delegator: String,
    pub author: String,
    pub permlink: String,
    /// Vote weight in basis points (10000 = 100%).
    pub weight: i32,
}

/// Body of a `confirm_vote` command. The delegator is the sender.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfirmVote {
    pub voteorder_tx_id: String,
    pub accepted: bool,
    pub msg: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    SetRules(SetRules),
    SendVoteorder(SendVoteorder),
    ConfirmVote(ConfirmVote),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetRules(_) => "set_rules",
            Command::SendVoteorder(_) => "send_voteorder",
            Command::ConfirmVote(_) => "confirm_vote",
        }
    }
}

/// A request to cast a vote, resolved with both parties and its source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteOrder {
    pub delegator: String,
    pub voter: String,
    pub author: String,
    pub permlink: String,
    pub weight: i32,
    pub transaction_id: String,
}

/// A decoded command as it sits on chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectuatedCommand {
    pub moment: ChainMoment,
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub delegator: String,
    pub voter: String,
    pub command: Command,
}

impl EffectuatedCommand {
    pub fn as_set_rules(&self) -> Option<EffectuatedSetRules> {
        match &self.command {
            Command::SetRules(set_rules) => Some(EffectuatedSetRules {
                moment: self.moment,
                voter: self.voter.clone(),
                set_rules: set_rules.clone(),
            }),
            _ => None,
        }
    }

    pub fn as_voteorder(&self) -> Option<VoteOrder> {
        match &self.command {
            Command::SendVoteorder(body) => Some(VoteOrder {
                delegator: body.delegator.clone(),
                voter: self.voter.clone(),
                author: body.author.clone(),
                permlink: body.permlink.clone(),
                weight: body.weight,
                transaction_id: self.transaction_id.clone(),
            }),
            _ => None,
        }
    }
}

/// The last `set_rules` for one voter, with the moment it took effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectuatedSetRules {
    pub moment: ChainMoment,
    pub voter: String,
    pub set_rules: SetRules,
}
