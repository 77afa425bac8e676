//! Protocol v2 (current).
//!
//! custom_json id `wise`; commands are `["v2:<name>", {body}]`; rules are
//! objects tagged by `rule`.
//!
//! ```text
//! ["v2:set_rules", {"voter": "..", "rulesets": [{"name": "..", "rules": [
//!     {"rule": "weight", "mode": "single_vote_weight", "min": 0, "max": 100},
//!     {"rule": "tags", "mode": "require", "tags": ["x"]},
//!     {"rule": "age_of_post", "mode": "older_than", "value": 2, "unit": "day"}
//! ]}]}]
//! ["v2:send_voteorder", {"delegator": "..", "author": "..", "permlink": "..", "weight": 5000}]
//! ["v2:confirm_vote", {"voter": "..", "tx_id": "..", "accepted": true, "msg": ""}]
//! ```

use serde::Deserialize;
use serde_json::{json, Value};
use wise_schemas::{
    AgeOfPostMode, AgeOfPostRule, AuthorsMode, AuthorsRule, Command, ConfirmVote, CustomRpcRule,
    Rule, Ruleset, SendVoteorder, SetRules, TagsMode, TagsRule, TimeUnit, WeightMode, WeightRule,
};

use crate::{CommandEnvelope, SchemaError};

pub(crate) const VERSION: &str = "v2";
pub(crate) const CUSTOM_JSON_ID: &str = "wise";

const RULE_TAGS: &[&str] = &["weight", "tags", "authors", "age_of_post", "custom_rpc"];

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireWeightMode {
    SingleVoteWeight,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireTagsMode {
    Require,
    Deny,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireAuthorsMode {
    Allow,
    Deny,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireAgeMode {
    OlderThan,
    YoungerThan,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireUnit {
    Day,
    Hour,
    Minute,
    Second,
}

#[derive(Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
enum WireRule {
    Weight {
        mode: WireWeightMode,
        min: i32,
        max: i32,
    },
    Tags {
        mode: WireTagsMode,
        tags: Vec<String>,
    },
    Authors {
        mode: WireAuthorsMode,
        authors: Vec<String>,
    },
    AgeOfPost {
        mode: WireAgeMode,
        value: u32,
        unit: WireUnit,
    },
    CustomRpc {
        host: String,
        path: String,
        method: String,
        params: String,
    },
}

impl From<WireRule> for Rule {
    fn from(w: WireRule) -> Self {
        match w {
            WireRule::Weight { mode, min, max } => Rule::Weight(WeightRule {
                mode: match mode {
                    WireWeightMode::SingleVoteWeight => WeightMode::SingleVoteWeight,
                },
                min,
                max,
            }),
            WireRule::Tags { mode, tags } => Rule::Tags(TagsRule {
                mode: match mode {
                    WireTagsMode::Require => TagsMode::Require,
                    WireTagsMode::Deny => TagsMode::Deny,
                },
                tags,
            }),
            WireRule::Authors { mode, authors } => Rule::Authors(AuthorsRule {
                mode: match mode {
                    WireAuthorsMode::Allow => AuthorsMode::Allow,
                    WireAuthorsMode::Deny => AuthorsMode::Deny,
                },
                authors,
            }),
            WireRule::AgeOfPost { mode, value, unit } => Rule::AgeOfPost(AgeOfPostRule {
                mode: match mode {
                    WireAgeMode::OlderThan => AgeOfPostMode::OlderThan,
                    WireAgeMode::YoungerThan => AgeOfPostMode::YoungerThan,
                },
                value,
                unit: match unit {
                    WireUnit::Day => TimeUnit::Day,
                    WireUnit::Hour => TimeUnit::Hour,
                    WireUnit::Minute => TimeUnit::Minute,
                    WireUnit::Second => TimeUnit::Second,
                },
            }),
            WireRule::CustomRpc {
                host,
                path,
                method,
                params,
            } => Rule::CustomRpc(CustomRpcRule {
                host,
                path,
                method,
                params,
            }),
        }
    }
}

pub(crate) fn matches_rule(v: &Value) -> bool {
    v.get("rule").map(Value::is_string).unwrap_or(false)
}

pub(crate) fn decode_rule(v: &Value) -> Result<Rule, SchemaError> {
    let tag = v.get("rule").and_then(Value::as_str).unwrap_or_default();
    if !RULE_TAGS.contains(&tag) {
        return Err(SchemaError::UnknownRule {
            version: VERSION,
            tag: tag.to_string(),
        });
    }
    let wire = WireRule::deserialize(v).map_err(|e| SchemaError::malformed(VERSION, e))?;
    Ok(wire.into())
}

pub(crate) fn encode_rule(rule: &Rule) -> Value {
    match rule {
        Rule::Weight(r) => json!({
            "rule": "weight",
            "mode": match r.mode {
                WeightMode::SingleVoteWeight => "single_vote_weight",
            },
            "min": r.min,
            "max": r.max,
        }),
        Rule::Tags(r) => json!({
            "rule": "tags",
            "mode": match r.mode {
                TagsMode::Require => "require",
                TagsMode::Deny => "deny",
            },
            "tags": r.tags,
        }),
        Rule::Authors(r) => json!({
            "rule": "authors",
            "mode": match r.mode {
                AuthorsMode::Allow => "allow",
                AuthorsMode::Deny => "deny",
            },
            "authors": r.authors,
        }),
        Rule::AgeOfPost(r) => json!({
            "rule": "age_of_post",
            "mode": match r.mode {
                AgeOfPostMode::OlderThan => "older_than",
                AgeOfPostMode::YoungerThan => "younger_than",
            },
            "value": r.value,
            "unit": match r.unit {
                TimeUnit::Day => "day",
                TimeUnit::Hour => "hour",
                TimeUnit::Minute => "minute",
                TimeUnit::Second => "second",
            },
        }),
        Rule::CustomRpc(r) => json!({
            "rule": "custom_rpc",
            "host": r.host,
            "path": r.path,
            "method": r.method,
            "params": r.params,
        }),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WireRuleset {
    name: String,
    rules: Vec<Value>,
}

#[derive(Deserialize)]
struct SetRulesBody {
    voter: String,
    rulesets: Vec<WireRuleset>,
}

#[derive(Deserialize)]
struct SendVoteorderBody {
    delegator: String,
    author: String,
    permlink: String,
    weight: i32,
}

#[derive(Deserialize)]
struct ConfirmVoteBody {
    voter: String,
    tx_id: String,
    accepted: bool,
    msg: String,
}

fn command_name(v: &Value) -> Option<&str> {
    let arr = v.as_array()?;
    if arr.len() != 2 || !arr[1].is_object() {
        return None;
    }
    arr[0].as_str()?.strip_prefix("v2:")
}

pub(crate) fn matches_command(v: &Value) -> bool {
    command_name(v).is_some()
}

pub(crate) fn decode_command(sender: &str, v: &Value) -> Result<CommandEnvelope, SchemaError> {
    let name = command_name(v).ok_or(SchemaError::UnrecognizedPayload)?;
    let body = &v[1];
    let malformed = |e| SchemaError::malformed(VERSION, e);

    match name {
        "set_rules" => {
            let b = SetRulesBody::deserialize(body).map_err(malformed)?;
            let rulesets = b
                .rulesets
                .into_iter()
                .map(|rs| {
                    let rules = rs
                        .rules
                        .iter()
                        .map(decode_rule)
                        .collect::<Result<Vec<Rule>, SchemaError>>()?;
                    Ok(Ruleset::new(rs.name, rules))
                })
                .collect::<Result<Vec<Ruleset>, SchemaError>>()?;
            Ok(CommandEnvelope {
                delegator: sender.to_string(),
                voter: b.voter,
                command: Command::SetRules(SetRules::new(rulesets)),
            })
        }
        "send_voteorder" => {
            let b = SendVoteorderBody::deserialize(body).map_err(malformed)?;
            Ok(CommandEnvelope {
                delegator: b.delegator.clone(),
                voter: sender.to_string(),
                command: Command::SendVoteorder(SendVoteorder {
                    delegator: b.delegator,
                    author: b.author,
                    permlink: b.permlink,
                    weight: b.weight,
                }),
            })
        }
        "confirm_vote" => {
            let b = ConfirmVoteBody::deserialize(body).map_err(malformed)?;
            Ok(CommandEnvelope {
                delegator: sender.to_string(),
                voter: b.voter,
                command: Command::ConfirmVote(ConfirmVote {
                    voteorder_tx_id: b.tx_id,
                    accepted: b.accepted,
                    msg: b.msg,
                }),
            })
        }
        other => Err(SchemaError::UnknownCommand {
            version: VERSION,
            name: other.to_string(),
        }),
    }
}

pub(crate) fn encode_command(env: &CommandEnvelope) -> Value {
    match &env.command {
        Command::SetRules(set_rules) => {
            let rulesets: Vec<Value> = set_rules
                .rulesets
                .iter()
                .map(|rs| {
                    json!({
                        "name": rs.name,
                        "rules": rs.rules.iter().map(encode_rule).collect::<Vec<Value>>(),
                    })
                })
                .collect();
            json!(["v2:set_rules", { "voter": env.voter, "rulesets": rulesets }])
        }
        Command::SendVoteorder(vo) => json!([
            "v2:send_voteorder",
            {
                "delegator": vo.delegator,
                "author": vo.author,
                "permlink": vo.permlink,
                "weight": vo.weight,
            }
        ]),
        Command::ConfirmVote(c) => json!([
            "v2:confirm_vote",
            {
                "voter": env.voter,
                "tx_id": c.voteorder_tx_id,
                "accepted": c.accepted,
                "msg": c.msg,
            }
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_unit_is_a_schema_error() {
        let v = json!({ "rule": "age_of_post", "mode": "older_than", "value": 1, "unit": "week" });
        assert!(matches!(decode_rule(&v), Err(SchemaError::Malformed { version: "v2", .. })));
    }

    #[test]
    fn unknown_mode_is_a_schema_error() {
        let v = json!({ "rule": "tags", "mode": "prefer", "tags": [] });
        assert!(matches!(decode_rule(&v), Err(SchemaError::Malformed { .. })));
    }

    #[test]
    fn unknown_rule_tag_is_reported() {
        let v = json!({ "rule": "voting_power", "mode": "x" });
        assert_eq!(
            decode_rule(&v),
            Err(SchemaError::UnknownRule {
                version: "v2",
                tag: "voting_power".into()
            })
        );
    }

    #[test]
    fn command_matcher_requires_prefixed_tuple() {
        assert!(matches_command(&json!(["v2:set_rules", {}])));
        assert!(!matches_command(&json!(["v1:set_rules", {}])));
        assert!(!matches_command(&json!({ "name": "set_rules" })));
        assert!(!matches_command(&json!(["v2:set_rules"])));
    }

    #[test]
    fn unknown_command_name_is_reported() {
        let v = json!(["v2:delete_everything", {}]);
        assert!(matches!(
            decode_command("alice", &v),
            Err(SchemaError::UnknownCommand { version: "v2", .. })
        ));
    }
}
