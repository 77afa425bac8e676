//! Protocol v1 (legacy, decode and re-encode only).
//!
//! custom_json id `smartvote`; commands are objects carrying a `name` field;
//! rules are objects tagged by `type`. Age units are plural (`days`).

use serde::Deserialize;
use serde_json::{json, Value};
use wise_schemas::{
    AgeOfPostMode, AgeOfPostRule, AuthorsMode, AuthorsRule, Command, ConfirmVote, CustomRpcRule,
    Rule, Ruleset, SendVoteorder, SetRules, TagsMode, TagsRule, TimeUnit, WeightMode, WeightRule,
};

use crate::{CommandEnvelope, SchemaError};

pub(crate) const VERSION: &str = "v1";
pub(crate) const CUSTOM_JSON_ID: &str = "smartvote";

const RULE_TAGS: &[&str] = &["weight", "tags", "authors", "age_of_post", "custom_rpc"];

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum V1WeightMode {
    SingleVoteWeight,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum V1ListMode {
    Allow,
    Deny,
    Require,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum V1AgeMode {
    OlderThan,
    YoungerThan,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum V1Unit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum V1Rule {
    Weight {
        mode: V1WeightMode,
        min: i32,
        max: i32,
    },
    Tags {
        mode: V1ListMode,
        tags: Vec<String>,
    },
    Authors {
        mode: V1ListMode,
        authors: Vec<String>,
    },
    AgeOfPost {
        mode: V1AgeMode,
        value: u32,
        unit: V1Unit,
    },
    CustomRpc {
        rpc_host: String,
        rpc_path: String,
        rpc_method: String,
        rpc_params: String,
    },
}

impl TryFrom<V1Rule> for Rule {
    type Error = SchemaError;

    fn try_from(w: V1Rule) -> Result<Self, SchemaError> {
        let rule = match w {
            V1Rule::Weight { mode, min, max } => Rule::Weight(WeightRule {
                mode: match mode {
                    V1WeightMode::SingleVoteWeight => WeightMode::SingleVoteWeight,
                },
                min,
                max,
            }),
            V1Rule::Tags { mode, tags } => {
                let mode = match mode {
                    V1ListMode::Require => TagsMode::Require,
                    V1ListMode::Deny => TagsMode::Deny,
                    V1ListMode::Allow => {
                        return Err(SchemaError::malformed(VERSION, "tags mode 'allow'"))
                    }
                };
                Rule::Tags(TagsRule { mode, tags })
            }
            V1Rule::Authors { mode, authors } => {
                let mode = match mode {
                    V1ListMode::Allow => AuthorsMode::Allow,
                    V1ListMode::Deny => AuthorsMode::Deny,
                    V1ListMode::Require => {
                        return Err(SchemaError::malformed(VERSION, "authors mode 'require'"))
                    }
                };
                Rule::Authors(AuthorsRule { mode, authors })
            }
            V1Rule::AgeOfPost { mode, value, unit } => Rule::AgeOfPost(AgeOfPostRule {
                mode: match mode {
                    V1AgeMode::OlderThan => AgeOfPostMode::OlderThan,
                    V1AgeMode::YoungerThan => AgeOfPostMode::YoungerThan,
                },
                value,
                unit: match unit {
                    V1Unit::Days => TimeUnit::Day,
                    V1Unit::Hours => TimeUnit::Hour,
                    V1Unit::Minutes => TimeUnit::Minute,
                    V1Unit::Seconds => TimeUnit::Second,
                },
            }),
            V1Rule::CustomRpc {
                rpc_host,
                rpc_path,
                rpc_method,
                rpc_params,
            } => Rule::CustomRpc(CustomRpcRule {
                host: rpc_host,
                path: rpc_path,
                method: rpc_method,
                params: rpc_params,
            }),
        };
        Ok(rule)
    }
}

pub(crate) fn matches_rule(v: &Value) -> bool {
    v.get("type").map(Value::is_string).unwrap_or(false)
}

pub(crate) fn decode_rule(v: &Value) -> Result<Rule, SchemaError> {
    let tag = v.get("type").and_then(Value::as_str).unwrap_or_default();
    if !RULE_TAGS.contains(&tag) {
        return Err(SchemaError::UnknownRule {
            version: VERSION,
            tag: tag.to_string(),
        });
    }
    V1Rule::deserialize(v)
        .map_err(|e| SchemaError::malformed(VERSION, e))?
        .try_into()
}

pub(crate) fn encode_rule(rule: &Rule) -> Value {
    match rule {
        Rule::Weight(r) => json!({
            "type": "weight",
            "mode": match r.mode {
                WeightMode::SingleVoteWeight => "single_vote_weight",
            },
            "min": r.min,
            "max": r.max,
        }),
        Rule::Tags(r) => json!({
            "type": "tags",
            "mode": match r.mode {
                TagsMode::Require => "require",
                TagsMode::Deny => "deny",
            },
            "tags": r.tags,
        }),
        Rule::Authors(r) => json!({
            "type": "authors",
            "mode": match r.mode {
                AuthorsMode::Allow => "allow",
                AuthorsMode::Deny => "deny",
            },
            "authors": r.authors,
        }),
        Rule::AgeOfPost(r) => json!({
            "type": "age_of_post",
            "mode": match r.mode {
                AgeOfPostMode::OlderThan => "older_than",
                AgeOfPostMode::YoungerThan => "younger_than",
            },
            "value": r.value,
            "unit": match r.unit {
                TimeUnit::Day => "days",
                TimeUnit::Hour => "hours",
                TimeUnit::Minute => "minutes",
                TimeUnit::Second => "seconds",
            },
        }),
        Rule::CustomRpc(r) => json!({
            "type": "custom_rpc",
            "rpc_host": r.host,
            "rpc_path": r.path,
            "rpc_method": r.method,
            "rpc_params": r.params,
        }),
    }
}

#[derive(Deserialize)]
struct V1Ruleset {
    name: String,
    rules: Vec<Value>,
}

#[derive(Deserialize)]
struct V1SetRules {
    voter: String,
    rulesets: Vec<V1Ruleset>,
}

#[derive(Deserialize)]
struct V1Voteorder {
    delegator: String,
    author: String,
    permlink: String,
    weight: i32,
}

#[derive(Deserialize)]
struct V1SendVoteorder {
    voteorder: V1Voteorder,
}

#[derive(Deserialize)]
struct V1ConfirmVote {
    voter: String,
    #[serde(rename = "voteorderTxId")]
    voteorder_tx_id: String,
    accepted: bool,
    #[serde(default)]
    msg: String,
}

pub(crate) fn matches_command(v: &Value) -> bool {
    v.get("name").map(Value::is_string).unwrap_or(false)
}

pub(crate) fn decode_command(sender: &str, v: &Value) -> Result<CommandEnvelope, SchemaError> {
    let name = v
        .get("name")
        .and_then(Value::as_str)
        .ok_or(SchemaError::UnrecognizedPayload)?;
    let malformed = |e| SchemaError::malformed(VERSION, e);

    match name {
        "set_rules" => {
            let b = V1SetRules::deserialize(v).map_err(malformed)?;
            let mut rulesets = Vec::with_capacity(b.rulesets.len());
            for rs in b.rulesets {
                let rules = rs
                    .rules
                    .iter()
                    .map(decode_rule)
                    .collect::<Result<Vec<Rule>, SchemaError>>()?;
                rulesets.push(Ruleset::new(rs.name, rules));
            }
            Ok(CommandEnvelope {
                delegator: sender.to_string(),
                voter: b.voter,
                command: Command::SetRules(SetRules::new(rulesets)),
            })
        }
        "send_voteorder" => {
            let vo = V1SendVoteorder::deserialize(v).map_err(malformed)?.voteorder;
            Ok(CommandEnvelope {
                delegator: vo.delegator.clone(),
                voter: sender.to_string(),
                command: Command::SendVoteorder(SendVoteorder {
                    delegator: vo.delegator,
                    author: vo.author,
                    permlink: vo.permlink,
                    weight: vo.weight,
                }),
            })
        }
        "confirm_vote" => {
            let b = V1ConfirmVote::deserialize(v).map_err(malformed)?;
            Ok(CommandEnvelope {
                delegator: sender.to_string(),
                voter: b.voter,
                command: Command::ConfirmVote(ConfirmVote {
                    voteorder_tx_id: b.voteorder_tx_id,
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
            json!({ "name": "set_rules", "voter": env.voter, "rulesets": rulesets })
        }
        Command::SendVoteorder(vo) => json!({
            "name": "send_voteorder",
            "voteorder": {
                "delegator": vo.delegator,
                "author": vo.author,
                "permlink": vo.permlink,
                "weight": vo.weight,
            }
        }),
        Command::ConfirmVote(c) => json!({
            "name": "confirm_vote",
            "voter": env.voter,
            "voteorderTxId": c.voteorder_tx_id,
            "accepted": c.accepted,
            "msg": c.msg,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_age_rule_uses_plural_units() {
        let v = json!({ "type": "age_of_post", "mode": "younger_than", "value": 3, "unit": "hours" });
        assert_eq!(
            decode_rule(&v),
            Ok(Rule::from(AgeOfPostRule::younger_than(3, TimeUnit::Hour)))
        );
        let singular = json!({ "type": "age_of_post", "mode": "younger_than", "value": 3, "unit": "hour" });
        assert!(decode_rule(&singular).is_err());
    }

    #[test]
    fn legacy_custom_rpc_fields_are_prefixed() {
        let v = json!({
            "type": "custom_rpc",
            "rpc_host": "rpc.example",
            "rpc_path": "/check",
            "rpc_method": "verify",
            "rpc_params": "{}"
        });
        let rule = decode_rule(&v).unwrap();
        assert_eq!(rule, Rule::from(CustomRpcRule::new("rpc.example", "/check", "verify", "{}")));
        assert_eq!(encode_rule(&rule), v);
    }

    #[test]
    fn tags_mode_allow_is_not_a_tags_mode() {
        let v = json!({ "type": "tags", "mode": "allow", "tags": ["x"] });
        assert!(matches!(decode_rule(&v), Err(SchemaError::Malformed { version: "v1", .. })));
    }

    #[test]
    fn confirm_vote_reads_camel_case_tx_id() {
        let v = json!({
            "name": "confirm_vote",
            "voter": "bob",
            "voteorderTxId": "deadbeef",
            "accepted": false,
            "msg": "no"
        });
        let env = decode_command("alice", &v).unwrap();
        assert_eq!(env.delegator, "alice");
        assert_eq!(env.voter, "bob");
        match env.command {
            Command::ConfirmVote(c) => {
                assert_eq!(c.voteorder_tx_id, "deadbeef");
                assert!(!c.accepted);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
