//! Scenario: every protocol version stays decodable.
//!
//! Validates:
//! 1) Every rule variant survives encode -> decode under every version.
//! 2) Commands encoded with a legacy version decode to the same envelope.
//! 3) A legacy payload captured from chain decodes without the current codec
//!    knowing anything about it beyond the table entry.
//! 4) Unknown modes, units and discriminators are SchemaErrors, not panics.

use serde_json::json;
use wise_protocol::{CommandEnvelope, CustomJson, Protocol, ProtocolVersion, SchemaError};
use wise_schemas::{
    AgeOfPostRule, AuthorsRule, Command, ConfirmVote, CustomRpcRule, Rule, Ruleset, SendVoteorder,
    SetRules, TagsRule, TimeUnit, WeightRule,
};

fn every_rule() -> Vec<Rule> {
    vec![
        WeightRule::new(-10_000, 10_000).into(),
        TagsRule::require(["steemit", "photography"]).into(),
        TagsRule::deny(["nsfw"]).into(),
        AuthorsRule::allow(["alice"]).into(),
        AuthorsRule::deny(["mallory", "trudy"]).into(),
        AgeOfPostRule::older_than(2, TimeUnit::Day).into(),
        AgeOfPostRule::younger_than(90, TimeUnit::Minute).into(),
        AgeOfPostRule::older_than(1, TimeUnit::Hour).into(),
        AgeOfPostRule::younger_than(45, TimeUnit::Second).into(),
        CustomRpcRule::new("rpc.example.org", "/wise", "check", "{\"k\":1}").into(),
    ]
}

#[test]
fn rules_roundtrip_under_every_version() {
    let protocol = Protocol::new();
    for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
        for rule in every_rule() {
            let encoded = Protocol::encode_rule_as(version, &rule);
            let decoded = protocol.decode_rule(&encoded);
            assert_eq!(decoded, Ok(rule.clone()), "{version} {encoded}");
        }
    }
}

#[test]
fn commands_roundtrip_under_every_version() {
    let commands = vec![
        CommandEnvelope::new(
            "del",
            "vot",
            Command::SetRules(SetRules::new(vec![
                Ruleset::new("photos", every_rule()),
                Ruleset::new("anything-by-alice", vec![AuthorsRule::allow(["alice"]).into()]),
            ])),
        ),
        CommandEnvelope::new("del", "vot", Command::SetRules(SetRules::empty())),
        CommandEnvelope::new(
            "del",
            "vot",
            Command::SendVoteorder(SendVoteorder {
                delegator: "del".into(),
                author: "alice".into(),
                permlink: "a-post".into(),
                weight: -2_500,
            }),
        ),
        CommandEnvelope::new(
            "del",
            "vot",
            Command::ConfirmVote(ConfirmVote {
                voteorder_tx_id: "0123abcd".into(),
                accepted: false,
                msg: "no ruleset matched".into(),
            }),
        ),
    ];

    let protocol = Protocol::new();
    for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
        for env in &commands {
            let wire = Protocol::encode_as(version, env);
            let (seen, decoded) = protocol.decode_wire(&wire).unwrap();
            assert_eq!(seen, version);
            assert_eq!(&decoded, env);
        }
    }
}

#[test]
fn legacy_set_rules_from_chain_decodes() {
    let payload = json!({
        "name": "set_rules",
        "voter": "guest123",
        "rulesets": [{
            "name": "upvote-photos",
            "rules": [
                { "type": "tags", "mode": "require", "tags": ["photography"] },
                { "type": "weight", "mode": "single_vote_weight", "min": 0, "max": 5000 }
            ]
        }]
    });
    let cj = CustomJson {
        id: "smartvote".into(),
        required_auths: vec![],
        required_posting_auths: vec!["steemprojects1".into()],
        json: payload.to_string(),
    };
    let (version, env) = Protocol::new().decode(&cj).unwrap();
    assert_eq!(version, ProtocolVersion::V1);
    assert_eq!(env.delegator, "steemprojects1");
    assert_eq!(env.voter, "guest123");
    let expected = SetRules::new(vec![Ruleset::new(
        "upvote-photos",
        vec![
            TagsRule::require(["photography"]).into(),
            WeightRule::new(0, 5000).into(),
        ],
    )]);
    assert_eq!(env.command, Command::SetRules(expected));
}

#[test]
fn unknown_rule_shapes_fail_cleanly() {
    let protocol = Protocol::new();

    let bad_unit = json!({ "rule": "age_of_post", "mode": "older_than", "value": 1, "unit": "fortnight" });
    assert!(matches!(protocol.decode_rule(&bad_unit), Err(SchemaError::Malformed { .. })));

    let bad_mode = json!({ "rule": "authors", "mode": "maybe", "authors": [] });
    assert!(matches!(protocol.decode_rule(&bad_mode), Err(SchemaError::Malformed { .. })));

    let bad_tag = json!({ "rule": "reputation", "min": 50 });
    assert!(matches!(protocol.decode_rule(&bad_tag), Err(SchemaError::UnknownRule { .. })));

    let no_discriminator = json!({ "mode": "require", "tags": [] });
    assert_eq!(protocol.decode_rule(&no_discriminator), Err(SchemaError::UnrecognizedPayload));

    let bad_command = json!(["v2:set_rules", { "voter": "x", "rulesets": [{ "name": "r", "rules": [bad_unit] }] }]);
    let cj = CustomJson {
        id: "wise".into(),
        required_auths: vec![],
        required_posting_auths: vec!["del".into()],
        json: bad_command.to_string(),
    };
    assert!(Protocol::new().decode(&cj).is_err());
}
