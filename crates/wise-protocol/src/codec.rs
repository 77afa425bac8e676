use std::fmt;

use serde_json::Value;
use tracing::debug;
use wise_chain::{Operation, Transaction};
use wise_schemas::{Command, EffectuatedCommand, Rule};

use crate::{v1, v2, CustomJson, SchemaError, WireOperation, CUSTOM_JSON};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    pub const CURRENT: ProtocolVersion = ProtocolVersion::V2;

    pub fn as_str(&self) -> &'static str {
        self.entry().name
    }

    pub fn custom_json_id(&self) -> &'static str {
        self.entry().custom_json_id
    }

    fn entry(&self) -> &'static VersionEntry {
        match self {
            ProtocolVersion::V2 => &VERSIONS[0],
            ProtocolVersion::V1 => &VERSIONS[1],
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command plus the two accounts it concerns.
///
/// The signing account is derived from the command: the delegator signs
/// `set_rules` and `confirm_vote`, the voter signs `send_voteorder`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub delegator: String,
    pub voter: String,
    pub command: Command,
}

impl CommandEnvelope {
    pub fn new(delegator: impl Into<String>, voter: impl Into<String>, command: Command) -> Self {
        Self {
            delegator: delegator.into(),
            voter: voter.into(),
            command,
        }
    }

    pub fn sender(&self) -> &str {
        match self.command {
            Command::SendVoteorder(_) => &self.voter,
            Command::SetRules(_) | Command::ConfirmVote(_) => &self.delegator,
        }
    }
}

// ---------------------------------------------------------------------------
// Version table
// ---------------------------------------------------------------------------

struct VersionEntry {
    version: ProtocolVersion,
    name: &'static str,
    custom_json_id: &'static str,
    matches_command: fn(&Value) -> bool,
    decode_command: fn(&str, &Value) -> Result<CommandEnvelope, SchemaError>,
    encode_command: fn(&CommandEnvelope) -> Value,
    matches_rule: fn(&Value) -> bool,
    decode_rule: fn(&Value) -> Result<Rule, SchemaError>,
    encode_rule: fn(&Rule) -> Value,
}

/// Newest first. Entries are never removed: old records stay decodable.
static VERSIONS: [VersionEntry; 2] = [
    VersionEntry {
        version: ProtocolVersion::V2,
        name: v2::VERSION,
        custom_json_id: v2::CUSTOM_JSON_ID,
        matches_command: v2::matches_command,
        decode_command: v2::decode_command,
        encode_command: v2::encode_command,
        matches_rule: v2::matches_rule,
        decode_rule: v2::decode_rule,
        encode_rule: v2::encode_rule,
    },
    VersionEntry {
        version: ProtocolVersion::V1,
        name: v1::VERSION,
        custom_json_id: v1::CUSTOM_JSON_ID,
        matches_command: v1::matches_command,
        decode_command: v1::decode_command,
        encode_command: v1::encode_command,
        matches_rule: v1::matches_rule,
        decode_rule: v1::decode_rule,
        encode_rule: v1::encode_rule,
    },
];

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Versioned codec. Encodes with one target version, decodes every known one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Protocol {
    target: ProtocolVersion,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            target: ProtocolVersion::CURRENT,
        }
    }
}

impl Protocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compatibility codec that encodes with an older version.
    pub fn targeting(version: ProtocolVersion) -> Self {
        Self { target: version }
    }

    pub fn target(&self) -> ProtocolVersion {
        self.target
    }

    /// Every custom_json id any known version publishes under.
    pub fn custom_json_ids() -> Vec<&'static str> {
        VERSIONS.iter().map(|e| e.custom_json_id).collect()
    }

    pub fn is_protocol_id(id: &str) -> bool {
        VERSIONS.iter().any(|e| e.custom_json_id == id)
    }

    // --- commands ---

    pub fn encode(&self, envelope: &CommandEnvelope) -> WireOperation {
        Self::encode_as(self.target, envelope)
    }

    pub fn encode_as(version: ProtocolVersion, envelope: &CommandEnvelope) -> WireOperation {
        let entry = version.entry();
        let payload = (entry.encode_command)(envelope);
        CustomJson {
            id: entry.custom_json_id.to_string(),
            required_auths: Vec::new(),
            required_posting_auths: vec![envelope.sender().to_string()],
            json: payload.to_string(),
        }
        .into()
    }

    /// Decode a custom_json body, trying versions newest-first.
    pub fn decode(
        &self,
        custom_json: &CustomJson,
    ) -> Result<(ProtocolVersion, CommandEnvelope), SchemaError> {
        if !Self::is_protocol_id(&custom_json.id) {
            return Err(SchemaError::UnknownProtocolId(custom_json.id.clone()));
        }
        let sender = custom_json.sender().ok_or(SchemaError::MissingAuthority)?;
        let payload: Value = serde_json::from_str(&custom_json.json)
            .map_err(|e| SchemaError::InvalidJson(e.to_string()))?;

        let entry = VERSIONS
            .iter()
            .filter(|e| e.custom_json_id == custom_json.id)
            .find(|e| (e.matches_command)(&payload))
            .ok_or(SchemaError::UnrecognizedPayload)?;

        let envelope = (entry.decode_command)(sender, &payload)?;
        Ok((entry.version, envelope))
    }

    pub fn decode_wire(
        &self,
        op: &WireOperation,
    ) -> Result<(ProtocolVersion, CommandEnvelope), SchemaError> {
        let custom_json = op
            .as_custom_json()
            .ok_or_else(|| SchemaError::NotCustomJson(op.op_type().to_string()))?;
        self.decode(&custom_json)
    }

    // --- rules ---

    pub fn encode_rule(&self, rule: &Rule) -> Value {
        Self::encode_rule_as(self.target, rule)
    }

    pub fn encode_rule_as(version: ProtocolVersion, rule: &Rule) -> Value {
        (version.entry().encode_rule)(rule)
    }

    /// Decode one rule object in any known version's shape.
    pub fn decode_rule(&self, value: &Value) -> Result<Rule, SchemaError> {
        let entry = VERSIONS
            .iter()
            .find(|e| (e.matches_rule)(value))
            .ok_or(SchemaError::UnrecognizedPayload)?;
        (entry.decode_rule)(value)
    }

    // --- chain ---

    /// Decode one chain operation.
    ///
    /// `None` for operations that are not protocol traffic at all (other
    /// operation types, foreign custom_json ids).
    pub fn decode_operation(
        &self,
        trx: &Transaction,
        op: &Operation,
    ) -> Option<Result<EffectuatedCommand, SchemaError>> {
        if op.op_type != CUSTOM_JSON {
            return None;
        }
        let custom_json = match CustomJson::from_operation(op) {
            Ok(cj) => cj,
            Err(err) => return Some(Err(err)),
        };
        if !Self::is_protocol_id(&custom_json.id) {
            return None;
        }

        let moment = trx.moment_of(op);
        let decoded = self.decode(&custom_json).map(|(_, envelope)| EffectuatedCommand {
            moment,
            transaction_id: trx.transaction_id.clone(),
            timestamp: trx.timestamp,
            delegator: envelope.delegator,
            voter: envelope.voter,
            command: envelope.command,
        });
        if let Err(err) = &decoded {
            debug!(%moment, trx_id = %trx.transaction_id, error = %err, "rejected protocol operation");
        }
        Some(decoded)
    }

    /// Every protocol operation in the transaction, in operation order.
    pub fn decode_transaction(&self, trx: &Transaction) -> Vec<Result<EffectuatedCommand, SchemaError>> {
        trx.ops
            .iter()
            .filter_map(|op| self.decode_operation(trx, op))
            .collect()
    }
}
