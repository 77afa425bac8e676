use serde::{Deserialize, Serialize};
use serde_json::Value;
use wise_chain::Operation;

use crate::SchemaError;

pub const CUSTOM_JSON: &str = "custom_json";

/// Body of a `custom_json` chain operation.
///
/// `json` is a string holding the encoded payload, as nodes carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomJson {
    pub id: String,
    #[serde(default)]
    pub required_auths: Vec<String>,
    #[serde(default)]
    pub required_posting_auths: Vec<String>,
    pub json: String,
}

impl CustomJson {
    /// The posting account that signed the payload.
    pub fn sender(&self) -> Option<&str> {
        self.required_posting_auths.first().map(String::as_str)
    }

    pub fn from_operation(op: &Operation) -> Result<Self, SchemaError> {
        if op.op_type != CUSTOM_JSON {
            return Err(SchemaError::NotCustomJson(op.op_type.clone()));
        }
        Self::deserialize(&op.payload).map_err(|e| SchemaError::InvalidJson(e.to_string()))
    }
}

/// An operation ready to hand to a broadcaster: `[op_type, payload]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOperation(pub String, pub Value);

impl WireOperation {
    pub fn op_type(&self) -> &str {
        &self.0
    }

    pub fn payload(&self) -> &Value {
        &self.1
    }

    pub fn as_custom_json(&self) -> Option<CustomJson> {
        if self.0 != CUSTOM_JSON {
            return None;
        }
        CustomJson::deserialize(&self.1).ok()
    }
}

impl From<CustomJson> for WireOperation {
    fn from(cj: CustomJson) -> Self {
        let payload = serde_json::json!({
            "id": cj.id,
            "required_auths": cj.required_auths,
            "required_posting_auths": cj.required_posting_auths,
            "json": cj.json,
        });
        WireOperation(CUSTOM_JSON.to_string(), payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn custom_json_is_read_from_chain_operation() {
        let op = Operation {
            op_in_trx: 0,
            op_type: "custom_json".into(),
            payload: json!({
                "id": "wise",
                "required_auths": [],
                "required_posting_auths": ["alice"],
                "json": "[]"
            }),
        };
        let cj = CustomJson::from_operation(&op).unwrap();
        assert_eq!(cj.sender(), Some("alice"));
        assert_eq!(cj.id, "wise");
    }

    #[test]
    fn other_operation_types_are_refused() {
        let op = Operation {
            op_in_trx: 0,
            op_type: "vote".into(),
            payload: json!({}),
        };
        assert_eq!(
            CustomJson::from_operation(&op),
            Err(SchemaError::NotCustomJson("vote".into()))
        );
    }

    #[test]
    fn wire_operation_keeps_custom_json_body() {
        let cj = CustomJson {
            id: "wise".into(),
            required_auths: vec![],
            required_posting_auths: vec!["bob".into()],
            json: "{}".into(),
        };
        let wire = WireOperation::from(cj.clone());
        assert_eq!(wire.op_type(), "custom_json");
        assert_eq!(wire.as_custom_json(), Some(cj));
    }
}
