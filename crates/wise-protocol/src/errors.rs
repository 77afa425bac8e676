use thiserror::Error;

/// Malformed or unrecognized wire payload. Permanently rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("not a custom_json operation: {0}")]
    NotCustomJson(String),

    #[error("unknown custom_json id '{0}'")]
    UnknownProtocolId(String),

    #[error("custom_json has no posting authority")]
    MissingAuthority,

    #[error("custom_json payload is not valid json: {0}")]
    InvalidJson(String),

    #[error("no protocol version recognizes this payload")]
    UnrecognizedPayload,

    #[error("{version}: unknown command '{name}'")]
    UnknownCommand { version: &'static str, name: String },

    #[error("{version}: unknown rule '{tag}'")]
    UnknownRule { version: &'static str, tag: String },

    #[error("{version}: malformed payload: {detail}")]
    Malformed {
        version: &'static str,
        detail: String,
    },
}

impl SchemaError {
    pub(crate) fn malformed(version: &'static str, err: impl std::fmt::Display) -> Self {
        SchemaError::Malformed {
            version,
            detail: err.to_string(),
        }
    }
}
