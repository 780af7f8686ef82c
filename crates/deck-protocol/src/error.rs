use thiserror::Error;

/// Failure to turn a backend payload into typed values.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has unexpected type: expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("item {index} in '{field}' is malformed: {source}")]
    InvalidItem {
        field: &'static str,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate node id '{0}'")]
    DuplicateId(String),

    #[error("duplicate edge '{0}'")]
    DuplicateEdge(String),

    #[error("embedded JSON string could not be parsed: {0}")]
    EmbeddedJson(String),
}
