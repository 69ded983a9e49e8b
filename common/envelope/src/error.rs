use thiserror::Error;

pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

/// Structural problems with an envelope. These are protocol violations, never
/// business outcomes: a well-formed `ok=false` envelope is not an error here.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("incoming envelope must be a JSON object")]
    NotAnObject,
    #[error("incoming envelope must have an 'ok' element")]
    MissingOk,
    #[error("incoming envelope 'ok' element must be a boolean")]
    OkNotBoolean,
    #[error("incoming envelope with ok=false must have a string 'error' element")]
    MissingError,
    #[error("incoming envelope with ok=true must not have an 'error' element")]
    UnexpectedError,
    #[error("field name '{0}' is reserved")]
    ReservedField(String),
    #[error("envelope has no field '{0}'")]
    MissingField(String),
    #[error("envelope field '{field}' has unexpected shape: {reason}")]
    FieldType { field: String, reason: String },
    #[error("malformed envelope JSON: {0}")]
    Json(#[from] serde_json::Error),
}
