use common_envelope::{EnvelopeError, Fields, ResultEnvelope};
use jsonwebtoken::errors::ErrorKind;
use serde_json::Value;
use thiserror::Error;

use crate::verifier::ClaimViolation;

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Field carrying an HTTP-like status on failure envelopes.
pub const STATUS_FIELD: &str = "status";

const STATUS_UNAUTHORIZED: u16 = 401;
const STATUS_FORBIDDEN: u16 = 403;

/// Contract violations by the caller. Untrusted token input never produces one
/// of these; see [`Rejection`] for that.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity requires a key for token verification")]
    MissingKey,
    #[error("malformed key material: {0}")]
    KeyFormat(String),
    #[error("invalid configuration value for {var}: {reason}")]
    Config { var: &'static str, reason: String },
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// Invariants a [`crate::Credential`] refuses to be built without.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("email is required for a user credential")]
    MissingUserEmail,
    #[error("owner email is required")]
    MissingOwnerEmail,
    #[error("a credential needs at least one scope")]
    NoScopes,
}

/// Why a token could not be turned into claims.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("public key is required to decode JWT")]
    KeyRequired,
    #[error("malformed token (not a JWT)")]
    NotJwt,
    #[error("malformed token (not HS256, got {0})")]
    WrongAlgorithm(String),
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token claims must be a JSON object")]
    ClaimsNotObject,
    #[error("token verification failed: {0}")]
    Verification(String),
}

impl From<jsonwebtoken::errors::Error> for DecodeError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::Malformed(value.to_string()),
            _ => Self::Verification(value.to_string()),
        }
    }
}

/// Scopes that kept a credential out of a policy. Both lists are always
/// complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_scopes(.missing, .forbidden))]
pub struct ScopeViolation {
    pub missing: Vec<String>,
    pub forbidden: Vec<String>,
}

fn describe_scopes(missing: &[String], forbidden: &[String]) -> String {
    let mut parts = Vec::with_capacity(2);
    if !missing.is_empty() {
        parts.push(format!("credential is missing scopes: {}", missing.join(" ")));
    }
    if !forbidden.is_empty() {
        parts.push(format!(
            "credential must not have scopes: {}",
            forbidden.join(" ")
        ));
    }
    parts.join("; ")
}

/// Soft failure of verification or authorization. Propagated unchanged
/// through composed checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("required fields missing or incorrect: {}", join_violations(.0))]
    InvalidClaims(Vec<ClaimViolation>),
    #[error(transparent)]
    Scopes(#[from] ScopeViolation),
}

fn join_violations(violations: &[ClaimViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

impl Rejection {
    pub fn status(&self) -> u16 {
        match self {
            Rejection::Decode(_) | Rejection::InvalidClaims(_) => STATUS_UNAUTHORIZED,
            Rejection::Scopes(_) => STATUS_FORBIDDEN,
        }
    }

    pub fn into_envelope(self) -> ResultEnvelope {
        let mut fields = Fields::new();
        fields.insert(STATUS_FIELD.to_string(), Value::from(self.status()));
        ResultEnvelope::Err {
            error: self.to_string(),
            fields,
        }
    }
}
