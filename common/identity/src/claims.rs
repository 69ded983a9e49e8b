use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{Map, Value};

pub const CLAIM_TYPE: &str = "dwType";
pub const CLAIM_TOKEN_ID: &str = "jti";
pub const CLAIM_AUDIENCE: &str = "aud";
pub const CLAIM_SUBJECT: &str = "sub";
pub const CLAIM_ISSUER: &str = "iss";
pub const CLAIM_ISSUED_AT: &str = "iat";
pub const CLAIM_NOT_BEFORE: &str = "nbf";
pub const CLAIM_EXPIRY: &str = "exp";
pub const CLAIM_EMAIL: &str = "email";
pub const CLAIM_OWNER_EMAIL: &str = "ownerEmail";
pub const CLAIM_SCOPES: &str = "scopes";

/// Type tag distinguishing our claims sets from look-alikes.
pub const CREDENTIAL_TYPE: &str = "DataWireCredential";
pub const ISSUER: &str = "cloud-hub.datawire.io";

/// Wire shape of a credential's claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialClaims {
    #[serde(rename = "jti")]
    pub token_id: String,
    #[serde(rename = "aud")]
    pub audience: String,
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "nbf")]
    pub not_before: i64,
    #[serde(rename = "exp", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "ownerEmail")]
    pub owner_email: String,
    pub scopes: BTreeMap<String, bool>,
    #[serde(rename = "dwType")]
    pub credential_type: String,
}

/// Lenient read access to an untrusted claims mapping. Every accessor returns
/// `None` for absent, null, or wrongly typed values, so the verifier can
/// report problems instead of failing on the first parse error.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClaimsView<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> ClaimsView<'a> {
    pub(crate) fn new(claims: &'a Value) -> Self {
        Self {
            map: claims.as_object(),
        }
    }

    fn raw(&self, name: &str) -> Option<&'a Value> {
        self.map
            .and_then(|map| map.get(name))
            .filter(|value| !value.is_null())
    }

    pub(crate) fn is_present(&self, name: &str) -> bool {
        self.raw(name).is_some()
    }

    pub(crate) fn text(&self, name: &str) -> Option<&'a str> {
        self.raw(name).and_then(Value::as_str)
    }

    pub(crate) fn non_empty_text(&self, name: &str) -> Option<&'a str> {
        self.text(name).filter(|value| !value.is_empty())
    }

    /// Integral seconds only; floats and numeric strings do not count.
    pub(crate) fn integer(&self, name: &str) -> Option<i64> {
        self.raw(name).and_then(Value::as_i64)
    }

    /// Scopes granted by the claims: keys of a mapping whose values are
    /// truthy, or the string members of an array.
    pub(crate) fn scopes(&self) -> BTreeSet<String> {
        match self.raw(CLAIM_SCOPES) {
            Some(Value::Object(entries)) => entries
                .iter()
                .filter(|(_, granted)| is_truthy(granted))
                .map(|(scope, _)| scope.clone())
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|scope| !scope.is_empty())
                .map(str::to_string)
                .collect(),
            _ => BTreeSet::new(),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}
