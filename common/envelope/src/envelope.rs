use std::collections::BTreeMap;
use std::fmt;

use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EnvelopeError, EnvelopeResult};

pub const OK_KEY: &str = "ok";
pub const ERROR_KEY: &str = "error";

const FALLBACK_ERROR: &str = "operation failed";

/// Named payload fields of an envelope, kept in a stable key order.
pub type Fields = BTreeMap<String, Value>;

/// Uniform success/failure outcome returned at operation boundaries.
///
/// On the wire this is `{"ok": bool, "error": string, ...fields}` where `error`
/// is present exactly when `ok` is false. The two variants make the
/// inconsistent combinations unrepresentable in memory; [`TryFrom<Value>`]
/// rejects them at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope {
    Ok { fields: Fields },
    Err { error: String, fields: Fields },
}

impl ResultEnvelope {
    /// Empty success envelope. Attach payload with [`ResultEnvelope::with`].
    pub fn ok() -> Self {
        Self::Ok {
            fields: Fields::new(),
        }
    }

    /// Failure envelope. A blank message is replaced so that a failure always
    /// carries a non-empty `error`.
    pub fn fail(error: impl Into<String>) -> Self {
        let error = error.into();
        let error = if error.trim().is_empty() {
            FALLBACK_ERROR.to_string()
        } else {
            error
        };
        Self::Err {
            error,
            fields: Fields::new(),
        }
    }

    /// Failure when `error` is a non-empty message, success otherwise.
    pub fn from_error_and_fields(error: Option<String>, fields: Fields) -> EnvelopeResult<Self> {
        if let Some(reserved) = fields.keys().find(|name| is_reserved(name)) {
            return Err(EnvelopeError::ReservedField(reserved.clone()));
        }

        Ok(match error {
            Some(error) if !error.is_empty() => Self::Err { error, fields },
            _ => Self::Ok { fields },
        })
    }

    /// Attach a named field, serializing `value` into its JSON form.
    pub fn with<T: Serialize>(self, name: impl Into<String>, value: T) -> EnvelopeResult<Self> {
        let value = serde_json::to_value(value)?;
        self.with_value(name, value)
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> EnvelopeResult<Self> {
        let name = name.into();
        if is_reserved(&name) {
            return Err(EnvelopeError::ReservedField(name));
        }
        self.fields_mut().insert(name, value);
        Ok(self)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Err { error, .. } => Some(error),
        }
    }

    pub fn fields(&self) -> &Fields {
        match self {
            Self::Ok { fields } | Self::Err { fields, .. } => fields,
        }
    }

    pub fn into_fields(self) -> Fields {
        match self {
            Self::Ok { fields } | Self::Err { fields, .. } => fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields().get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields().contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields().keys().map(String::as_str)
    }

    /// Typed access to a payload field.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> EnvelopeResult<T> {
        let value = self
            .get(name)
            .ok_or_else(|| EnvelopeError::MissingField(name.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|err| EnvelopeError::FieldType {
            field: name.to_string(),
            reason: err.to_string(),
        })
    }

    /// Downgrade a success that lacks any of `names` (absent or null) into a
    /// failure listing them. Failures pass through untouched.
    pub fn require(self, names: &[&str]) -> Self {
        if self.is_err() {
            return self;
        }

        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| matches!(self.get(name), None | Some(Value::Null)))
            .collect();

        if missing.is_empty() {
            self
        } else {
            Self::fail(format!("missing response elements: {}", missing.join(" ")))
        }
    }

    /// JSON value form, keys in wire order.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(OK_KEY.to_string(), Value::Bool(self.is_ok()));
        if let Some(error) = self.error() {
            map.insert(ERROR_KEY.to_string(), Value::String(error.to_string()));
        }
        for (name, value) in self.fields() {
            map.insert(name.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Wire form with `ok` first, then `error` when failed, then the fields.
    pub fn to_json(&self) -> EnvelopeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a wire envelope. Garbage is an `Err`; a well-formed failure is an
    /// `Ok(ResultEnvelope::Err { .. })`.
    pub fn from_json(input: &str) -> EnvelopeResult<Self> {
        let value: Value = serde_json::from_str(input)?;
        Self::try_from(value)
    }

    fn fields_mut(&mut self) -> &mut Fields {
        match self {
            Self::Ok { fields } | Self::Err { fields, .. } => fields,
        }
    }
}

fn is_reserved(name: &str) -> bool {
    name == OK_KEY || name == ERROR_KEY
}

impl TryFrom<Value> for ResultEnvelope {
    type Error = EnvelopeError;

    fn try_from(value: Value) -> EnvelopeResult<Self> {
        let Value::Object(mut incoming) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let ok = match incoming.remove(OK_KEY) {
            None | Some(Value::Null) => return Err(EnvelopeError::MissingOk),
            Some(Value::Bool(ok)) => ok,
            Some(_) => return Err(EnvelopeError::OkNotBoolean),
        };
        let error = incoming.remove(ERROR_KEY);
        let fields: Fields = incoming.into_iter().collect();

        if ok {
            match error {
                None | Some(Value::Null) => Ok(Self::Ok { fields }),
                Some(_) => Err(EnvelopeError::UnexpectedError),
            }
        } else {
            match error {
                Some(Value::String(error)) if !error.is_empty() => Ok(Self::Err { error, fields }),
                _ => Err(EnvelopeError::MissingError),
            }
        }
    }
}

impl Serialize for ResultEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 1 + usize::from(self.is_err()) + self.fields().len();
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(OK_KEY, &self.is_ok())?;
        if let Some(error) = self.error() {
            map.serialize_entry(ERROR_KEY, error)?;
        }
        for (name, value) in self.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResultEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::try_from(value).map_err(D::Error::custom)
    }
}

impl From<&ResultEnvelope> for bool {
    fn from(value: &ResultEnvelope) -> Self {
        value.is_ok()
    }
}

impl fmt::Display for ResultEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_ok() { "<OK" } else { "<BAD" })?;
        if let Some(error) = self.error() {
            write!(f, " error={error:?}")?;
        }
        for (name, value) in self.fields() {
            write!(f, " {name}={value}")?;
        }
        f.write_str(">")
    }
}
