use std::env;

use crate::error::{IdentityError, IdentityResult};
use crate::gate::ScopeGate;
use crate::keys::HmacKey;

pub const ENV_HMAC_KEY: &str = "IDENTITY_HMAC_KEY";
pub const ENV_SKIP_SIGNATURE_VERIFICATION: &str =
    "IDENTITY_DANGEROUSLY_SKIP_SIGNATURE_VERIFICATION";

/// Runtime configuration for token verification.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// Shared secret tokens are verified against.
    pub key: Option<HmacKey>,
    /// Only consulted when `key` is absent.
    pub skip_signature_verification: bool,
}

impl IdentityConfig {
    pub fn with_key(key: HmacKey) -> Self {
        Self {
            key: Some(key),
            skip_signature_verification: false,
        }
    }

    pub fn from_env() -> IdentityResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> IdentityResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = lookup(ENV_HMAC_KEY)
            .and_then(|value| normalize_optional(&value))
            .map(|encoded| HmacKey::from_encoded(&encoded))
            .transpose()
            .map_err(|err| IdentityError::Config {
                var: ENV_HMAC_KEY,
                reason: err.to_string(),
            })?;

        let skip_signature_verification = lookup(ENV_SKIP_SIGNATURE_VERIFICATION)
            .map(|value| parse_bool(&value))
            .transpose()
            .map_err(|reason| IdentityError::Config {
                var: ENV_SKIP_SIGNATURE_VERIFICATION,
                reason,
            })?
            .unwrap_or(false);

        Ok(Self {
            key,
            skip_signature_verification,
        })
    }

    pub fn into_gate(self) -> IdentityResult<ScopeGate> {
        match (self.key, self.skip_signature_verification) {
            (Some(key), _) => Ok(ScopeGate::with_key(key)),
            (None, true) => Ok(ScopeGate::dangerously_without_signature_checks()),
            (None, false) => Err(IdentityError::MissingKey),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Ok(true));
        assert_eq!(parse_bool(" on "), Ok(true));
        assert_eq!(parse_bool("0"), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn key_from_env_builds_verifying_gate() {
        let encoded = HmacKey::new(b"config-secret".to_vec()).expect("key").encoded();
        let config = IdentityConfig::from_lookup(lookup(&[(ENV_HMAC_KEY, encoded.as_str())]))
            .expect("config");
        assert!(config.key.is_some());
        assert!(!config.skip_signature_verification);

        let gate = config.into_gate().expect("gate");
        assert!(gate.decoder().is_verifying());
    }

    #[test]
    fn no_key_and_no_opt_in_is_refused() {
        let config =
            IdentityConfig::from_lookup(lookup(&[(ENV_HMAC_KEY, "   ")])).expect("config");
        assert!(config.key.is_none());
        assert!(matches!(config.into_gate(), Err(IdentityError::MissingKey)));
    }

    #[test]
    fn explicit_opt_in_builds_unverified_gate() {
        let config =
            IdentityConfig::from_lookup(lookup(&[(ENV_SKIP_SIGNATURE_VERIFICATION, "yes")]))
                .expect("config");
        let gate = config.into_gate().expect("gate");
        assert!(!gate.decoder().is_verifying());
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = IdentityConfig::from_lookup(lookup(&[(ENV_HMAC_KEY, "***")]))
            .expect_err("bad key");
        assert!(err.to_string().contains(ENV_HMAC_KEY));

        let err = IdentityConfig::from_lookup(lookup(&[(ENV_SKIP_SIGNATURE_VERIFICATION, "sure")]))
            .expect_err("bad flag");
        assert!(err.to_string().contains(ENV_SKIP_SIGNATURE_VERIFICATION));
    }
}
