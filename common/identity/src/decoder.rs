use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::{CLAIM_AUDIENCE, CLAIM_ISSUER, ISSUER};
use crate::error::DecodeError;
use crate::keys::HmacKey;

/// The only signing algorithm this system issues or accepts.
pub const ALGORITHM: Algorithm = Algorithm::HS256;
pub const TOKEN_TYPE: &str = "JWT";

/// Whether a token without a key may be read at all. Defaults to requiring a
/// signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureCheck {
    #[default]
    Required,
    /// Read claims without any cryptographic assurance. Offline and test use
    /// only.
    DangerouslySkipped,
}

/// Gets a claims mapping out of a raw token.
#[derive(Debug, Clone)]
pub struct TokenDecoder {
    key: Option<HmacKey>,
    signature_check: SignatureCheck,
}

impl TokenDecoder {
    pub fn new(key: Option<HmacKey>, signature_check: SignatureCheck) -> Self {
        Self {
            key,
            signature_check,
        }
    }

    pub fn verifying(key: HmacKey) -> Self {
        Self::new(Some(key), SignatureCheck::Required)
    }

    pub fn dangerously_unverified() -> Self {
        Self::new(None, SignatureCheck::DangerouslySkipped)
    }

    /// True when tokens are checked against a key.
    pub fn is_verifying(&self) -> bool {
        self.key.is_some()
    }

    pub fn decode(&self, token: &str, expected_org_id: &str) -> Result<Value, DecodeError> {
        decode_claims(
            token,
            self.key.as_ref(),
            expected_org_id,
            self.signature_check,
        )
    }
}

/// A present key always means verified mode. Without one, only an explicit
/// [`SignatureCheck::DangerouslySkipped`] reaches the unverified path.
pub fn decode_claims(
    token: &str,
    key: Option<&HmacKey>,
    expected_org_id: &str,
    signature_check: SignatureCheck,
) -> Result<Value, DecodeError> {
    let result = match (key, signature_check) {
        (Some(key), _) => verify_and_decode(token, key, expected_org_id),
        (None, SignatureCheck::DangerouslySkipped) => dangerous_unverified_decode(token),
        (None, SignatureCheck::Required) => Err(DecodeError::KeyRequired),
    };

    if let Err(err) = &result {
        debug!(org_id = expected_org_id, error = %err, "token decode failed");
    }
    result
}

/// Check signature, audience, and issuer, then hand back the claims.
pub fn verify_and_decode(
    token: &str,
    key: &HmacKey,
    expected_org_id: &str,
) -> Result<Value, DecodeError> {
    let mut validation = Validation::new(ALGORITHM);
    validation.set_audience(&[expected_org_id]);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&[CLAIM_AUDIENCE, CLAIM_ISSUER]);
    // Time windows are checked by the credential verifier against its clock.
    validation.validate_exp = false;
    validation.validate_nbf = false;

    let data = decode::<Value>(token, &key.decoding_key(), &validation)?;
    ensure_object(data.claims)
}

/// Read claims WITHOUT checking the signature. The header must still claim to
/// be an HS256 JWT.
pub fn dangerous_unverified_decode(token: &str) -> Result<Value, DecodeError> {
    let header = decode_header(token).map_err(|err| DecodeError::Malformed(err.to_string()))?;
    if header.typ.as_deref() != Some(TOKEN_TYPE) {
        return Err(DecodeError::NotJwt);
    }
    if header.alg != ALGORITHM {
        return Err(DecodeError::WrongAlgorithm(format!("{:?}", header.alg)));
    }

    let mut validation = Validation::new(ALGORITHM);
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let data = decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)?;
    ensure_object(data.claims)
}

fn ensure_object(claims: Value) -> Result<Value, DecodeError> {
    if claims.is_object() {
        Ok(claims)
    } else {
        Err(DecodeError::ClaimsNotObject)
    }
}
