use std::fmt;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{DecodingKey, EncodingKey};

use crate::error::{IdentityError, IdentityResult};

/// Shared HMAC secret used both to sign and to verify HS256 tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct HmacKey {
    secret: Vec<u8>,
}

impl HmacKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> IdentityResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(IdentityError::KeyFormat("HMAC secret is empty".to_string()));
        }
        Ok(Self { secret })
    }

    /// Decode a secret stored as URL-safe base64; trailing padding is optional.
    pub fn from_encoded(encoded: &str) -> IdentityResult<Self> {
        let unpadded = encoded.trim().trim_end_matches('=');
        let secret = URL_SAFE_NO_PAD
            .decode(unpadded)
            .map_err(|err| IdentityError::KeyFormat(err.to_string()))?;
        Self::new(secret)
    }

    pub fn encoded(&self) -> String {
        URL_SAFE.encode(&self.secret)
    }

    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret)
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret)
    }
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacKey")
            .field("len", &self.secret.len())
            .finish_non_exhaustive()
    }
}
