use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::claims::{
    ClaimsView, CLAIM_AUDIENCE, CLAIM_EMAIL, CLAIM_EXPIRY, CLAIM_ISSUED_AT, CLAIM_ISSUER,
    CLAIM_NOT_BEFORE, CLAIM_OWNER_EMAIL, CLAIM_SUBJECT, CLAIM_TOKEN_ID, CLAIM_TYPE,
    CREDENTIAL_TYPE, ISSUER,
};
use crate::clock::{Clock, SystemClock};
use crate::credential::Credential;
use crate::error::{CredentialError, DecodeError, Rejection};
use crate::scopes::SCOPE_USER;

/// Allowed disagreement between our clock and the issuer's.
pub const CLOCK_SKEW_SECONDS: i64 = 30;

/// One broken rule in a claims set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimViolation {
    CredentialType,
    TokenId,
    Audience { expected: String },
    Issuer,
    IssuedAt,
    NotBefore,
    Expiry,
    Subject,
    OwnerEmail,
    Scopes,
    UserEmail,
}

impl fmt::Display for ClaimViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimViolation::CredentialType => f.write_str(CLAIM_TYPE),
            ClaimViolation::TokenId => f.write_str("tokenID"),
            ClaimViolation::Audience { expected } => write!(f, "orgID (must be {expected})"),
            ClaimViolation::Issuer => write!(f, "issuer (must be {ISSUER})"),
            ClaimViolation::IssuedAt => f.write_str("iat (must not be in the future)"),
            ClaimViolation::NotBefore => f.write_str("nbf (must not be in the future)"),
            ClaimViolation::Expiry => f.write_str("exp (must not be in the past)"),
            ClaimViolation::Subject => f.write_str("credID"),
            ClaimViolation::OwnerEmail => f.write_str("ownerEmail"),
            ClaimViolation::Scopes => f.write_str("scopes"),
            ClaimViolation::UserEmail => f.write_str("email (required for user credential)"),
        }
    }
}

impl From<CredentialError> for ClaimViolation {
    fn from(value: CredentialError) -> Self {
        match value {
            CredentialError::MissingUserEmail => ClaimViolation::UserEmail,
            CredentialError::MissingOwnerEmail => ClaimViolation::OwnerEmail,
            CredentialError::NoScopes => ClaimViolation::Scopes,
        }
    }
}

/// Turns an untrusted claims mapping into a [`Credential`], checking every
/// rule and reporting all the ones that fail.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    clock: Arc<dyn Clock>,
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Every rule `claims` breaks, in a fixed order. Empty means acceptable.
    pub fn violations(&self, claims: &Value, expected_org_id: &str) -> Vec<ClaimViolation> {
        let view = ClaimsView::new(claims);
        let now = self.clock.now_secs();
        let latest_start = now.saturating_add(CLOCK_SKEW_SECONDS);
        let earliest_end = now.saturating_sub(CLOCK_SKEW_SECONDS);
        let mut violations = Vec::new();

        if view.text(CLAIM_TYPE) != Some(CREDENTIAL_TYPE) {
            violations.push(ClaimViolation::CredentialType);
        }
        if view.non_empty_text(CLAIM_TOKEN_ID).is_none() {
            violations.push(ClaimViolation::TokenId);
        }
        if view.text(CLAIM_AUDIENCE) != Some(expected_org_id) {
            violations.push(ClaimViolation::Audience {
                expected: expected_org_id.to_string(),
            });
        }
        if view.text(CLAIM_ISSUER) != Some(ISSUER) {
            violations.push(ClaimViolation::Issuer);
        }
        if !view
            .integer(CLAIM_ISSUED_AT)
            .is_some_and(|iat| iat <= latest_start)
        {
            violations.push(ClaimViolation::IssuedAt);
        }
        if !view
            .integer(CLAIM_NOT_BEFORE)
            .is_some_and(|nbf| nbf <= latest_start)
        {
            violations.push(ClaimViolation::NotBefore);
        }
        if view.is_present(CLAIM_EXPIRY)
            && !view
                .integer(CLAIM_EXPIRY)
                .is_some_and(|exp| exp >= earliest_end)
        {
            violations.push(ClaimViolation::Expiry);
        }
        if view.non_empty_text(CLAIM_SUBJECT).is_none() {
            violations.push(ClaimViolation::Subject);
        }
        if view.non_empty_text(CLAIM_OWNER_EMAIL).is_none() {
            violations.push(ClaimViolation::OwnerEmail);
        }

        let scopes = view.scopes();
        if scopes.is_empty() {
            violations.push(ClaimViolation::Scopes);
        }
        if scopes.contains(SCOPE_USER) && view.non_empty_text(CLAIM_EMAIL).is_none() {
            violations.push(ClaimViolation::UserEmail);
        }

        violations
    }

    pub fn from_claims(
        &self,
        claims: &Value,
        expected_org_id: &str,
    ) -> Result<Credential, Rejection> {
        let violations = self.violations(claims, expected_org_id);
        if !violations.is_empty() {
            debug!(
                org_id = expected_org_id,
                violations = violations.len(),
                "claims failed verification"
            );
            return Err(Rejection::InvalidClaims(violations));
        }

        let view = ClaimsView::new(claims);
        let mut builder = Credential::builder(
            expected_org_id,
            view.text(CLAIM_SUBJECT).unwrap_or_default(),
            view.text(CLAIM_OWNER_EMAIL).unwrap_or_default(),
        )
        .scopes(view.scopes())
        .token_id(view.text(CLAIM_TOKEN_ID).unwrap_or_default())
        .issued_at(view.integer(CLAIM_ISSUED_AT).unwrap_or_default())
        .not_before(view.integer(CLAIM_NOT_BEFORE).unwrap_or_default());

        if let Some(email) = view.non_empty_text(CLAIM_EMAIL) {
            builder = builder.email(email);
        }
        if let Some(exp) = view.integer(CLAIM_EXPIRY) {
            builder = builder.expires_at(exp);
        }

        builder
            .build_with_clock(self.clock.as_ref())
            .map_err(|err| Rejection::InvalidClaims(vec![err.into()]))
    }

    /// [`CredentialVerifier::from_claims`] over a JSON text claims set.
    pub fn from_json(&self, input: &str, expected_org_id: &str) -> Result<Credential, Rejection> {
        let claims: Value = serde_json::from_str(input)
            .map_err(|err| DecodeError::Malformed(err.to_string()))?;
        self.from_claims(&claims, expected_org_id)
    }
}
