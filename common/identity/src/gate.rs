use std::sync::Arc;

use common_envelope::ResultEnvelope;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::credential::Credential;
use crate::decoder::TokenDecoder;
use crate::error::{IdentityError, IdentityResult, Rejection};
use crate::keys::HmacKey;
use crate::policy::{check_scopes, Role, ScopePolicy};
use crate::verifier::CredentialVerifier;

/// Envelope field carrying the verified credential.
pub const CRED_FIELD: &str = "cred";

/// Decodes and verifies tokens for an organization and decides whether the
/// resulting credential may act in a given role.
#[derive(Debug, Clone)]
pub struct ScopeGate {
    decoder: TokenDecoder,
    verifier: CredentialVerifier,
}

impl ScopeGate {
    /// A gate that checks signatures with `key`. Passing `None` is a contract
    /// violation; use [`ScopeGate::dangerously_without_signature_checks`] to
    /// opt out of verification explicitly.
    pub fn new(key: Option<HmacKey>) -> IdentityResult<Self> {
        let key = key.ok_or(IdentityError::MissingKey)?;
        Ok(Self::with_key(key))
    }

    pub fn with_key(key: HmacKey) -> Self {
        Self {
            decoder: TokenDecoder::verifying(key),
            verifier: CredentialVerifier::new(),
        }
    }

    /// Accepts tokens signed by anyone. Offline and test use only.
    pub fn dangerously_without_signature_checks() -> Self {
        warn!("token signature verification is DISABLED; any well-formed token will be trusted");
        Self {
            decoder: TokenDecoder::dangerously_unverified(),
            verifier: CredentialVerifier::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.verifier = CredentialVerifier::with_clock(clock);
        self
    }

    pub fn decoder(&self) -> &TokenDecoder {
        &self.decoder
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    pub fn credential_from_token(&self, token: &str, org_id: &str) -> Result<Credential, Rejection> {
        let claims = self.decoder.decode(token, org_id)?;
        let cred = self.verifier.from_claims(&claims, org_id)?;
        debug!(org_id, cred_id = cred.cred_id(), "verified credential");
        Ok(cred)
    }

    /// Verify `token` and require `must_have` while refusing `must_not_have`.
    /// A verification failure is returned as-is.
    pub fn check_token<A, B>(
        &self,
        token: &str,
        org_id: &str,
        must_have: &[A],
        must_not_have: &[B],
    ) -> Result<Credential, Rejection>
    where
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let result = self
            .credential_from_token(token, org_id)
            .and_then(|cred| {
                check_scopes(&cred, must_have, must_not_have)?;
                Ok(cred)
            });

        if let Err(rejection) = &result {
            warn!(org_id, error = %rejection, "token rejected");
        }
        result
    }

    pub fn check_policy(
        &self,
        token: &str,
        org_id: &str,
        policy: &ScopePolicy,
    ) -> Result<Credential, Rejection> {
        self.check_token(token, org_id, policy.must_have, policy.must_not_have)
    }

    pub fn check_role(&self, token: &str, org_id: &str, role: Role) -> Result<Credential, Rejection> {
        self.check_policy(token, org_id, &role.policy())
    }

    pub fn check_org_admin(&self, token: &str, org_id: &str) -> Result<Credential, Rejection> {
        self.check_role(token, org_id, Role::OrgAdmin)
    }

    pub fn check_user(&self, token: &str, org_id: &str) -> Result<Credential, Rejection> {
        self.check_role(token, org_id, Role::User)
    }

    pub fn check_service(&self, token: &str, org_id: &str) -> Result<Credential, Rejection> {
        self.check_role(token, org_id, Role::Service)
    }

    pub fn check_can_request_services(
        &self,
        token: &str,
        org_id: &str,
    ) -> Result<Credential, Rejection> {
        self.check_role(token, org_id, Role::ServiceRequester)
    }

    /// Verification entry point for transports: `cred` on success, `error`
    /// and `status` on failure.
    pub fn verify_envelope(&self, token: &str, org_id: &str) -> ResultEnvelope {
        let result = self.credential_from_token(token, org_id);
        if let Err(rejection) = &result {
            warn!(org_id, error = %rejection, "token rejected");
        }
        credential_envelope(result)
    }

    pub fn check_envelope(&self, token: &str, org_id: &str, policy: &ScopePolicy) -> ResultEnvelope {
        credential_envelope(self.check_policy(token, org_id, policy))
    }
}

pub fn credential_envelope(result: Result<Credential, Rejection>) -> ResultEnvelope {
    match result {
        Ok(cred) => ResultEnvelope::ok()
            .with(CRED_FIELD, &cred)
            .unwrap_or_else(|err| ResultEnvelope::fail(format!("failed to encode credential: {err}"))),
        Err(rejection) => rejection.into_envelope(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::{DecodeError, ScopeViolation};
    use crate::policy::SERVICE_POLICY;
    use crate::scopes::{SCOPE_ADMIN, SCOPE_SERVICE, SCOPE_SERVICE_REQUESTER, SCOPE_USER};

    const NOW: i64 = 1_700_000_000;

    fn key() -> HmacKey {
        HmacKey::new(b"gate-test-secret".to_vec()).expect("key")
    }

    fn gate() -> ScopeGate {
        ScopeGate::with_key(key()).with_clock(Arc::new(FixedClock::new(NOW)))
    }

    fn token(scopes: &[&str]) -> String {
        let mut builder = Credential::builder("O1", "subject", "owner@example.com")
            .scopes(scopes.iter().copied())
            .issued_at(NOW)
            .not_before(NOW);
        if scopes.contains(&SCOPE_USER) {
            builder = builder.email("subject@example.com");
        }
        builder
            .build()
            .expect("credential")
            .to_token(&key())
            .expect("token")
    }

    #[test]
    fn missing_key_is_a_construction_error() {
        assert!(matches!(ScopeGate::new(None), Err(IdentityError::MissingKey)));
        assert!(ScopeGate::new(Some(key())).is_ok());
    }

    #[test]
    fn org_admin_token_passes_org_admin_check() {
        let token = token(&[SCOPE_USER, SCOPE_ADMIN, SCOPE_SERVICE_REQUESTER]);
        let cred = gate().check_org_admin(&token, "O1").expect("admin");
        assert!(cred.is_org_admin());
        assert!(gate().check_user(&token, "O1").is_ok());
        assert!(gate().check_can_request_services(&token, "O1").is_ok());
        assert!(gate().check_service(&token, "O1").is_err());
    }

    #[test]
    fn scope_failure_reports_missing_and_forbidden() {
        let token = token(&[SCOPE_USER, SCOPE_SERVICE]);
        let err = gate()
            .check_token(&token, "O1", &[SCOPE_ADMIN], &[SCOPE_SERVICE])
            .expect_err("scopes");
        assert_eq!(
            err,
            Rejection::Scopes(ScopeViolation {
                missing: vec![SCOPE_ADMIN.to_string()],
                forbidden: vec![SCOPE_SERVICE.to_string()],
            })
        );
    }

    #[test]
    fn decode_failures_pass_through_unchanged() {
        let err = gate()
            .check_policy("garbage", "O1", &SERVICE_POLICY)
            .expect_err("garbage");
        assert!(matches!(err, Rejection::Decode(DecodeError::Malformed(_))));
    }

    #[test]
    fn envelopes_carry_cred_or_error() {
        let token = token(&[SCOPE_SERVICE]);
        let envelope = gate().check_envelope(&token, "O1", &SERVICE_POLICY);
        assert!(envelope.is_ok());
        let cred = envelope.get(CRED_FIELD).expect("cred");
        assert_eq!(cred["sub"], "subject");

        let envelope = gate().verify_envelope(&token, "O2");
        assert!(envelope.is_err());
        assert!(envelope.get(CRED_FIELD).is_none());
        assert!(envelope.error().expect("error").contains("token verification failed"));
    }
}
