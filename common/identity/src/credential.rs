use std::collections::BTreeSet;
use std::fmt;

use jsonwebtoken::{encode, Algorithm, Header};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::claims::{CredentialClaims, CREDENTIAL_TYPE, ISSUER};
use crate::clock::{Clock, SystemClock};
use crate::error::{CredentialError, IdentityError, IdentityResult};
use crate::keys::HmacKey;
use crate::scopes::{SCOPE_ADMIN, SCOPE_SERVICE, SCOPE_SERVICE_REQUESTER, SCOPE_USER};

/// A user or service principal inside an organization. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    org_id: String,
    cred_id: String,
    owner_email: String,
    email: Option<String>,
    scopes: BTreeSet<String>,
    token_id: String,
    issued_at: i64,
    not_before: i64,
    expires_at: Option<i64>,
}

impl Credential {
    pub fn builder(
        org_id: impl Into<String>,
        cred_id: impl Into<String>,
        owner_email: impl Into<String>,
    ) -> CredentialBuilder {
        CredentialBuilder::new(org_id, cred_id, owner_email)
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn cred_id(&self) -> &str {
        &self.cred_id
    }

    pub fn owner_email(&self) -> &str {
        &self.owner_email
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    /// `None` means the credential never expires.
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn is_user(&self) -> bool {
        self.has_scope(SCOPE_USER)
    }

    pub fn is_org_admin(&self) -> bool {
        self.has_scope(SCOPE_ADMIN)
    }

    pub fn is_service(&self) -> bool {
        self.has_scope(SCOPE_SERVICE)
    }

    pub fn can_request_services(&self) -> bool {
        self.has_scope(SCOPE_SERVICE_REQUESTER)
    }

    pub fn claims(&self) -> CredentialClaims {
        CredentialClaims {
            token_id: self.token_id.clone(),
            audience: self.org_id.clone(),
            subject: self.cred_id.clone(),
            issuer: ISSUER.to_string(),
            issued_at: self.issued_at,
            not_before: self.not_before,
            expires_at: self.expires_at,
            email: self.email.clone(),
            owner_email: self.owner_email.clone(),
            scopes: self
                .scopes
                .iter()
                .map(|scope| (scope.clone(), true))
                .collect(),
            credential_type: CREDENTIAL_TYPE.to_string(),
        }
    }

    /// Sign this credential's claims as an HS256 JWT.
    pub fn to_token(&self, key: &HmacKey) -> IdentityResult<String> {
        encode(
            &Header::new(Algorithm::HS256),
            &self.claims(),
            &key.encoding_key(),
        )
        .map_err(|err| IdentityError::Signing(err.to_string()))
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.claims().serialize(serializer)
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        write!(
            f,
            "<Credential {} - {} - {}>",
            self.org_id,
            self.cred_id,
            scopes.join(",")
        )
    }
}

pub struct CredentialBuilder {
    org_id: String,
    cred_id: String,
    owner_email: String,
    email: Option<String>,
    scopes: BTreeSet<String>,
    token_id: Option<String>,
    issued_at: Option<i64>,
    not_before: Option<i64>,
    expires_at: Option<i64>,
}

impl CredentialBuilder {
    fn new(
        org_id: impl Into<String>,
        cred_id: impl Into<String>,
        owner_email: impl Into<String>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            cred_id: cred_id.into(),
            owner_email: owner_email.into(),
            email: None,
            scopes: BTreeSet::new(),
            token_id: None,
            issued_at: None,
            not_before: None,
            expires_at: None,
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    pub fn token_id(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }

    pub fn issued_at(mut self, seconds: i64) -> Self {
        self.issued_at = Some(seconds);
        self
    }

    pub fn not_before(mut self, seconds: i64) -> Self {
        self.not_before = Some(seconds);
        self
    }

    pub fn expires_at(mut self, seconds: i64) -> Self {
        self.expires_at = Some(seconds);
        self
    }

    pub fn build(self) -> Result<Credential, CredentialError> {
        self.build_with_clock(&SystemClock)
    }

    /// Build, defaulting `iat`/`nbf` to the clock's now and the token id to a
    /// fresh UUID.
    pub fn build_with_clock(self, clock: &dyn Clock) -> Result<Credential, CredentialError> {
        if self.owner_email.is_empty() {
            return Err(CredentialError::MissingOwnerEmail);
        }
        if self.scopes.is_empty() {
            return Err(CredentialError::NoScopes);
        }

        let email = self.email.filter(|email| !email.is_empty());
        if self.scopes.contains(SCOPE_USER) && email.is_none() {
            return Err(CredentialError::MissingUserEmail);
        }

        let now = clock.now_secs();
        Ok(Credential {
            org_id: self.org_id,
            cred_id: self.cred_id,
            owner_email: self.owner_email,
            email,
            scopes: self.scopes,
            token_id: self
                .token_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            issued_at: self.issued_at.unwrap_or(now),
            not_before: self.not_before.unwrap_or(now),
            expires_at: self.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    #[test]
    fn user_credential_without_email_is_never_built() {
        let err = Credential::builder("O1", "alice", "owner@example.com")
            .scope(SCOPE_USER)
            .build()
            .expect_err("email required");
        assert_eq!(err, CredentialError::MissingUserEmail);

        let err = Credential::builder("O1", "alice", "owner@example.com")
            .scope(SCOPE_USER)
            .email("")
            .build()
            .expect_err("empty email is no email");
        assert_eq!(err, CredentialError::MissingUserEmail);
    }

    #[test]
    fn service_credential_needs_no_email() {
        let cred = Credential::builder("O1", "grue-locator", "owner@example.com")
            .scope(SCOPE_SERVICE)
            .build()
            .expect("service cred");
        assert!(cred.is_service());
        assert!(!cred.is_user());
        assert_eq!(cred.email(), None);
    }

    #[test]
    fn empty_scopes_and_owner_are_rejected() {
        let err = Credential::builder("O1", "x", "owner@example.com")
            .build()
            .expect_err("no scopes");
        assert_eq!(err, CredentialError::NoScopes);

        let err = Credential::builder("O1", "x", "")
            .scope(SCOPE_SERVICE)
            .build()
            .expect_err("no owner");
        assert_eq!(err, CredentialError::MissingOwnerEmail);
    }

    #[test]
    fn defaults_come_from_clock_and_uuid() {
        let clock = FixedClock::new(1_700_000_000);
        let first = Credential::builder("O1", "svc", "owner@example.com")
            .scope(SCOPE_SERVICE)
            .build_with_clock(&clock)
            .expect("cred");
        let second = Credential::builder("O1", "svc", "owner@example.com")
            .scope(SCOPE_SERVICE)
            .build_with_clock(&clock)
            .expect("cred");

        assert_eq!(first.issued_at(), 1_700_000_000);
        assert_eq!(first.not_before(), 1_700_000_000);
        assert_eq!(first.expires_at(), None);
        assert!(Uuid::parse_str(first.token_id()).is_ok());
        assert_ne!(first.token_id(), second.token_id());
    }

    #[test]
    fn claims_mirror_the_credential() {
        let cred = Credential::builder("O1", "alice", "owner@example.com")
            .scopes([SCOPE_USER, SCOPE_ADMIN])
            .email("alice@example.com")
            .token_id("tok-1")
            .issued_at(10)
            .not_before(11)
            .expires_at(12)
            .build()
            .expect("cred");

        let claims = cred.claims();
        assert_eq!(claims.audience, "O1");
        assert_eq!(claims.subject, "alice");
        assert_eq!(claims.issuer, ISSUER);
        assert_eq!(claims.credential_type, CREDENTIAL_TYPE);
        assert_eq!(claims.expires_at, Some(12));
        assert_eq!(claims.scopes.get(SCOPE_ADMIN), Some(&true));

        let value = serde_json::to_value(&cred).expect("serialize");
        assert_eq!(value["ownerEmail"], "owner@example.com");
        assert_eq!(value["jti"], "tok-1");
    }

    #[test]
    fn display_lists_sorted_scopes() {
        let cred = Credential::builder("O1", "alice", "owner@example.com")
            .scopes([SCOPE_USER, SCOPE_ADMIN])
            .email("alice@example.com")
            .build()
            .expect("cred");
        assert_eq!(
            cred.to_string(),
            "<Credential O1 - alice - dw:admin0,dw:user0>"
        );
    }
}
