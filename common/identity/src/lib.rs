//! Verification of organization-scoped credentials carried in HS256 tokens,
//! and scope-based authorization on top of them.
//!
//! Untrusted input never panics or errors "hard": decode, claim, and scope
//! problems come back as a [`Rejection`]. [`IdentityError`] is reserved for
//! callers breaking this crate's own preconditions, such as building a
//! [`ScopeGate`] without key material.

pub mod claims;
pub mod clock;
pub mod config;
pub mod credential;
pub mod decoder;
pub mod error;
pub mod gate;
pub mod keys;
pub mod policy;
pub mod scopes;
pub mod verifier;

pub use claims::{CredentialClaims, CREDENTIAL_TYPE, ISSUER};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::IdentityConfig;
pub use credential::{Credential, CredentialBuilder};
pub use decoder::{
    dangerous_unverified_decode, decode_claims, verify_and_decode, SignatureCheck, TokenDecoder,
    ALGORITHM,
};
pub use error::{
    CredentialError, DecodeError, IdentityError, IdentityResult, Rejection, ScopeViolation,
};
pub use gate::{credential_envelope, ScopeGate, CRED_FIELD};
pub use keys::HmacKey;
pub use policy::{
    check_scopes, Role, ScopePolicy, UnknownRole, ORG_ADMIN_POLICY, SERVICE_POLICY,
    SERVICE_REQUESTER_POLICY, USER_POLICY,
};
pub use scopes::{
    scope_description, SCOPE_ADMIN, SCOPE_DOPPELGANGER, SCOPE_ORGANIZATION, SCOPE_SERVICE,
    SCOPE_SERVICE_REQUESTER, SCOPE_USER,
};
pub use verifier::{ClaimViolation, CredentialVerifier, CLOCK_SKEW_SECONDS};
