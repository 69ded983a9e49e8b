use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::credential::Credential;
use crate::error::ScopeViolation;
use crate::scopes::{
    SCOPE_ADMIN, SCOPE_ORGANIZATION, SCOPE_SERVICE, SCOPE_SERVICE_REQUESTER, SCOPE_USER,
};

/// Scopes a credential must hold and scopes it must not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopePolicy {
    pub must_have: &'static [&'static str],
    pub must_not_have: &'static [&'static str],
}

impl ScopePolicy {
    pub const fn new(
        must_have: &'static [&'static str],
        must_not_have: &'static [&'static str],
    ) -> Self {
        Self {
            must_have,
            must_not_have,
        }
    }

    pub fn evaluate(&self, cred: &Credential) -> Result<(), ScopeViolation> {
        check_scopes(cred, self.must_have, self.must_not_have)
    }
}

/// Earlier revisions of this table disagreed on the org-admin and user
/// must-not sets around service requesters. These are the current rules.
pub const ORG_ADMIN_POLICY: ScopePolicy = ScopePolicy::new(
    &[SCOPE_USER, SCOPE_ADMIN, SCOPE_SERVICE_REQUESTER],
    &[SCOPE_ORGANIZATION, SCOPE_SERVICE],
);

pub const USER_POLICY: ScopePolicy =
    ScopePolicy::new(&[SCOPE_USER], &[SCOPE_ORGANIZATION, SCOPE_SERVICE]);

pub const SERVICE_POLICY: ScopePolicy = ScopePolicy::new(
    &[SCOPE_SERVICE],
    &[SCOPE_ORGANIZATION, SCOPE_USER, SCOPE_SERVICE_REQUESTER],
);

pub const SERVICE_REQUESTER_POLICY: ScopePolicy =
    ScopePolicy::new(&[SCOPE_SERVICE_REQUESTER], &[]);

/// Collect every required scope the credential lacks and every forbidden
/// scope it holds.
pub fn check_scopes<A, B>(
    cred: &Credential,
    must_have: &[A],
    must_not_have: &[B],
) -> Result<(), ScopeViolation>
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let missing: Vec<String> = must_have
        .iter()
        .map(|scope| scope.as_ref())
        .filter(|scope| !cred.has_scope(scope))
        .map(str::to_string)
        .collect();
    let forbidden: Vec<String> = must_not_have
        .iter()
        .map(|scope| scope.as_ref())
        .filter(|scope| cred.has_scope(scope))
        .map(str::to_string)
        .collect();

    if missing.is_empty() && forbidden.is_empty() {
        Ok(())
    } else {
        Err(ScopeViolation { missing, forbidden })
    }
}

/// The canonical authorization roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    OrgAdmin,
    User,
    Service,
    ServiceRequester,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::OrgAdmin,
        Role::User,
        Role::Service,
        Role::ServiceRequester,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Role::OrgAdmin => "org-admin",
            Role::User => "user",
            Role::Service => "service",
            Role::ServiceRequester => "service-requester",
        }
    }

    pub const fn policy(self) -> ScopePolicy {
        match self {
            Role::OrgAdmin => ORG_ADMIN_POLICY,
            Role::User => USER_POLICY,
            Role::Service => SERVICE_POLICY,
            Role::ServiceRequester => SERVICE_REQUESTER_POLICY,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(scopes: &[&str]) -> Credential {
        let mut builder =
            Credential::builder("O1", "subject", "owner@example.com").scopes(scopes.iter().copied());
        if scopes.contains(&SCOPE_USER) {
            builder = builder.email("subject@example.com");
        }
        builder.build().expect("credential")
    }

    #[test]
    fn org_admin_passes_admin_and_user_policies() {
        let admin = cred(&[SCOPE_USER, SCOPE_ADMIN, SCOPE_SERVICE_REQUESTER]);
        assert!(ORG_ADMIN_POLICY.evaluate(&admin).is_ok());
        assert!(USER_POLICY.evaluate(&admin).is_ok());
        assert!(SERVICE_REQUESTER_POLICY.evaluate(&admin).is_ok());
        assert!(SERVICE_POLICY.evaluate(&admin).is_err());
    }

    #[test]
    fn service_only_credential_is_mutually_exclusive_with_user_roles() {
        let service = cred(&[SCOPE_SERVICE]);
        assert!(SERVICE_POLICY.evaluate(&service).is_ok());

        let err = USER_POLICY.evaluate(&service).expect_err("not a user");
        assert_eq!(err.missing, vec![SCOPE_USER.to_string()]);
        assert_eq!(err.forbidden, vec![SCOPE_SERVICE.to_string()]);

        let err = ORG_ADMIN_POLICY.evaluate(&service).expect_err("not an admin");
        assert_eq!(err.missing.len(), 3);
        assert_eq!(err.forbidden, vec![SCOPE_SERVICE.to_string()]);
    }

    #[test]
    fn no_credential_satisfies_both_user_and_service() {
        let both = cred(&[SCOPE_USER, SCOPE_SERVICE]);
        assert!(USER_POLICY.evaluate(&both).is_err());
        assert!(SERVICE_POLICY.evaluate(&both).is_err());
    }

    #[test]
    fn explicit_sets_report_missing_and_forbidden_together() {
        let user = cred(&[SCOPE_USER, SCOPE_ORGANIZATION]);
        let err = check_scopes(&user, &[SCOPE_ADMIN], &[SCOPE_ORGANIZATION.to_string()])
            .expect_err("both");
        assert_eq!(
            err.to_string(),
            "credential is missing scopes: dw:admin0; credential must not have scopes: dw:organization0"
        );
    }

    #[test]
    fn canonical_must_not_sets() {
        assert_eq!(
            ORG_ADMIN_POLICY.must_not_have,
            &[SCOPE_ORGANIZATION, SCOPE_SERVICE]
        );
        assert_eq!(USER_POLICY.must_not_have, &[SCOPE_ORGANIZATION, SCOPE_SERVICE]);
        assert_eq!(
            SERVICE_POLICY.must_not_have,
            &[SCOPE_ORGANIZATION, SCOPE_USER, SCOPE_SERVICE_REQUESTER]
        );
        assert!(SERVICE_REQUESTER_POLICY.must_not_have.is_empty());

        let requester_user = cred(&[SCOPE_USER, SCOPE_SERVICE_REQUESTER]);
        assert!(USER_POLICY.evaluate(&requester_user).is_ok());
    }

    #[test]
    fn empty_policy_always_passes() {
        let none: [&str; 0] = [];
        assert!(check_scopes(&cred(&[SCOPE_SERVICE]), &none, &none).is_ok());
    }

    #[test]
    fn roles_parse_from_names() {
        for role in Role::ALL {
            assert_eq!(role.name().parse::<Role>(), Ok(role));
        }
        assert_eq!(" ORG-ADMIN ".parse::<Role>(), Ok(Role::OrgAdmin));
        assert_eq!(
            "superuser".parse::<Role>(),
            Err(UnknownRole("superuser".to_string()))
        );
        assert_eq!(Role::Service.policy(), SERVICE_POLICY);
    }
}
