pub const SCOPE_USER: &str = "dw:user0";
pub const SCOPE_ADMIN: &str = "dw:admin0";
pub const SCOPE_SERVICE: &str = "dw:service0";
pub const SCOPE_SERVICE_REQUESTER: &str = "dw:reqSvc0";
pub const SCOPE_ORGANIZATION: &str = "dw:organization0";
pub const SCOPE_DOPPELGANGER: &str = "dw:doppelganger0";

pub const KNOWN_SCOPES: &[&str] = &[
    SCOPE_ADMIN,
    SCOPE_ORGANIZATION,
    SCOPE_SERVICE_REQUESTER,
    SCOPE_SERVICE,
    SCOPE_USER,
    SCOPE_DOPPELGANGER,
];

/// Human-readable label for a scope, if it is one this system defines.
pub fn scope_description(scope: &str) -> Option<&'static str> {
    match scope {
        SCOPE_ADMIN => Some("Organization administrator"),
        SCOPE_ORGANIZATION => Some("Organization"),
        SCOPE_SERVICE_REQUESTER => Some("Able to request service tokens"),
        SCOPE_SERVICE => Some("Service"),
        SCOPE_USER => Some("User"),
        SCOPE_DOPPELGANGER => Some("Doppelgangers welcome"),
        _ => None,
    }
}
