use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

// ---------------------------------------------------------------------------
// Timestamp: canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

/// Serialized as an RFC 3339 string so that records stay flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        chrono::Utc::now().into()
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    /// Parse an RFC 3339 string such as `2024-04-01T00:00:00Z`.
    pub fn parse_rfc3339(s: &str) -> CoreResult<Self> {
        let dt = chrono::DateTime::parse_from_rfc3339(s)
            .map_err(|e| CoreError::InvalidTimestamp(format!("{}: {}", s, e)))?;
        let utc = dt.with_timezone(&chrono::Utc);
        if utc.timestamp() < 0 {
            return Err(CoreError::InvalidTimestamp(format!(
                "{}: before the unix epoch",
                s
            )));
        }
        Ok(utc.into())
    }

    pub fn to_rfc3339(&self) -> String {
        let dt =
            chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, self.nanoseconds);
        dt.map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }

    pub fn plus_seconds(&self, seconds: u64) -> Self {
        Self {
            seconds_since_epoch: self.seconds_since_epoch.saturating_add(seconds),
            nanoseconds: self.nanoseconds,
        }
    }

    pub fn minus_seconds(&self, seconds: u64) -> Self {
        Self {
            seconds_since_epoch: self.seconds_since_epoch.saturating_sub(seconds),
            nanoseconds: self.nanoseconds,
        }
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds_since_epoch: dt.timestamp().max(0) as u64,
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let dt = chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, self.nanoseconds)
            .ok_or_else(|| serde::ser::Error::custom("timestamp out of range"))?;
        serializer.serialize_str(&dt.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse_rfc3339(&s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Typed identifiers: prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(UserId, "Identifier of a requesting user.");
define_id!(DepartmentId, "Short identifier of a government department.");
define_id!(TeamId, "Identifier of a team inside a department.");
define_id!(ResourceId, "Identifier of a governed resource.");
define_id!(PolicyId, "Identifier of an attribute policy.");
define_id!(RequestId, "Identifier of an inbound request, carried into audit.");

// ---------------------------------------------------------------------------
// Role: the closed canonical role set
// ---------------------------------------------------------------------------

/// Canonical roles. Exhaustive (no #[non_exhaustive]) so that adding a role
/// forces review of the permission matrix and every role mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    PublicViewer,
    DepartmentMember,
    DepartmentAnalyst,
    CrossGovAnalyst,
    PlatformAdmin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::PublicViewer,
        Role::DepartmentMember,
        Role::DepartmentAnalyst,
        Role::CrossGovAnalyst,
        Role::PlatformAdmin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::PublicViewer => "public-viewer",
            Role::DepartmentMember => "department-member",
            Role::DepartmentAnalyst => "department-analyst",
            Role::CrossGovAnalyst => "cross-gov-analyst",
            Role::PlatformAdmin => "platform-admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| CoreError::UnknownRole(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// DepartmentScope: how far a role's data reads reach
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepartmentScope {
    /// No departmental data.
    None,
    /// The identity's own department.
    Own,
    /// Departments the identity is a party with; needs ABAC downstream.
    Party,
    /// Every department.
    All,
    /// Management surfaces only, never data reads.
    Admin,
}

impl fmt::Display for DepartmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepartmentScope::None => "none",
            DepartmentScope::Own => "own",
            DepartmentScope::Party => "party",
            DepartmentScope::All => "all",
            DepartmentScope::Admin => "admin",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Action and ResourceType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Read,
    Export,
    Create,
    Update,
    Delete,
    Manage,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Read,
        Action::Export,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Manage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Export => "export",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::UnknownAction(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Service,
    Team,
    Department,
    /// A cross-department data-sharing agreement.
    Agreement,
    Profile,
    User,
    AuditLog,
}

impl ResourceType {
    pub const ALL: [ResourceType; 7] = [
        ResourceType::Service,
        ResourceType::Team,
        ResourceType::Department,
        ResourceType::Agreement,
        ResourceType::Profile,
        ResourceType::User,
        ResourceType::AuditLog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Service => "service",
            ResourceType::Team => "team",
            ResourceType::Department => "department",
            ResourceType::Agreement => "agreement",
            ResourceType::Profile => "profile",
            ResourceType::User => "user",
            ResourceType::AuditLog => "audit-log",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownResourceType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Decision: two-way outcome shared by every component
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allow(self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Deny => "DENY",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive: `allow` and `ALLOW` both parse.
impl FromStr for Decision {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        [Decision::Allow, Decision::Deny]
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownDecision(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Identity: the canonical per-request requester
// ---------------------------------------------------------------------------

/// Where an identity was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentitySource {
    Session,
    Pod,
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentitySource::Session => f.write_str("session"),
            IdentitySource::Pod => f.write_str("pod"),
        }
    }
}

impl FromStr for IdentitySource {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "session" => Ok(IdentitySource::Session),
            "pod" => Ok(IdentitySource::Pod),
            other => Err(CoreError::UnknownSource(other.to_string())),
        }
    }
}

/// Canonical identity, built per request by a session mapper or Pod
/// resolver. Never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    pub role: Role,
    pub source: IdentitySource,
    #[serde(default)]
    pub is_government: bool,
    #[serde(default)]
    pub is_cross_gov: bool,
}

impl Identity {
    /// Anonymous visitor with no department and the least-privileged role.
    pub fn anonymous() -> Self {
        Self {
            user_id: UserId::new("anonymous"),
            name: "Anonymous".to_string(),
            department_id: None,
            role: Role::PublicViewer,
            source: IdentitySource::Session,
            is_government: false,
            is_cross_gov: false,
        }
    }

    pub fn department(&self) -> Option<&DepartmentId> {
        self.department_id.as_ref()
    }
}

// ---------------------------------------------------------------------------
// AuditContext: request metadata carried into the audit trail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditContext {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub request_id: Option<RequestId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::from_seconds(100);
        let t2 = Timestamp::from_seconds(200);
        assert!(t1 < t2);
        assert_eq!(t1.plus_seconds(100), t2);
        assert_eq!(t2.minus_seconds(100), t1);
    }

    #[test]
    fn test_timestamp_minus_saturates() {
        assert_eq!(
            Timestamp::from_seconds(5).minus_seconds(10),
            Timestamp::from_seconds(0)
        );
    }

    #[test]
    fn test_timestamp_rfc3339_roundtrip() {
        let t = Timestamp::from_seconds(1_700_000_000);
        let s = t.to_rfc3339();
        assert!(s.contains("2023"));
        assert_eq!(Timestamp::parse_rfc3339(&s).unwrap(), t);
    }

    #[test]
    fn test_timestamp_serializes_as_rfc3339_string() {
        let t = Timestamp::parse_rfc3339("2024-04-01T09:30:00.250Z").unwrap();
        let json = serde_json::to_value(t).unwrap();
        assert_eq!(json, serde_json::json!("2024-04-01T09:30:00.250+00:00"));
        let back: Timestamp = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);

        assert!(serde_json::from_str::<Timestamp>("\"next tuesday\"").is_err());
        assert!(serde_json::from_str::<Timestamp>("1700000000").is_err());
    }

    #[test]
    fn test_timestamp_parse_rejects_garbage() {
        assert!(matches!(
            Timestamp::parse_rfc3339("yesterday"),
            Err(CoreError::InvalidTimestamp(_))
        ));
        assert!(Timestamp::parse_rfc3339("1960-01-01T00:00:00Z").is_err());
    }

    #[test]
    fn test_role_parse_and_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert_eq!(
            "super-user".parse::<Role>(),
            Err(CoreError::UnknownRole("super-user".into()))
        );
    }

    #[test]
    fn test_role_serde_is_kebab_case() {
        let json = serde_json::to_string(&Role::CrossGovAnalyst).unwrap();
        assert_eq!(json, "\"cross-gov-analyst\"");
    }

    #[test]
    fn test_action_and_resource_type_parse() {
        assert_eq!("export".parse::<Action>().unwrap(), Action::Export);
        assert_eq!(
            "audit-log".parse::<ResourceType>().unwrap(),
            ResourceType::AuditLog
        );
        assert!("fly".parse::<Action>().is_err());
        assert!("spaceship".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(Decision::Allow.to_string(), "ALLOW");
        assert_eq!(Decision::Deny.to_string(), "DENY");
        assert!(Decision::Allow.is_allow());
        assert!(!Decision::Deny.is_allow());
        assert_eq!("deny".parse::<Decision>().unwrap(), Decision::Deny);
        assert_eq!("ALLOW".parse::<Decision>().unwrap(), Decision::Allow);
        assert!("maybe".parse::<Decision>().is_err());
    }

    #[test]
    fn test_identity_json_shape() {
        let json = r#"{
            "userId": "u-1",
            "name": "Rita",
            "departmentId": "rts",
            "role": "department-member",
            "source": "session",
            "isGovernment": true
        }"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.department().unwrap().as_str(), "rts");
        assert_eq!(identity.role, Role::DepartmentMember);
        assert!(!identity.is_cross_gov);
    }

    #[test]
    fn test_anonymous_identity_is_least_privileged() {
        let anon = Identity::anonymous();
        assert_eq!(anon.role, Role::PublicViewer);
        assert!(anon.department_id.is_none());
        assert!(!anon.is_government);
    }

    #[test]
    fn test_typed_ids_are_transparent() {
        let id = DepartmentId::new("dcs");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dcs\"");
    }
}
