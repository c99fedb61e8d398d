//! Mapping of outer role vocabularies onto the canonical role set.
//!
//! The admin panel speaks its own role strings. They are parsed into a
//! closed enum once, then mapped with an exhaustive match. Anything the
//! parser does not recognise lands on the least-privileged role.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use gatehouse_core::{DepartmentId, Identity, IdentitySource, Role, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Role strings used by the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExternalRole {
    SuperAdmin,
    Admin,
    Editor,
    Analyst,
    Viewer,
}

impl ExternalRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ExternalRole::SuperAdmin => "super-admin",
            ExternalRole::Admin => "admin",
            ExternalRole::Editor => "editor",
            ExternalRole::Analyst => "analyst",
            ExternalRole::Viewer => "viewer",
        }
    }
}

impl fmt::Display for ExternalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExternalRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "super-admin" | "superadmin" => Ok(ExternalRole::SuperAdmin),
            "admin" => Ok(ExternalRole::Admin),
            "editor" => Ok(ExternalRole::Editor),
            "analyst" => Ok(ExternalRole::Analyst),
            "viewer" => Ok(ExternalRole::Viewer),
            _ => Err(()),
        }
    }
}

/// The fixed set of central / oversight departments whose members are
/// elevated to cross-government roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrossGovDepartments(BTreeSet<DepartmentId>);

impl CrossGovDepartments {
    pub fn new<I, S>(departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(departments.into_iter().map(|d| DepartmentId::new(d)).collect())
    }

    pub fn contains(&self, department: &DepartmentId) -> bool {
        self.0.contains(department)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DepartmentId> {
        self.0.iter()
    }
}

impl Default for CrossGovDepartments {
    fn default() -> Self {
        Self::new(["cabinet-office", "hm-treasury", "gds", "nao"])
    }
}

/// Map a parsed admin-panel role onto the canonical role set.
///
/// Central departments win over the nominal role: the top admin role maps
/// to platform-admin and everything else to cross-gov-analyst.
pub fn map_role(external: ExternalRole, is_central: bool) -> Role {
    if is_central {
        return match external {
            ExternalRole::SuperAdmin => Role::PlatformAdmin,
            ExternalRole::Admin
            | ExternalRole::Editor
            | ExternalRole::Analyst
            | ExternalRole::Viewer => Role::CrossGovAnalyst,
        };
    }
    match external {
        ExternalRole::SuperAdmin | ExternalRole::Admin => Role::PlatformAdmin,
        ExternalRole::Analyst => Role::DepartmentAnalyst,
        ExternalRole::Editor => Role::DepartmentMember,
        ExternalRole::Viewer => Role::PublicViewer,
    }
}

/// Map a raw admin-panel role string. Unrecognised strings map to
/// public-viewer, even for central departments.
pub fn map_external_role(
    raw: &str,
    department: Option<&DepartmentId>,
    central: &CrossGovDepartments,
) -> Role {
    let is_central = department.map(|d| central.contains(d)).unwrap_or(false);
    match raw.parse::<ExternalRole>() {
        Ok(external) => map_role(external, is_central),
        Err(()) => {
            debug!(raw_role = raw, "unrecognised external role, using public-viewer");
            Role::PublicViewer
        }
    }
}

/// Attributes handed over by the session collaborator, before mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAttributes {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    pub role: String,
}

/// Builds canonical identities from collaborator-supplied attributes.
#[derive(Debug, Clone, Default)]
pub struct IdentityFactory {
    central: CrossGovDepartments,
}

impl IdentityFactory {
    pub fn new(central: CrossGovDepartments) -> Self {
        Self { central }
    }

    pub fn central_departments(&self) -> &CrossGovDepartments {
        &self.central
    }

    pub fn is_cross_gov_department(&self, department: Option<&DepartmentId>) -> bool {
        department.map(|d| self.central.contains(d)).unwrap_or(false)
    }

    /// Identity for a signed-in staff session. An unrecognised role keeps
    /// the least-privilege mapping and never gains cross-government reach,
    /// even inside a central department.
    pub fn from_session(&self, attrs: SessionAttributes) -> Identity {
        let role = map_external_role(&attrs.role, attrs.department_id.as_ref(), &self.central);
        let recognised = attrs.role.parse::<ExternalRole>().is_ok();
        let is_cross_gov =
            recognised && self.is_cross_gov_department(attrs.department_id.as_ref());
        Identity {
            user_id: attrs.user_id,
            name: attrs.name,
            is_government: attrs.department_id.is_some(),
            department_id: attrs.department_id,
            role,
            source: IdentitySource::Session,
            is_cross_gov,
        }
    }

    /// Identity for a requester resolved from an external profile document.
    /// Pod requesters never hold admin roles.
    pub fn from_pod(
        &self,
        handle: &str,
        name: Option<&str>,
        department: Option<DepartmentId>,
        is_government: bool,
    ) -> Identity {
        let is_cross_gov = self.is_cross_gov_department(department.as_ref());
        let role = if is_cross_gov {
            Role::CrossGovAnalyst
        } else if department.is_some() {
            Role::DepartmentMember
        } else {
            Role::PublicViewer
        };
        Identity {
            user_id: UserId::new(handle),
            name: name.unwrap_or(handle).to_string(),
            department_id: department,
            role,
            source: IdentitySource::Pod,
            is_government,
            is_cross_gov,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn central() -> CrossGovDepartments {
        CrossGovDepartments::default()
    }

    #[test]
    fn test_external_role_parse_is_lenient_on_case() {
        assert_eq!("Super_Admin".parse::<ExternalRole>(), Ok(ExternalRole::SuperAdmin));
        assert_eq!(" viewer ".parse::<ExternalRole>(), Ok(ExternalRole::Viewer));
        assert!("janitor".parse::<ExternalRole>().is_err());
    }

    #[test]
    fn test_non_central_mapping() {
        assert_eq!(map_role(ExternalRole::SuperAdmin, false), Role::PlatformAdmin);
        assert_eq!(map_role(ExternalRole::Admin, false), Role::PlatformAdmin);
        assert_eq!(map_role(ExternalRole::Analyst, false), Role::DepartmentAnalyst);
        assert_eq!(map_role(ExternalRole::Editor, false), Role::DepartmentMember);
        assert_eq!(map_role(ExternalRole::Viewer, false), Role::PublicViewer);
    }

    #[test]
    fn test_central_department_elevation() {
        let gds = DepartmentId::new("gds");
        assert_eq!(
            map_external_role("super-admin", Some(&gds), &central()),
            Role::PlatformAdmin
        );
        for raw in ["admin", "editor", "analyst", "viewer"] {
            assert_eq!(
                map_external_role(raw, Some(&gds), &central()),
                Role::CrossGovAnalyst,
                "{} in a central department",
                raw
            );
        }
    }

    #[test]
    fn test_unknown_role_defaults_to_least_privilege() {
        let gds = DepartmentId::new("gds");
        assert_eq!(map_external_role("root", None, &central()), Role::PublicViewer);
        assert_eq!(
            map_external_role("root", Some(&gds), &central()),
            Role::PublicViewer
        );
    }

    #[test]
    fn test_factory_from_session() {
        let factory = IdentityFactory::default();
        let identity = factory.from_session(SessionAttributes {
            user_id: UserId::new("u-7"),
            name: "Rita".into(),
            department_id: Some(DepartmentId::new("rts")),
            role: "editor".into(),
        });
        assert_eq!(identity.role, Role::DepartmentMember);
        assert!(identity.is_government);
        assert!(!identity.is_cross_gov);
        assert_eq!(identity.source, IdentitySource::Session);
    }

    #[test]
    fn test_factory_from_session_central() {
        let factory = IdentityFactory::default();
        let identity = factory.from_session(SessionAttributes {
            user_id: UserId::new("u-8"),
            name: "Nadia".into(),
            department_id: Some(DepartmentId::new("nao")),
            role: "viewer".into(),
        });
        assert_eq!(identity.role, Role::CrossGovAnalyst);
        assert!(identity.is_cross_gov);
    }

    #[test]
    fn test_factory_unknown_role_in_central_department_fails_closed() {
        let factory = IdentityFactory::default();
        let identity = factory.from_session(SessionAttributes {
            user_id: UserId::new("u-10"),
            name: "Casey".into(),
            department_id: Some(DepartmentId::new("cabinet-office")),
            role: "overlord".into(),
        });
        assert_eq!(identity.role, Role::PublicViewer);
        assert!(!identity.is_cross_gov);
        assert!(identity.is_government);
    }

    #[test]
    fn test_factory_from_session_without_department() {
        let factory = IdentityFactory::default();
        let identity = factory.from_session(SessionAttributes {
            user_id: UserId::new("u-9"),
            name: "Visitor".into(),
            department_id: None,
            role: "viewer".into(),
        });
        assert!(!identity.is_government);
        assert_eq!(identity.role, Role::PublicViewer);
    }

    #[test]
    fn test_factory_from_pod() {
        let factory = IdentityFactory::default();
        let member = factory.from_pod(
            "https://sam.pods.dso.gov.uk/profile/card#me",
            Some("Sam"),
            Some(DepartmentId::new("dso")),
            true,
        );
        assert_eq!(member.role, Role::DepartmentMember);
        assert_eq!(member.source, IdentitySource::Pod);
        assert_eq!(member.name, "Sam");

        let visitor = factory.from_pod("https://someone.example/#me", None, None, false);
        assert_eq!(visitor.role, Role::PublicViewer);
        assert_eq!(visitor.name, "https://someone.example/#me");
    }
}
