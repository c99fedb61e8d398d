use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use gatehouse_core::{DepartmentId, TeamId};
use serde::{Deserialize, Serialize};

use crate::error::{DisclosureError, DisclosureErrorDetail, DisclosureResult};

// ---------------------------------------------------------------------------
// AccessLevel: strictly ordered trust levels
// ---------------------------------------------------------------------------

/// Trust level of a requester relative to a profile owner. Variant order is
/// the trust order, so `Ord` compares levels directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    Public,
    Authenticated,
    Government,
    SameDepartment,
    SameTeam,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::Public,
        AccessLevel::Authenticated,
        AccessLevel::Government,
        AccessLevel::SameDepartment,
        AccessLevel::SameTeam,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Authenticated => "authenticated",
            AccessLevel::Government => "government",
            AccessLevel::SameDepartment => "same-department",
            AccessLevel::SameTeam => "same-team",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = DisclosureErrorDetail;

    fn from_str(s: &str) -> DisclosureResult<Self> {
        AccessLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| {
                DisclosureErrorDetail::new(
                    DisclosureError::InvalidVisibility(format!("unknown access level '{}'", s)),
                    "unknown access level",
                )
            })
    }
}

// ---------------------------------------------------------------------------
// ProfileVisibility: four field sets, cumulative upward
// ---------------------------------------------------------------------------

/// Field names disclosed at each level. The authenticated level has no set
/// of its own and sees exactly the public fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileVisibility {
    pub public: BTreeSet<String>,
    pub government: BTreeSet<String>,
    pub same_department: BTreeSet<String>,
    pub same_team: BTreeSet<String>,
}

fn field_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for ProfileVisibility {
    fn default() -> Self {
        Self {
            public: field_set(&["name", "jobTitle", "departmentName", "teamName", "bio"]),
            government: field_set(&["email", "grade", "skills", "location"]),
            same_department: field_set(&["phone", "workingPattern", "managerName", "officeDays"]),
            same_team: field_set(&["mobile", "homeWorkingDays", "escalationNotes", "availability"]),
        }
    }
}

impl ProfileVisibility {
    /// Fields introduced at exactly `level`.
    pub fn own_fields(&self, level: AccessLevel) -> Option<&BTreeSet<String>> {
        match level {
            AccessLevel::Public => Some(&self.public),
            AccessLevel::Authenticated => None,
            AccessLevel::Government => Some(&self.government),
            AccessLevel::SameDepartment => Some(&self.same_department),
            AccessLevel::SameTeam => Some(&self.same_team),
        }
    }

    /// Union of the level's own set with every lower level's set.
    pub fn visible_fields(&self, level: AccessLevel) -> BTreeSet<String> {
        AccessLevel::ALL
            .into_iter()
            .filter(|l| *l <= level)
            .filter_map(|l| self.own_fields(l))
            .flat_map(|set| set.iter().cloned())
            .collect()
    }

    pub fn all_fields(&self) -> BTreeSet<String> {
        self.visible_fields(AccessLevel::SameTeam)
    }

    pub fn hidden_fields(&self, level: AccessLevel) -> BTreeSet<String> {
        let visible = self.visible_fields(level);
        self.all_fields()
            .into_iter()
            .filter(|f| !visible.contains(f))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Requester and owner
// ---------------------------------------------------------------------------

/// How a requester identity was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    /// Found in the fast-path registry.
    Registry,
    /// Resolved from the requester's external profile document.
    Document,
    /// Resolution failed; the handle's domain is a government domain.
    DegradedGovernmentDomain,
    /// Resolution failed.
    Degraded,
    /// No handle was presented.
    Anonymous,
}

impl Resolution {
    pub fn is_verified(self) -> bool {
        matches!(self, Resolution::Registry | Resolution::Document)
    }
}

/// Attributes returned by a successful resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRequester {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub team_id: Option<TeamId>,
    #[serde(default)]
    pub is_government: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterIdentity {
    pub handle: Option<String>,
    pub name: Option<String>,
    pub domain: Option<String>,
    pub department_id: Option<DepartmentId>,
    pub team_id: Option<TeamId>,
    pub is_government: bool,
    pub resolution: Resolution,
}

impl RequesterIdentity {
    pub fn anonymous() -> Self {
        Self {
            handle: None,
            name: None,
            domain: None,
            department_id: None,
            team_id: None,
            is_government: false,
            resolution: Resolution::Anonymous,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.resolution.is_verified()
    }
}

/// Organisational attributes of the profile owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerAttributes {
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub team_id: Option<TeamId>,
}

/// Outcome of a disclosure evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessEvaluation {
    pub requester: RequesterIdentity,
    pub access_level: AccessLevel,
    pub visible_fields: BTreeSet<String>,
    pub hidden_fields: BTreeSet<String>,
    pub reason: String,
}
