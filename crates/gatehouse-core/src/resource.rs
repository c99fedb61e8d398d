use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::types::{DepartmentId, ResourceId, Timestamp};

// ---------------------------------------------------------------------------
// AgreementStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgreementStatus {
    Active,
    Draft,
    Expired,
    UnderReview,
}

impl AgreementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgreementStatus::Active => "active",
            AgreementStatus::Draft => "draft",
            AgreementStatus::Expired => "expired",
            AgreementStatus::UnderReview => "under-review",
        }
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgreementStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "active" => Ok(AgreementStatus::Active),
            "draft" => Ok(AgreementStatus::Draft),
            "expired" => Ok(AgreementStatus::Expired),
            "under-review" => Ok(AgreementStatus::UnderReview),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceAttributes: flat attribute bag evaluated by the policy engine
// ---------------------------------------------------------------------------

/// Attributes of a governed resource. The reference shape is a
/// data-sharing agreement between a providing and a consuming department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttributes {
    pub providing_department_id: DepartmentId,
    pub consuming_department_id: DepartmentId,
    pub status: AgreementStatus,
    pub effective_date: Timestamp,
    #[serde(default)]
    pub expiry_date: Option<Timestamp>,
    #[serde(default)]
    pub review_date: Option<Timestamp>,
    #[serde(default)]
    pub data_elements: BTreeSet<String>,
    #[serde(default)]
    pub category: String,
}

impl ResourceAttributes {
    /// Whether `department` is named on either side of the agreement.
    pub fn is_party(&self, department: &DepartmentId) -> bool {
        self.providing_department_id == *department || self.consuming_department_id == *department
    }
}

// ---------------------------------------------------------------------------
// DataSharingAgreement: the reference governed resource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSharingAgreement {
    pub id: ResourceId,
    pub title: String,
    #[serde(flatten)]
    pub attributes: ResourceAttributes,
    #[serde(default)]
    pub purpose: Option<String>,
    /// Statutory basis for the sharing. Disclosed to parties only.
    #[serde(default)]
    pub legal_basis: Option<String>,
}

/// Any resource that can be adapted to a flat attribute bag.
pub trait GovernedResource {
    fn resource_id(&self) -> &ResourceId;
    fn attributes(&self) -> &ResourceAttributes;
}

impl GovernedResource for DataSharingAgreement {
    fn resource_id(&self) -> &ResourceId {
        &self.id
    }

    fn attributes(&self) -> &ResourceAttributes {
        &self.attributes
    }
}

impl<T: GovernedResource + ?Sized> GovernedResource for &T {
    fn resource_id(&self) -> &ResourceId {
        (**self).resource_id()
    }

    fn attributes(&self) -> &ResourceAttributes {
        (**self).attributes()
    }
}
