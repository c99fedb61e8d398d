//! Sub-field redaction for governed resources.
//!
//! Visibility of an agreement does not imply visibility of every field on
//! it. The data-element list and the legal basis are shown to parties and
//! cross-government identities only.

use std::collections::BTreeSet;

use gatehouse_core::{
    AgreementStatus, DataSharingAgreement, DepartmentId, Identity, ResourceAttributes, ResourceId,
    Timestamp,
};
use serde::Serialize;

/// Whether `identity` may see sensitive sub-fields of a resource.
pub fn can_view_sensitive_fields(identity: &Identity, attrs: &ResourceAttributes) -> bool {
    if identity.is_cross_gov {
        return true;
    }
    identity
        .department()
        .map(|d| attrs.is_party(d))
        .unwrap_or(false)
}

/// Agreement as rendered for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementView {
    pub id: ResourceId,
    pub title: String,
    pub providing_department_id: DepartmentId,
    pub consuming_department_id: DepartmentId,
    pub status: AgreementStatus,
    pub effective_date: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<Timestamp>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_elements: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_basis: Option<String>,
    pub redacted: bool,
}

pub fn redact_agreement(identity: &Identity, dsa: &DataSharingAgreement) -> AgreementView {
    let sensitive = can_view_sensitive_fields(identity, &dsa.attributes);
    let attrs = &dsa.attributes;
    AgreementView {
        id: dsa.id.clone(),
        title: dsa.title.clone(),
        providing_department_id: attrs.providing_department_id.clone(),
        consuming_department_id: attrs.consuming_department_id.clone(),
        status: attrs.status,
        effective_date: attrs.effective_date,
        expiry_date: attrs.expiry_date,
        category: attrs.category.clone(),
        purpose: dsa.purpose.clone(),
        data_elements: sensitive.then(|| attrs.data_elements.clone()),
        legal_basis: if sensitive { dsa.legal_basis.clone() } else { None },
        redacted: !sensitive,
    }
}
