use gatehouse_core::{Action, GovernedResource, Identity, ResourceType, Timestamp};
use serde::Serialize;
use tracing::debug;

use crate::engine::AttributePolicyEngine;
use crate::role_gate::RoleGate;

/// An item that survived filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredItem<T> {
    pub item: T,
    pub is_historical_access: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterSummary {
    pub allowed: usize,
    pub denied: usize,
    /// Subset of `allowed` granted through a historical policy.
    pub historical: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResult<T> {
    pub items: Vec<FilteredItem<T>>,
    pub total_count: usize,
    pub accessible_count: usize,
    pub summary: FilterSummary,
    /// Set when the whole collection was refused before any item was
    /// evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

impl<T> FilterResult<T> {
    fn refused(total: usize, reason: String) -> Self {
        Self {
            items: Vec::new(),
            total_count: total,
            accessible_count: 0,
            summary: FilterSummary {
                allowed: 0,
                denied: total,
                historical: 0,
            },
            refusal: Some(reason),
        }
    }

    pub fn into_items(self) -> Vec<T> {
        self.items.into_iter().map(|f| f.item).collect()
    }

    /// Transform every kept item, leaving counts untouched.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> FilterResult<U> {
        FilterResult {
            items: self
                .items
                .into_iter()
                .map(|fi| FilteredItem {
                    item: f(fi.item),
                    is_historical_access: fi.is_historical_access,
                })
                .collect(),
            total_count: self.total_count,
            accessible_count: self.accessible_count,
            summary: self.summary,
            refusal: self.refusal,
        }
    }
}

/// Applies the role gate and the attribute policies across a collection of
/// governed resources.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    role_gate: RoleGate,
    engine: AttributePolicyEngine,
}

impl ListFilter {
    pub fn new(role_gate: RoleGate, engine: AttributePolicyEngine) -> Self {
        Self { role_gate, engine }
    }

    pub fn role_gate(&self) -> &RoleGate {
        &self.role_gate
    }

    pub fn engine(&self) -> &AttributePolicyEngine {
        &self.engine
    }

    pub fn filter_collection<T: GovernedResource>(
        &self,
        identity: &Identity,
        action: Action,
        items: Vec<T>,
    ) -> FilterResult<T> {
        self.filter_collection_at(identity, action, items, Timestamp::now())
    }

    /// One role-gate check and one potential-access check for the whole
    /// collection, then one policy evaluation per item. Items reachable
    /// only through historical access are kept for reads alone.
    pub fn filter_collection_at<T: GovernedResource>(
        &self,
        identity: &Identity,
        action: Action,
        items: Vec<T>,
        now: Timestamp,
    ) -> FilterResult<T> {
        let total = items.len();

        let check = self
            .role_gate
            .check_permission(identity.role, action, ResourceType::Agreement);
        if !check.allowed {
            debug!(user = %identity.user_id, total, "list filter: role gate refused collection");
            return FilterResult::refused(total, check.reason);
        }

        if !self.engine.can_potentially_access(identity) {
            debug!(user = %identity.user_id, total, "list filter: no policy can allow identity");
            return FilterResult::refused(
                total,
                "Identity cannot access any governed resource".to_string(),
            );
        }

        let mut summary = FilterSummary::default();
        let mut kept = Vec::new();
        for item in items {
            let decision = self
                .engine
                .evaluate_action_at(identity, action, item.attributes(), now);
            if decision.is_allowed() {
                summary.allowed += 1;
                if decision.is_historical_access {
                    summary.historical += 1;
                }
                kept.push(FilteredItem {
                    item,
                    is_historical_access: decision.is_historical_access,
                });
            } else {
                summary.denied += 1;
            }
        }

        debug!(
            user = %identity.user_id,
            total,
            allowed = summary.allowed,
            historical = summary.historical,
            "list filter: collection evaluated"
        );

        FilterResult {
            accessible_count: kept.len(),
            items: kept,
            total_count: total,
            summary,
            refusal: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::{
        AgreementStatus, DataSharingAgreement, DepartmentId, IdentitySource, ResourceAttributes,
        ResourceId, Role, UserId,
    };
    use std::collections::BTreeSet;

    const NOW: u64 = 1_700_000_000;

    fn make_identity(dept: Option<&str>, role: Role, cross_gov: bool) -> Identity {
        Identity {
            user_id: UserId::new("u-1"),
            name: "Tester".into(),
            department_id: dept.map(DepartmentId::new),
            role,
            source: IdentitySource::Session,
            is_government: dept.is_some(),
            is_cross_gov: cross_gov,
        }
    }

    fn make_dsa(id: &str, provider: &str, consumer: &str, status: AgreementStatus) -> DataSharingAgreement {
        DataSharingAgreement {
            id: ResourceId::new(id),
            title: format!("Agreement {}", id),
            attributes: ResourceAttributes {
                providing_department_id: DepartmentId::new(provider),
                consuming_department_id: DepartmentId::new(consumer),
                status,
                effective_date: Timestamp::from_seconds(NOW - 86_400),
                expiry_date: None,
                review_date: None,
                data_elements: BTreeSet::new(),
                category: "benefits".into(),
            },
            purpose: None,
            legal_basis: None,
        }
    }

    fn catalogue() -> Vec<DataSharingAgreement> {
        vec![
            make_dsa("a", "rts", "dcs", AgreementStatus::Active),
            make_dsa("b", "dcs", "rts", AgreementStatus::Expired),
            make_dsa("c", "bia", "dcs", AgreementStatus::Active),
            make_dsa("d", "rts", "bia", AgreementStatus::Draft),
        ]
    }

    #[test]
    fn test_member_sees_party_agreements() {
        let filter = ListFilter::default();
        let identity = make_identity(Some("rts"), Role::DepartmentMember, false);
        let result = filter.filter_collection_at(
            &identity,
            Action::Read,
            catalogue(),
            Timestamp::from_seconds(NOW),
        );

        assert_eq!(result.total_count, 4);
        assert_eq!(result.accessible_count, 2);
        assert_eq!(result.summary.allowed, 2);
        assert_eq!(result.summary.denied, 2);
        assert_eq!(result.summary.historical, 1);
        assert!(result.refusal.is_none());

        let ids: Vec<&str> = result.items.iter().map(|f| f.item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(result.items[1].is_historical_access);
    }

    #[test]
    fn test_role_gate_short_circuits() {
        let filter = ListFilter::default();
        let identity = make_identity(Some("rts"), Role::PublicViewer, false);
        let result = filter.filter_collection_at(
            &identity,
            Action::Read,
            catalogue(),
            Timestamp::from_seconds(NOW),
        );
        assert!(result.items.is_empty());
        assert_eq!(result.summary.denied, 4);
        assert!(result.refusal.unwrap().contains("agreement"));
    }

    #[test]
    fn test_member_export_refused_by_gate() {
        let filter = ListFilter::default();
        let identity = make_identity(Some("rts"), Role::DepartmentMember, false);
        let result = filter.filter_collection_at(
            &identity,
            Action::Export,
            catalogue(),
            Timestamp::from_seconds(NOW),
        );
        assert_eq!(result.accessible_count, 0);
        assert!(result.refusal.unwrap().contains("export"));
    }

    #[test]
    fn test_potential_access_short_circuits() {
        let filter = ListFilter::default();
        let identity = make_identity(None, Role::DepartmentMember, false);
        let result = filter.filter_collection_at(
            &identity,
            Action::Read,
            catalogue(),
            Timestamp::from_seconds(NOW),
        );
        assert_eq!(result.accessible_count, 0);
        assert_eq!(result.summary.denied, result.total_count);
        assert!(result.refusal.is_some());
    }

    #[test]
    fn test_cross_gov_sees_everything() {
        let filter = ListFilter::default();
        let identity = make_identity(Some("gds"), Role::CrossGovAnalyst, true);
        let result = filter.filter_collection_at(
            &identity,
            Action::Export,
            catalogue(),
            Timestamp::from_seconds(NOW),
        );
        assert_eq!(result.accessible_count, 4);
        assert_eq!(result.summary.historical, 0);
        assert_eq!(result.into_items().len(), 4);
    }

    #[test]
    fn test_export_excludes_historical_items() {
        let filter = ListFilter::default();
        let identity = make_identity(Some("rts"), Role::DepartmentAnalyst, false);
        let result = filter.filter_collection_at(
            &identity,
            Action::Export,
            catalogue(),
            Timestamp::from_seconds(NOW),
        );

        let ids: Vec<&str> = result.items.iter().map(|f| f.item.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(result.summary.allowed, 1);
        assert_eq!(result.summary.denied, 3);
        assert_eq!(result.summary.historical, 0);
    }

    #[test]
    fn test_counts_always_balance() {
        let filter = ListFilter::default();
        let identities = [
            make_identity(Some("rts"), Role::DepartmentMember, false),
            make_identity(Some("dcs"), Role::DepartmentAnalyst, false),
            make_identity(Some("bia"), Role::DepartmentMember, false),
            make_identity(None, Role::PublicViewer, false),
            make_identity(Some("gds"), Role::CrossGovAnalyst, true),
            make_identity(Some("rts"), Role::PlatformAdmin, false),
        ];
        for identity in &identities {
            for action in Action::ALL {
                let result = filter.filter_collection_at(
                    identity,
                    action,
                    catalogue(),
                    Timestamp::from_seconds(NOW),
                );
                assert_eq!(
                    result.accessible_count + result.summary.denied,
                    result.total_count
                );
                assert_eq!(result.accessible_count, result.items.len());
            }
        }
    }

    #[test]
    fn test_empty_collection() {
        let filter = ListFilter::default();
        let identity = make_identity(Some("rts"), Role::DepartmentMember, false);
        let result = filter.filter_collection_at(
            &identity,
            Action::Read,
            Vec::<DataSharingAgreement>::new(),
            Timestamp::from_seconds(NOW),
        );
        assert_eq!(result.total_count, 0);
        assert_eq!(result.summary, FilterSummary::default());
    }
}
