use gatehouse_core::{Action, Decision, Identity, ResourceAttributes, Role, Timestamp};
use tracing::debug;

use crate::condition::evaluate_condition;
use crate::types::{AccessDecision, Policy, PolicyEvaluationResult, PolicySet};

// ---------------------------------------------------------------------------
// AttributePolicyEngine: ordered, first-ALLOW-wins ABAC
// ---------------------------------------------------------------------------

/// Attribute-based policy engine for governed cross-department resources.
///
/// Policies run in ascending priority. The first ALLOW wins and carries the
/// trace of every policy evaluated up to it. When nothing allows, the
/// result is DENY with every policy's reasons concatenated.
#[derive(Debug, Clone, Default)]
pub struct AttributePolicyEngine {
    policies: PolicySet,
}

impl AttributePolicyEngine {
    pub fn new(policies: PolicySet) -> Self {
        Self { policies }
    }

    pub fn policy_set(&self) -> &PolicySet {
        &self.policies
    }

    /// Evaluate a single policy. Every condition is evaluated so that all
    /// failure reasons are collected; any unmet required condition fails
    /// the policy.
    pub fn evaluate_policy(
        &self,
        policy: &Policy,
        identity: &Identity,
        attrs: &ResourceAttributes,
        now: Timestamp,
    ) -> PolicyEvaluationResult {
        let mut met = Vec::new();
        let mut failures = Vec::new();

        for pc in &policy.conditions {
            let outcome = evaluate_condition(&pc.condition, identity, attrs, now);
            if outcome.matched {
                met.push(outcome.reason);
            } else if pc.required {
                failures.push(outcome.reason);
            }
        }

        if failures.is_empty() {
            PolicyEvaluationResult {
                policy_id: policy.id.clone(),
                result: Decision::Allow,
                reason: format!("{}: {}", policy.name, met.join(", ")),
            }
        } else {
            PolicyEvaluationResult {
                policy_id: policy.id.clone(),
                result: Decision::Deny,
                reason: failures.join(", "),
            }
        }
    }

    pub fn evaluate_access(&self, identity: &Identity, attrs: &ResourceAttributes) -> AccessDecision {
        self.evaluate_access_at(identity, attrs, Timestamp::now())
    }

    /// Deterministic evaluation against a fixed `now`.
    pub fn evaluate_access_at(
        &self,
        identity: &Identity,
        attrs: &ResourceAttributes,
        now: Timestamp,
    ) -> AccessDecision {
        let mut trace = Vec::with_capacity(self.policies.policies().len());

        for policy in self.policies.policies() {
            let result = self.evaluate_policy(policy, identity, attrs, now);
            let allowed = result.result.is_allow();
            let reason = result.reason.clone();
            trace.push(result);

            if allowed {
                debug!(
                    user = %identity.user_id,
                    policy = %policy.id,
                    historical = policy.historical,
                    "attribute policy allowed access"
                );
                return AccessDecision {
                    decision: Decision::Allow,
                    reason,
                    policies_evaluated: trace,
                    is_historical_access: policy.historical,
                };
            }
        }

        let reason = trace
            .iter()
            .map(|r| format!("{}: {}", r.policy_id, r.reason))
            .collect::<Vec<_>>()
            .join("; ");
        debug!(user = %identity.user_id, policies = trace.len(), "attribute policies denied access");

        AccessDecision {
            decision: Decision::Deny,
            reason,
            policies_evaluated: trace,
            is_historical_access: false,
        }
    }

    pub fn evaluate_action(
        &self,
        identity: &Identity,
        action: Action,
        attrs: &ResourceAttributes,
    ) -> AccessDecision {
        self.evaluate_action_at(identity, action, attrs, Timestamp::now())
    }

    /// Evaluate access for a specific action. Historical access is
    /// read-only: any other action granted through a historical policy is
    /// turned into a DENY that keeps the evaluation trace.
    pub fn evaluate_action_at(
        &self,
        identity: &Identity,
        action: Action,
        attrs: &ResourceAttributes,
        now: Timestamp,
    ) -> AccessDecision {
        let decision = self.evaluate_access_at(identity, attrs, now);
        if decision.is_historical_access && action != Action::Read {
            debug!(
                user = %identity.user_id,
                action = %action,
                "historical access refused for non-read action"
            );
            return AccessDecision {
                decision: Decision::Deny,
                reason: format!(
                    "Historical access is read-only: {} is not permitted on an expired agreement",
                    action
                ),
                policies_evaluated: decision.policies_evaluated,
                is_historical_access: false,
            };
        }
        decision
    }

    /// Cheap pre-check used before walking a collection. `false` means no
    /// policy in the standard set could allow this identity anything.
    pub fn can_potentially_access(&self, identity: &Identity) -> bool {
        if identity.is_cross_gov {
            return true;
        }
        if identity.department().is_none() {
            return false;
        }
        matches!(
            identity.role,
            Role::DepartmentMember | Role::DepartmentAnalyst | Role::CrossGovAnalyst
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::types::{PolicyCondition, CROSS_GOV_OVERRIDE, HISTORICAL_ACCESS, STANDARD_ACCESS};
    use gatehouse_core::{AgreementStatus, DepartmentId, IdentitySource, PolicyId, UserId};
    use std::collections::BTreeSet;

    const NOW: u64 = 1_700_000_000;

    fn now() -> Timestamp {
        Timestamp::from_seconds(NOW)
    }

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

    fn make_dsa(status: AgreementStatus, effective: u64, expiry: Option<u64>) -> ResourceAttributes {
        ResourceAttributes {
            providing_department_id: DepartmentId::new("rts"),
            consuming_department_id: DepartmentId::new("dcs"),
            status,
            effective_date: Timestamp::from_seconds(effective),
            expiry_date: expiry.map(Timestamp::from_seconds),
            review_date: None,
            data_elements: BTreeSet::new(),
            category: "benefits".into(),
        }
    }

    fn active_dsa() -> ResourceAttributes {
        make_dsa(AgreementStatus::Active, NOW - 86_400, None)
    }

    #[test]
    fn test_party_gets_standard_access() {
        let engine = AttributePolicyEngine::default();
        let identity = make_identity(Some("rts"), Role::DepartmentMember, false);
        let decision = engine.evaluate_access_at(&identity, &active_dsa(), now());

        assert_eq!(decision.decision, Decision::Allow);
        assert!(decision.reason.contains("provider"));
        assert!(!decision.is_historical_access);
        assert_eq!(
            decision.policies_evaluated.last().unwrap().policy_id,
            PolicyId::new(STANDARD_ACCESS)
        );
        assert_eq!(
            decision.policy_ids(),
            vec![PolicyId::new(CROSS_GOV_OVERRIDE), PolicyId::new(STANDARD_ACCESS)]
        );
    }

    #[test]
    fn test_consumer_gets_standard_access() {
        let engine = AttributePolicyEngine::default();
        let identity = make_identity(Some("dcs"), Role::DepartmentAnalyst, false);
        let decision = engine.evaluate_access_at(&identity, &active_dsa(), now());
        assert!(decision.is_allowed());
        assert!(decision.reason.contains("consumer"));
    }

    #[test]
    fn test_non_party_denied_under_every_policy() {
        let engine = AttributePolicyEngine::default();
        let identity = make_identity(Some("bia"), Role::DepartmentMember, false);
        let decision = engine.evaluate_access_at(&identity, &active_dsa(), now());

        assert_eq!(decision.decision, Decision::Deny);
        assert_eq!(decision.policies_evaluated.len(), 3);
        assert!(decision.reason.contains("standard-access: Department mismatch"));
        assert!(decision.reason.contains("historical-access: Department mismatch"));
        assert!(decision.reason.contains("cross-gov-override: Identity is not cross-government"));
    }

    #[test]
    fn test_expired_agreement_gives_historical_access() {
        let engine = AttributePolicyEngine::default();
        let identity = make_identity(Some("dcs"), Role::DepartmentMember, false);
        let dsa = make_dsa(AgreementStatus::Expired, NOW - 1_000_000, Some(NOW - 10));
        let decision = engine.evaluate_access_at(&identity, &dsa, now());

        assert!(decision.is_allowed());
        assert!(decision.is_historical_access);
        let last = decision.policies_evaluated.last().unwrap();
        assert_eq!(last.policy_id, PolicyId::new(HISTORICAL_ACCESS));
        let standard = &decision.policies_evaluated[1];
        assert_eq!(standard.result, Decision::Deny);
    }

    #[test]
    fn test_historical_access_is_read_only() {
        let engine = AttributePolicyEngine::default();
        let identity = make_identity(Some("dcs"), Role::DepartmentAnalyst, false);
        let dsa = make_dsa(AgreementStatus::Expired, NOW - 1_000_000, Some(NOW - 10));

        let read = engine.evaluate_action_at(&identity, Action::Read, &dsa, now());
        assert!(read.is_allowed());
        assert!(read.is_historical_access);

        let export = engine.evaluate_action_at(&identity, Action::Export, &dsa, now());
        assert_eq!(export.decision, Decision::Deny);
        assert!(!export.is_historical_access);
        assert!(export.reason.contains("read-only"));
        assert_eq!(export.policies_evaluated.len(), 3);
    }

    #[test]
    fn test_current_access_allows_every_action() {
        let engine = AttributePolicyEngine::default();
        let identity = make_identity(Some("dcs"), Role::DepartmentAnalyst, false);
        let export = engine.evaluate_action_at(&identity, Action::Export, &active_dsa(), now());
        assert!(export.is_allowed());
        assert!(!export.is_historical_access);
    }

    #[test]
    fn test_cross_gov_override_short_circuits() {
        let engine = AttributePolicyEngine::default();
        let identity = make_identity(Some("gds"), Role::CrossGovAnalyst, true);
        for status in [
            AgreementStatus::Draft,
            AgreementStatus::UnderReview,
            AgreementStatus::Expired,
        ] {
            let dsa = make_dsa(status, NOW + 1_000_000, None);
            let decision = engine.evaluate_access_at(&identity, &dsa, now());
            assert!(decision.is_allowed());
            assert_eq!(decision.policies_evaluated.len(), 1);
            assert_eq!(
                decision.policies_evaluated[0].policy_id,
                PolicyId::new(CROSS_GOV_OVERRIDE)
            );
            assert!(!decision.is_historical_access);
        }
    }

    #[test]
    fn test_draft_agreement_denied_to_parties() {
        let engine = AttributePolicyEngine::default();
        let identity = make_identity(Some("rts"), Role::DepartmentMember, false);
        let dsa = make_dsa(AgreementStatus::Draft, NOW - 10, None);
        let decision = engine.evaluate_access_at(&identity, &dsa, now());
        assert!(!decision.is_allowed());
        assert!(decision.reason.contains("Status is draft"));
    }

    #[test]
    fn test_not_yet_effective_denied_by_standard() {
        let engine = AttributePolicyEngine::default();
        let identity = make_identity(Some("rts"), Role::DepartmentMember, false);
        let dsa = make_dsa(AgreementStatus::UnderReview, NOW + 100, None);
        let decision = engine.evaluate_access_at(&identity, &dsa, now());
        assert!(!decision.is_allowed());
        assert!(decision.reason.contains("not effective until"));
    }

    #[test]
    fn test_evaluate_policy_collects_all_failures() {
        let engine = AttributePolicyEngine::default();
        let identity = make_identity(Some("bia"), Role::DepartmentMember, false);
        let dsa = make_dsa(AgreementStatus::Draft, NOW + 100, None);
        let standard = engine
            .policy_set()
            .get(&PolicyId::new(STANDARD_ACCESS))
            .unwrap()
            .clone();
        let result = engine.evaluate_policy(&standard, &identity, &dsa, now());
        assert_eq!(result.result, Decision::Deny);
        assert!(result.reason.contains("mismatch"));
        assert!(result.reason.contains("draft"));
        assert!(result.reason.contains("not effective"));
    }

    #[test]
    fn test_optional_condition_does_not_decide() {
        let set = PolicySet::new(
            1,
            vec![Policy {
                id: PolicyId::new("party-with-date-hint"),
                name: "Party".into(),
                priority: 1,
                conditions: vec![
                    PolicyCondition::required(Condition::DepartmentParty),
                    PolicyCondition::optional(Condition::DateValid),
                ],
                historical: false,
            }],
        )
        .unwrap();
        let engine = AttributePolicyEngine::new(set);
        let identity = make_identity(Some("rts"), Role::DepartmentMember, false);
        let dsa = make_dsa(AgreementStatus::Active, NOW + 100, None);
        assert!(engine.evaluate_access_at(&identity, &dsa, now()).is_allowed());
    }

    #[test]
    fn test_can_potentially_access() {
        let engine = AttributePolicyEngine::default();
        assert!(engine.can_potentially_access(&make_identity(None, Role::PublicViewer, true)));
        assert!(engine.can_potentially_access(&make_identity(
            Some("rts"),
            Role::DepartmentMember,
            false
        )));
        assert!(engine.can_potentially_access(&make_identity(
            Some("rts"),
            Role::DepartmentAnalyst,
            false
        )));
        assert!(!engine.can_potentially_access(&make_identity(
            None,
            Role::DepartmentMember,
            false
        )));
        assert!(!engine.can_potentially_access(&make_identity(
            Some("rts"),
            Role::PublicViewer,
            false
        )));
        assert!(!engine.can_potentially_access(&make_identity(
            Some("rts"),
            Role::PlatformAdmin,
            false
        )));
    }

    #[test]
    fn test_standard_access_property_over_windows() {
        let engine = AttributePolicyEngine::default();
        for dept in ["rts", "dcs"] {
            let identity = make_identity(Some(dept), Role::DepartmentMember, false);
            for (effective, expiry) in [
                (NOW, None),
                (NOW - 500, Some(NOW + 1)),
                (0, Some(NOW + 1_000_000)),
            ] {
                let dsa = make_dsa(AgreementStatus::Active, effective, expiry);
                let decision = engine.evaluate_access_at(&identity, &dsa, now());
                assert!(decision.is_allowed());
                assert!(!decision.is_historical_access);
                assert_eq!(
                    decision.policies_evaluated.last().unwrap().policy_id,
                    PolicyId::new(STANDARD_ACCESS)
                );
            }
        }
    }
}
