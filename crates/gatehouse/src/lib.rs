//! Gatehouse
//!
//! Access-control and audit engine for a cross-government catalogue.
//! Decides whether an identity may see a governed resource (data-sharing
//! agreements) or which fields of a personal profile it may see, and logs
//! every decision to a tamper-evident audit trail.
//!
//! # Pipeline
//!
//! Every request runs the same fixed sequence, with no retries:
//!
//! 1. role gate on (role, action, resource type); a refusal is a DENY
//! 2. potential-access pre-check (governed resources only)
//! 3. attribute policies per item, or graduated disclosure for profiles
//! 4. one audit entry per single decision, one batch entry per collection
//!
//! Given fixed inputs and a fixed `now`, the outcome is deterministic.

pub mod audit_log;
pub mod config;
pub mod error;

pub use config::{AuditConfig, DisclosureConfig, GatehouseConfig, RolesConfig};
pub use error::{RootError, RootResult};

use std::sync::Arc;

use gatehouse_audit::{
    AuditEntry, AuditRecorder, AuditStore, DecisionEvent, InMemoryAuditStore, TracingAuditStore,
};
use gatehouse_core::{
    Action, AuditContext, DataSharingAgreement, Decision, Identity, ResourceType, Timestamp,
};
use gatehouse_disclosure::{
    filter_profile_by_access, AccessEvaluation, AccessLevel, DisclosureEvaluator, OwnerAttributes,
    RequesterIdentity,
};
use gatehouse_policy::{
    redact_agreement, AccessDecision, AgreementView, AttributePolicyEngine, FilterResult,
    IdentityFactory, ListFilter, PolicySet, RoleGate, SessionAttributes,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Outcome of a single agreement request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementOutcome {
    pub decision: AccessDecision,
    /// Present only when access was allowed.
    pub view: Option<AgreementView>,
    pub audit: AuditEntry,
}

/// Outcome of a profile request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOutcome {
    pub evaluation: AccessEvaluation,
    pub profile: Map<String, Value>,
    pub audit: AuditEntry,
}

/// Outcome of a collection request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementListing {
    pub result: FilterResult<AgreementView>,
    pub audit: AuditEntry,
}

/// The request pipeline: role gate, attribute policies or disclosure, audit.
#[derive(Debug)]
pub struct Gatekeeper {
    list_filter: ListFilter,
    disclosure: DisclosureEvaluator,
    identities: IdentityFactory,
    audit: AuditRecorder,
}

impl Gatekeeper {
    /// Build the pipeline from configuration with an in-memory audit store
    /// whose appends are also emitted on the `gatehouse::audit` target.
    pub fn from_config(config: &GatehouseConfig) -> Self {
        let store: Arc<dyn AuditStore> =
            Arc::new(TracingAuditStore::new(InMemoryAuditStore::new()));
        Self::with_store(config, store)
    }

    pub fn with_store(config: &GatehouseConfig, store: Arc<dyn AuditStore>) -> Self {
        let disclosure = DisclosureEvaluator::new(config.disclosure.government_domains.clone())
            .with_resolve_timeout(config.resolve_timeout());
        Self {
            list_filter: ListFilter::new(
                RoleGate::default(),
                AttributePolicyEngine::new(PolicySet::standard()),
            ),
            disclosure,
            identities: IdentityFactory::new(config.roles.cross_gov_departments.clone()),
            audit: AuditRecorder::new(store).with_test_mode(config.audit.test_mode),
        }
    }

    /// Replace the disclosure evaluator, e.g. to attach a registry or a
    /// document resolver.
    pub fn with_disclosure(mut self, disclosure: DisclosureEvaluator) -> Self {
        self.disclosure = disclosure;
        self
    }

    pub fn role_gate(&self) -> &RoleGate {
        self.list_filter.role_gate()
    }

    pub fn engine(&self) -> &AttributePolicyEngine {
        self.list_filter.engine()
    }

    pub fn disclosure(&self) -> &DisclosureEvaluator {
        &self.disclosure
    }

    pub fn identities(&self) -> &IdentityFactory {
        &self.identities
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    pub fn identity_from_session(&self, attrs: SessionAttributes) -> Identity {
        self.identities.from_session(attrs)
    }

    // -----------------------------------------------------------------------
    // Governed resources
    // -----------------------------------------------------------------------

    pub fn authorize_agreement(
        &self,
        identity: &Identity,
        action: Action,
        agreement: &DataSharingAgreement,
        context: AuditContext,
    ) -> RootResult<AgreementOutcome> {
        self.authorize_agreement_at(identity, action, agreement, context, Timestamp::now())
    }

    pub fn authorize_agreement_at(
        &self,
        identity: &Identity,
        action: Action,
        agreement: &DataSharingAgreement,
        context: AuditContext,
        now: Timestamp,
    ) -> RootResult<AgreementOutcome> {
        let decision = self.decide_agreement(identity, action, agreement, now);

        let event = DecisionEvent::new(
            action,
            ResourceType::Agreement,
            agreement.id.as_str(),
            decision.decision,
            decision.reason.clone(),
        )
        .with_policies(decision.policy_ids())
        .with_context(context);
        let audit = self.audit.log_decision_at(identity, event, now)?;

        let view = decision
            .is_allowed()
            .then(|| redact_agreement(identity, agreement));

        info!(
            user = %identity.user_id,
            resource = %agreement.id,
            decision = %decision.decision,
            historical = decision.is_historical_access,
            "agreement request decided"
        );
        Ok(AgreementOutcome {
            decision,
            view,
            audit,
        })
    }

    fn decide_agreement(
        &self,
        identity: &Identity,
        action: Action,
        agreement: &DataSharingAgreement,
        now: Timestamp,
    ) -> AccessDecision {
        let check = self
            .role_gate()
            .check_permission(identity.role, action, ResourceType::Agreement);
        if !check.allowed {
            return AccessDecision::denied(check.reason);
        }
        if !self.engine().can_potentially_access(identity) {
            debug!(user = %identity.user_id, "potential-access pre-check failed");
            return AccessDecision::denied("Identity cannot access any governed resource");
        }
        self.engine()
            .evaluate_action_at(identity, action, &agreement.attributes, now)
    }

    pub fn filter_agreements(
        &self,
        identity: &Identity,
        action: Action,
        agreements: Vec<DataSharingAgreement>,
        context: AuditContext,
    ) -> RootResult<AgreementListing> {
        self.filter_agreements_at(identity, action, agreements, context, Timestamp::now())
    }

    /// Filter a collection and redact the surviving agreements. One batch
    /// audit entry covers the whole collection.
    pub fn filter_agreements_at(
        &self,
        identity: &Identity,
        action: Action,
        agreements: Vec<DataSharingAgreement>,
        context: AuditContext,
        now: Timestamp,
    ) -> RootResult<AgreementListing> {
        let filtered = self
            .list_filter
            .filter_collection_at(identity, action, agreements, now);
        let audit = self.audit.log_batch_decision_at(
            identity,
            action,
            ResourceType::Agreement,
            filtered.summary.allowed,
            filtered.summary.denied,
            context,
            now,
        )?;
        let result = filtered.map(|dsa| redact_agreement(identity, &dsa));
        info!(
            user = %identity.user_id,
            total = result.total_count,
            accessible = result.accessible_count,
            "agreement collection filtered"
        );
        Ok(AgreementListing { result, audit })
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    /// Resolve the requester, gate the read, and project the profile onto
    /// the fields their access level discloses.
    pub fn authorize_profile(
        &self,
        handle: Option<&str>,
        owner: &OwnerAttributes,
        profile_id: &str,
        profile: &Map<String, Value>,
        context: AuditContext,
    ) -> RootResult<ProfileOutcome> {
        self.authorize_profile_at(handle, owner, profile_id, profile, context, Timestamp::now())
    }

    pub fn authorize_profile_at(
        &self,
        handle: Option<&str>,
        owner: &OwnerAttributes,
        profile_id: &str,
        profile: &Map<String, Value>,
        context: AuditContext,
        now: Timestamp,
    ) -> RootResult<ProfileOutcome> {
        let requester = match handle {
            Some(h) => self.disclosure.fetch_requester_identity(h),
            None => RequesterIdentity::anonymous(),
        };
        let identity = self.identity_for_requester(&requester);

        let check = self
            .role_gate()
            .check_permission(identity.role, Action::Read, ResourceType::Profile);
        let evaluation = if check.allowed {
            self.disclosure.evaluate_requester(requester, owner)
        } else {
            AccessEvaluation {
                requester,
                access_level: AccessLevel::Public,
                visible_fields: Default::default(),
                hidden_fields: self.disclosure.get_all_fields(),
                reason: check.reason,
            }
        };

        let filtered = filter_profile_by_access(profile, &evaluation.visible_fields);
        let decision = if evaluation.visible_fields.is_empty() {
            Decision::Deny
        } else {
            Decision::Allow
        };
        let event = DecisionEvent::new(
            Action::Read,
            ResourceType::Profile,
            profile_id,
            decision,
            format!("{} ({})", evaluation.reason, evaluation.access_level),
        )
        .with_context(context);
        let audit = self.audit.log_decision_at(&identity, event, now)?;

        info!(
            requester = %identity.user_id,
            profile = profile_id,
            level = %evaluation.access_level,
            "profile request decided"
        );
        Ok(ProfileOutcome {
            evaluation,
            profile: filtered,
            audit,
        })
    }

    fn identity_for_requester(&self, requester: &RequesterIdentity) -> Identity {
        match &requester.handle {
            Some(handle) => self.identities.from_pod(
                handle,
                requester.name.as_deref(),
                requester.department_id.clone(),
                requester.is_government,
            ),
            None => Identity::anonymous(),
        }
    }
}
