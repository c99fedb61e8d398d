//! Gatehouse Policy
//!
//! Two-stage access control for governed resources:
//!
//! - a coarse role x action x resource-type gate that fails closed
//! - ordered attribute policies (first ALLOW wins, full evaluation trace)
//!
//! plus the list filter that runs both across a collection and the
//! sub-field redaction applied to visible agreements.

pub mod condition;
pub mod engine;
pub mod error;
pub mod filter;
pub mod redaction;
pub mod role_gate;
pub mod role_map;
pub mod types;

pub use condition::{evaluate_condition, Condition, ConditionOutcome};
pub use engine::AttributePolicyEngine;
pub use error::{PolicyError, PolicyErrorKind, PolicyResult};
pub use filter::{FilterResult, FilterSummary, FilteredItem, ListFilter};
pub use redaction::{can_view_sensitive_fields, redact_agreement, AgreementView};
pub use role_gate::{PermissionCheck, RoleDefinition, RoleGate};
pub use role_map::{
    map_external_role, map_role, CrossGovDepartments, ExternalRole, IdentityFactory,
    SessionAttributes,
};
pub use types::{
    AccessDecision, Policy, PolicyCondition, PolicyEvaluationResult, PolicySet,
    CROSS_GOV_OVERRIDE, HISTORICAL_ACCESS, STANDARD_ACCESS,
};
