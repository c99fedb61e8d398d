use std::collections::HashSet;

use gatehouse_core::{Decision, PolicyId};
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::{PolicyError, PolicyResult};

// ---------------------------------------------------------------------------
// Policy: an ordered list of conditions with a priority
// ---------------------------------------------------------------------------

/// A condition inside a policy. Only `required` conditions decide the
/// outcome; the others are evaluated for the trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCondition {
    #[serde(flatten)]
    pub condition: Condition,
    #[serde(default = "default_true")]
    pub required: bool,
}

impl PolicyCondition {
    pub fn required(condition: Condition) -> Self {
        Self {
            condition,
            required: true,
        }
    }

    pub fn optional(condition: Condition) -> Self {
        Self {
            condition,
            required: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub name: String,
    /// Lower values are evaluated first. Distinct within a set.
    pub priority: i32,
    pub conditions: Vec<PolicyCondition>,
    /// An ALLOW from this policy is read-only historical access.
    #[serde(default)]
    pub historical: bool,
}

// ---------------------------------------------------------------------------
// PolicySet: validated, once-sorted policy list
// ---------------------------------------------------------------------------

pub const CROSS_GOV_OVERRIDE: &str = "cross-gov-override";
pub const STANDARD_ACCESS: &str = "standard-access";
pub const HISTORICAL_ACCESS: &str = "historical-access";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySet {
    version: u64,
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Validate and sort by ascending priority.
    ///
    /// Rejects empty sets, empty or duplicate ids, duplicate priorities and
    /// policies without a single required condition.
    pub fn new(version: u64, mut policies: Vec<Policy>) -> PolicyResult<Self> {
        if let Err(errors) = validate_policies(&policies) {
            return Err(PolicyError::InvalidPolicySet(errors.join("; ")));
        }
        policies.sort_by_key(|p| p.priority);
        Ok(Self { version, policies })
    }

    /// The fixed policy set for data-sharing agreements.
    pub fn standard() -> Self {
        Self {
            version: 1,
            policies: vec![
                Policy {
                    id: PolicyId::new(CROSS_GOV_OVERRIDE),
                    name: "Cross-government override".to_string(),
                    priority: 1,
                    conditions: vec![PolicyCondition::required(Condition::CrossGovOverride)],
                    historical: false,
                },
                Policy {
                    id: PolicyId::new(STANDARD_ACCESS),
                    name: "Standard access".to_string(),
                    priority: 10,
                    conditions: vec![
                        PolicyCondition::required(Condition::DepartmentParty),
                        PolicyCondition::required(Condition::StatusActive {
                            allow_expired: false,
                        }),
                        PolicyCondition::required(Condition::DateValid),
                    ],
                    historical: false,
                },
                Policy {
                    id: PolicyId::new(HISTORICAL_ACCESS),
                    name: "Historical access".to_string(),
                    priority: 20,
                    conditions: vec![
                        PolicyCondition::required(Condition::DepartmentParty),
                        PolicyCondition::required(Condition::StatusActive {
                            allow_expired: true,
                        }),
                    ],
                    historical: true,
                },
            ],
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn get(&self, id: &PolicyId) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == *id)
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        Self::standard()
    }
}

fn validate_policies(policies: &[Policy]) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if policies.is_empty() {
        errors.push("policy set must contain at least one policy".to_string());
    }

    let mut seen_ids = HashSet::new();
    let mut seen_priorities = HashSet::new();
    for policy in policies {
        if policy.id.as_str().is_empty() {
            errors.push("policy ID must not be empty".to_string());
        } else if !seen_ids.insert(policy.id.as_str()) {
            errors.push(format!("duplicate policy ID: '{}'", policy.id));
        }

        if !seen_priorities.insert(policy.priority) {
            errors.push(format!(
                "policy '{}': duplicate priority {}",
                policy.id, policy.priority
            ));
        }

        if !policy.conditions.iter().any(|c| c.required) {
            errors.push(format!(
                "policy '{}' has no required condition",
                policy.id
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ---------------------------------------------------------------------------
// Evaluation outputs
// ---------------------------------------------------------------------------

/// Outcome of a single policy, kept in the trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEvaluationResult {
    pub policy_id: PolicyId,
    pub result: Decision,
    pub reason: String,
}

/// Final access decision with its evaluation trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub decision: Decision,
    pub reason: String,
    pub policies_evaluated: Vec<PolicyEvaluationResult>,
    pub is_historical_access: bool,
}

impl AccessDecision {
    /// A DENY reached before any attribute policy ran.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason: reason.into(),
            policies_evaluated: Vec::new(),
            is_historical_access: false,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision.is_allow()
    }

    /// Ids of the evaluated policies, in evaluation order.
    pub fn policy_ids(&self) -> Vec<PolicyId> {
        self.policies_evaluated
            .iter()
            .map(|r| r.policy_id.clone())
            .collect()
    }
}
