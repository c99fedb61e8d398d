use std::collections::BTreeMap;

use gatehouse_core::{
    Action, AuditContext, Decision, DepartmentId, PolicyId, RequestId, ResourceType, Role,
    Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AuditEntry: flat, append-only decision record
// ---------------------------------------------------------------------------

/// One logged access decision. Flat so it maps directly onto a table row
/// or a log-shipping record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: Timestamp,
    pub user_id: UserId,
    pub user_name: String,
    pub role: Role,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    pub action: Action,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub decision: Decision,
    pub reason: String,
    #[serde(default)]
    pub policies_evaluated: Vec<PolicyId>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub request_id: Option<RequestId>,
    pub integrity_hash: String,
}

impl AuditEntry {
    pub fn context(&self) -> AuditContext {
        AuditContext {
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            request_id: self.request_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// DecisionEvent: what a caller hands to the recorder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionEvent {
    pub action: Action,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub decision: Decision,
    pub reason: String,
    pub policies_evaluated: Vec<PolicyId>,
    pub context: AuditContext,
}

impl DecisionEvent {
    pub fn new(
        action: Action,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        decision: Decision,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            action,
            resource_type,
            resource_id: resource_id.into(),
            decision,
            reason: reason.into(),
            policies_evaluated: Vec::new(),
            context: AuditContext::default(),
        }
    }

    pub fn with_policies(mut self, policies: Vec<PolicyId>) -> Self {
        self.policies_evaluated = policies;
        self
    }

    pub fn with_context(mut self, context: AuditContext) -> Self {
        self.context = context;
        self
    }
}

// ---------------------------------------------------------------------------
// Query and statistics
// ---------------------------------------------------------------------------

pub const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub limit: usize,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub resource_type: Option<ResourceType>,
    #[serde(default)]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub since: Option<Timestamp>,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_QUERY_LIMIT,
            user_id: None,
            resource_type: None,
            decision: None,
            since: None,
        }
    }
}

impl AuditQuery {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(ref user) = self.user_id {
            if entry.user_id != *user {
                return false;
            }
        }
        if let Some(rt) = self.resource_type {
            if entry.resource_type != rt {
                return false;
            }
        }
        if let Some(decision) = self.decision {
            if entry.decision != decision {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// Aggregates over a time window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStatistics {
    pub total: usize,
    pub allowed: usize,
    pub denied: usize,
    pub by_resource_type: BTreeMap<ResourceType, usize>,
    pub by_role: BTreeMap<Role, usize>,
    pub unique_users: usize,
}
