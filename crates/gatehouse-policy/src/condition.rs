use gatehouse_core::{AgreementStatus, Identity, ResourceAttributes, Timestamp};
use serde::{Deserialize, Serialize};

/// Closed set of attribute conditions. Exhaustive so a new kind cannot be
/// added without a matching evaluator arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Condition {
    /// The identity's department is the provider or the consumer.
    DepartmentParty,
    /// `now` lies in `[effective_date, expiry_date)`; no expiry means open-ended.
    DateValid,
    /// Status is active, or active/expired when `allow_expired` is set.
    StatusActive {
        #[serde(default, rename = "allowExpired")]
        allow_expired: bool,
    },
    /// The identity carries cross-government oversight.
    CrossGovOverride,
}

impl Condition {
    pub fn kind(&self) -> &'static str {
        match self {
            Condition::DepartmentParty => "department-party",
            Condition::DateValid => "date-valid",
            Condition::StatusActive { .. } => "status-active",
            Condition::CrossGovOverride => "cross-gov-override",
        }
    }
}

/// Result of a single condition check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionOutcome {
    pub matched: bool,
    pub reason: String,
}

impl ConditionOutcome {
    fn matched(reason: String) -> Self {
        Self {
            matched: true,
            reason,
        }
    }

    fn unmet(reason: String) -> Self {
        Self {
            matched: false,
            reason,
        }
    }
}

/// Evaluate one condition against an identity and resource at `now`.
pub fn evaluate_condition(
    condition: &Condition,
    identity: &Identity,
    attrs: &ResourceAttributes,
    now: Timestamp,
) -> ConditionOutcome {
    match condition {
        Condition::DepartmentParty => department_party(identity, attrs),
        Condition::DateValid => date_valid(attrs, now),
        Condition::StatusActive { allow_expired } => status_active(attrs, *allow_expired),
        Condition::CrossGovOverride => cross_gov_override(identity),
    }
}

fn department_party(identity: &Identity, attrs: &ResourceAttributes) -> ConditionOutcome {
    let dept = match identity.department() {
        Some(d) => d,
        None => return ConditionOutcome::unmet("Identity has no department".to_string()),
    };
    if *dept == attrs.providing_department_id {
        ConditionOutcome::matched(format!("Department {} is the provider", dept))
    } else if *dept == attrs.consuming_department_id {
        ConditionOutcome::matched(format!("Department {} is the consumer", dept))
    } else {
        ConditionOutcome::unmet(format!(
            "Department mismatch: {} is neither provider ({}) nor consumer ({})",
            dept, attrs.providing_department_id, attrs.consuming_department_id
        ))
    }
}

fn date_valid(attrs: &ResourceAttributes, now: Timestamp) -> ConditionOutcome {
    if now < attrs.effective_date {
        return ConditionOutcome::unmet(format!(
            "Agreement is not effective until {}",
            attrs.effective_date
        ));
    }
    if let Some(expiry) = attrs.expiry_date {
        if now >= expiry {
            return ConditionOutcome::unmet(format!("Agreement expired on {}", expiry));
        }
    }
    ConditionOutcome::matched("Agreement is within its effective period".to_string())
}

fn status_active(attrs: &ResourceAttributes, allow_expired: bool) -> ConditionOutcome {
    match attrs.status {
        AgreementStatus::Active => ConditionOutcome::matched("Status is active".to_string()),
        AgreementStatus::Expired if allow_expired => {
            ConditionOutcome::matched("Status is expired (historical access)".to_string())
        }
        other => {
            let wanted = if allow_expired {
                "active or expired"
            } else {
                "active"
            };
            ConditionOutcome::unmet(format!("Status is {}, requires {}", other, wanted))
        }
    }
}

fn cross_gov_override(identity: &Identity) -> ConditionOutcome {
    if identity.is_cross_gov {
        ConditionOutcome::matched("Identity has cross-government oversight access".to_string())
    } else {
        ConditionOutcome::unmet("Identity is not cross-government".to_string())
    }
}
