use std::collections::{BTreeMap, BTreeSet};

use gatehouse_core::{Action, DepartmentId, DepartmentScope, Identity, ResourceType, Role};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PolicyError, PolicyResult};

/// One row of the permission matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub allowed_actions: BTreeSet<Action>,
    pub allowed_resource_types: BTreeSet<ResourceType>,
    pub department_scope: DepartmentScope,
}

impl RoleDefinition {
    fn new(
        actions: &[Action],
        resource_types: &[ResourceType],
        department_scope: DepartmentScope,
    ) -> Self {
        Self {
            allowed_actions: actions.iter().copied().collect(),
            allowed_resource_types: resource_types.iter().copied().collect(),
            department_scope,
        }
    }
}

/// Outcome of a coarse permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheck {
    pub allowed: bool,
    pub reason: String,
}

impl PermissionCheck {
    fn allow(reason: String) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: String) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Coarse role x action x resource-type gate. Runs before any attribute
/// policy and fails closed: anything absent from the matrix is denied.
#[derive(Debug, Clone)]
pub struct RoleGate {
    matrix: BTreeMap<Role, RoleDefinition>,
}

impl Default for RoleGate {
    fn default() -> Self {
        Self {
            matrix: default_matrix(),
        }
    }
}

fn default_matrix() -> BTreeMap<Role, RoleDefinition> {
    use Action::*;
    use ResourceType::*;

    let mut matrix = BTreeMap::new();
    matrix.insert(
        Role::PublicViewer,
        RoleDefinition::new(
            &[Read],
            &[Service, Team, Department, Profile],
            DepartmentScope::None,
        ),
    );
    matrix.insert(
        Role::DepartmentMember,
        RoleDefinition::new(
            &[Read],
            &[Service, Team, Department, Agreement, Profile],
            DepartmentScope::Own,
        ),
    );
    matrix.insert(
        Role::DepartmentAnalyst,
        RoleDefinition::new(
            &[Read, Export],
            &[Service, Team, Department, Agreement, Profile],
            DepartmentScope::Party,
        ),
    );
    matrix.insert(
        Role::CrossGovAnalyst,
        RoleDefinition::new(
            &[Read, Export],
            &[Service, Team, Department, Agreement, Profile, AuditLog],
            DepartmentScope::All,
        ),
    );
    matrix.insert(
        Role::PlatformAdmin,
        RoleDefinition::new(
            &[Read, Create, Update, Delete, Manage],
            &[Service, Team, Department, User, AuditLog],
            DepartmentScope::Admin,
        ),
    );
    matrix
}

impl RoleGate {
    /// Build a gate over a custom matrix. Roles left out of the matrix are
    /// treated as unknown and denied everything.
    pub fn with_matrix(matrix: BTreeMap<Role, RoleDefinition>) -> PolicyResult<Self> {
        for (role, def) in &matrix {
            if def.allowed_actions.is_empty() != def.allowed_resource_types.is_empty() {
                return Err(PolicyError::InvalidRoleMatrix(format!(
                    "role '{}' must list both actions and resource types, or neither",
                    role
                )));
            }
        }
        Ok(Self { matrix })
    }

    pub fn role_definition(&self, role: Role) -> Option<&RoleDefinition> {
        self.matrix.get(&role)
    }

    /// Typed permission check over the matrix.
    pub fn check_permission(
        &self,
        role: Role,
        action: Action,
        resource_type: ResourceType,
    ) -> PermissionCheck {
        let def = match self.matrix.get(&role) {
            Some(d) => d,
            None => {
                debug!(role = %role, "role gate: role not in matrix");
                return PermissionCheck::deny(format!("Unknown role: {}", role));
            }
        };

        if !def.allowed_actions.contains(&action) {
            debug!(role = %role, action = %action, "role gate: action not permitted");
            return PermissionCheck::deny(format!(
                "Role {} is not permitted to {}",
                role, action
            ));
        }

        if !def.allowed_resource_types.contains(&resource_type) {
            debug!(role = %role, resource_type = %resource_type, "role gate: resource type not permitted");
            return PermissionCheck::deny(format!(
                "Role {} cannot access resources of type {}",
                role, resource_type
            ));
        }

        PermissionCheck::allow(format!(
            "Role {} may {} {} resources (scope: {})",
            role, action, resource_type, def.department_scope
        ))
    }

    /// Permission check over raw strings from an outer layer. Any token that
    /// does not parse into the closed vocabulary is a DENY.
    pub fn check_permission_raw(
        &self,
        role: &str,
        action: &str,
        resource_type: &str,
    ) -> PermissionCheck {
        let role: Role = match role.parse() {
            Ok(r) => r,
            Err(_) => return PermissionCheck::deny(format!("Unknown role: {}", role)),
        };
        let action: Action = match action.parse() {
            Ok(a) => a,
            Err(_) => return PermissionCheck::deny(format!("Unknown action: {}", action)),
        };
        let resource_type: ResourceType = match resource_type.parse() {
            Ok(t) => t,
            Err(_) => {
                return PermissionCheck::deny(format!("Unknown resource type: {}", resource_type))
            }
        };
        self.check_permission(role, action, resource_type)
    }

    /// Department scope of a role; unknown roles get no scope.
    pub fn department_scope(&self, role: Role) -> DepartmentScope {
        self.matrix
            .get(&role)
            .map(|d| d.department_scope)
            .unwrap_or(DepartmentScope::None)
    }

    /// Quick departmental filter. `Party` scope only checks equality here;
    /// the attribute policies still decide on individual agreements.
    pub fn can_access_department(&self, identity: &Identity, target: &DepartmentId) -> bool {
        match self.department_scope(identity.role) {
            DepartmentScope::All => true,
            DepartmentScope::Own | DepartmentScope::Party => identity.department() == Some(target),
            DepartmentScope::Admin => false,
            DepartmentScope::None => false,
        }
    }

    /// Every (role, action, resource type) triple the matrix allows.
    pub fn permitted_combinations(&self) -> Vec<(Role, Action, ResourceType)> {
        let mut out = Vec::new();
        for (role, def) in &self.matrix {
            for action in &def.allowed_actions {
                for rt in &def.allowed_resource_types {
                    out.push((*role, *action, *rt));
                }
            }
        }
        out
    }
}
