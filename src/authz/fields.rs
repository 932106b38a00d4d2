use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::department::{AccessObjectBinding, AccessObjectKind, AccessTarget, DepartmentScopeResolver};
use super::evaluator::{CurrentUserProvider, Decision, DefaultPolicyEvaluator};
use super::identity::IdentityState;
use super::policy::{PolicyRegistry, PolicyRequirement};
use crate::errors::{AppError, AppResult};

/// Authorization declared for one GraphQL field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPolicy {
    pub field: &'static str,
    pub policy: &'static str,
    pub access: Option<AccessObjectBinding>,
}

const fn guarded(field: &'static str, policy: &'static str) -> FieldPolicy {
    FieldPolicy {
        field,
        policy,
        access: None,
    }
}

const fn scoped(field: &'static str, policy: &'static str, access: AccessObjectBinding) -> FieldPolicy {
    FieldPolicy {
        field,
        policy,
        access: Some(access),
    }
}

const USER_ID: AccessObjectBinding = AccessObjectBinding::argument("id", AccessTarget::Object(AccessObjectKind::User));
const DEPARTMENT_ARG: AccessObjectBinding = AccessObjectBinding::argument("departmentId", AccessTarget::DepartmentId);
const DEPARTMENT_ID: AccessObjectBinding = AccessObjectBinding::argument("id", AccessTarget::DepartmentId);
const PLAN_ID: AccessObjectBinding =
    AccessObjectBinding::argument("id", AccessTarget::Object(AccessObjectKind::DeploymentPlan));

/// Guarded query and mutation fields of the API.
pub const FIELD_POLICIES: &[FieldPolicy] = &[
    // users
    scoped("users", "CanViewDepartmentUsers", AccessObjectBinding::Ignored),
    scoped("user", "CanViewDepartmentUsers", USER_ID),
    scoped("createUser", "CanEditDepartmentUsers", DEPARTMENT_ARG),
    scoped("updateUser", "CanEditDepartmentUsers", USER_ID),
    scoped("removeUser", "CanEditDepartmentUsers", USER_ID),
    // departments
    scoped("departments", "CanViewOwnDepartment", AccessObjectBinding::Ignored),
    scoped("department", "CanViewOwnDepartment", DEPARTMENT_ID),
    guarded("createDepartment", "CanEditDepartments"),
    scoped("updateDepartment", "CanEditOwnDepartment", DEPARTMENT_ID),
    guarded("removeDepartment", "CanEditDepartments"),
    // deployment plans
    scoped("deploymentPlans", "CanViewDepartmentDeploymentPlans", AccessObjectBinding::Ignored),
    scoped("deploymentPlan", "CanViewDepartmentDeploymentPlans", PLAN_ID),
    scoped("createDeploymentPlan", "CanEditDepartmentDeploymentPlans", DEPARTMENT_ARG),
    scoped("updateDeploymentPlan", "CanEditDepartmentDeploymentPlans", PLAN_ID),
    scoped("removeDeploymentPlan", "CanEditDepartmentDeploymentPlans", PLAN_ID),
    scoped("publishDeploymentPlan", "CanEditDepartmentDeploymentPlans", PLAN_ID),
    scoped("hideDeploymentPlan", "CanEditDepartmentDeploymentPlans", PLAN_ID),
    // news
    guarded("externalNews", "CanViewExternalNews"),
    guarded("createExternalNews", "CanEditExternalNews"),
    guarded("updateExternalNews", "CanEditExternalNews"),
    guarded("removeExternalNews", "CanEditExternalNews"),
    guarded("publishExternalNews", "CanEditExternalNews"),
    guarded("internalNews", "CanViewInternalNews"),
    guarded("createInternalNews", "CanEditInternalNews"),
    guarded("updateInternalNews", "CanEditInternalNews"),
    guarded("removeInternalNews", "CanEditInternalNews"),
    guarded("publishInternalNews", "CanEditInternalNews"),
    // educational content
    guarded("educationalContent", "CanViewEducationalContent"),
    guarded("createEducationalContent", "CanEditEducationalContent"),
    guarded("updateEducationalContent", "CanEditEducationalContent"),
    guarded("removeEducationalContent", "CanEditEducationalContent"),
    // appointments
    guarded("appointments", "CanViewAppointments"),
    guarded("createAppointment", "CanEditAppointments"),
    guarded("updateAppointment", "CanEditAppointments"),
    guarded("removeAppointment", "CanEditAppointments"),
];

#[derive(Debug, Clone)]
struct GuardedField {
    requirement: Arc<PolicyRequirement>,
    access: Option<AccessObjectBinding>,
}

/// Field table with every policy resolved against the registry.
#[derive(Debug, Clone, Default)]
pub struct FieldPolicyTable {
    fields: HashMap<&'static str, GuardedField>,
}

impl FieldPolicyTable {
    pub fn builtin(registry: &mut PolicyRegistry) -> AppResult<Self> {
        Self::from_entries(FIELD_POLICIES, registry)
    }

    /// Fails on the first entry naming an unknown policy or a malformed
    /// access object binding.
    pub fn from_entries(entries: &[FieldPolicy], registry: &mut PolicyRegistry) -> AppResult<Self> {
        let mut fields = HashMap::with_capacity(entries.len());
        for entry in entries {
            let requirement = registry.register(entry.policy)?;
            let access = entry
                .access
                .map(AccessObjectBinding::validated)
                .transpose()
                .map_err(|err| AppError::configuration(format!("field {}: {}", entry.field, err)))?;
            fields.insert(entry.field, GuardedField { requirement, access });
        }
        Ok(Self { fields })
    }

    pub fn requirement(&self, field: &str) -> Option<Arc<PolicyRequirement>> {
        self.fields.get(field).map(|f| Arc::clone(&f.requirement))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Field-authorization hook: combines the capability check with department
/// scoping for each guarded field.
#[derive(Clone)]
pub struct FieldGuard {
    table: Arc<FieldPolicyTable>,
    evaluator: DefaultPolicyEvaluator,
    departments: DepartmentScopeResolver,
}

impl FieldGuard {
    pub fn new(
        table: Arc<FieldPolicyTable>,
        users: Arc<dyn CurrentUserProvider>,
        departments: DepartmentScopeResolver,
    ) -> Self {
        Self {
            table,
            evaluator: DefaultPolicyEvaluator::new(users),
            departments,
        }
    }

    pub fn guarded_fields(&self) -> usize {
        self.table.len()
    }

    pub async fn authorize(&self, field: &str, arguments: &Map<String, Value>, identity: &IdentityState) -> Decision {
        let Some(guarded) = self.table.fields.get(field) else {
            return Decision::Succeed;
        };

        let Some(snapshot) = identity.snapshot() else {
            tracing::debug!(field, "anonymous access to guarded field denied");
            return Decision::Fail;
        };

        let Some(capabilities) = self.evaluator.capability_set(identity).await else {
            tracing::debug!(field, user_id = snapshot.user_id, "no capability set, denying");
            return Decision::Fail;
        };

        let requirement = &guarded.requirement;
        let escalation = requirement.capability.escalation();
        let escalated = escalation.is_some_and(|c| capabilities.get(c));

        // The escalation capability stands in for the scoped flag, but the
        // target still has to resolve.
        if !escalated && !DefaultPolicyEvaluator::evaluate_set(&capabilities, requirement).is_allowed() {
            tracing::debug!(
                field,
                user_id = snapshot.user_id,
                policy = %requirement.name,
                "missing capability"
            );
            return Decision::Fail;
        }

        if escalation.is_none() {
            return Decision::Succeed;
        }

        let allowed = self
            .departments
            .resolve(guarded.access.as_ref(), snapshot, &capabilities, escalation, arguments)
            .await;
        if !allowed {
            tracing::debug!(field, user_id = snapshot.user_id, "department scope denied");
        }
        Decision::from_bool(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::capability::Capability;
    use crate::authz::identity::IdentitySnapshot;
    use crate::authz::memory::InMemoryDirectory;
    use crate::models::access_control_list::CapabilitySet;
    use chrono::Utc;
    use serde_json::json;

    fn identity(user_id: i64, department_id: Option<i64>) -> IdentityState {
        IdentityState::Authenticated(IdentitySnapshot {
            user_id,
            username: format!("user{user_id}"),
            department_id,
            issued_at: Utc::now(),
        })
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn guard() -> FieldGuard {
        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_user(1, "scoped", Some(10))
                .with_user(2, "global", Some(10))
                .with_user(3, "colleague", Some(10))
                .with_user(4, "stranger", Some(20))
                .with_user(5, "nobody", Some(10))
                .with_capabilities(
                    CapabilitySet::new(1)
                        .with(Capability::CanViewDepartmentUsers)
                        .with(Capability::CanEditDepartmentUsers),
                )
                .with_capabilities(CapabilitySet::new(2).with(Capability::CanViewUsers))
                .with_capabilities(CapabilitySet::new(5)),
        );
        let mut registry = PolicyRegistry::with_all_capabilities();
        let table = FieldPolicyTable::builtin(&mut registry).unwrap();
        FieldGuard::new(Arc::new(table), directory.clone(), DepartmentScopeResolver::new(directory))
    }

    #[test]
    fn builtin_table_resolves_every_policy() {
        let mut registry = PolicyRegistry::new();
        let table = FieldPolicyTable::builtin(&mut registry).unwrap();
        assert_eq!(table.len(), FIELD_POLICIES.len());
        assert_eq!(table.requirement("user").unwrap().capability, Capability::CanViewDepartmentUsers);
    }

    #[test]
    fn unknown_policy_in_table_is_a_configuration_error() {
        let entries = [guarded("launch", "CanLaunchRockets")];
        let err = FieldPolicyTable::from_entries(&entries, &mut PolicyRegistry::new()).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn malformed_binding_in_table_is_a_configuration_error() {
        let entries = [
            guarded("externalNews", "CanViewExternalNews"),
            scoped("user", "CanViewDepartmentUsers", AccessObjectBinding::argument("", AccessTarget::DepartmentId)),
        ];
        let err = FieldPolicyTable::from_entries(&entries, &mut PolicyRegistry::new()).unwrap_err();
        assert!(matches!(err, AppError::Configuration(ref msg) if msg.contains("field user")));
    }

    #[tokio::test]
    async fn unguarded_fields_pass_and_anonymous_is_denied() {
        let g = guard();
        assert_eq!(g.authorize("version", &Map::new(), &IdentityState::Anonymous).await, Decision::Succeed);
        assert_eq!(g.authorize("externalNews", &Map::new(), &IdentityState::Anonymous).await, Decision::Fail);
    }

    #[tokio::test]
    async fn default_capabilities_only_open_external_news() {
        let g = guard();
        let nobody = identity(5, Some(10));
        assert_eq!(g.authorize("externalNews", &Map::new(), &nobody).await, Decision::Succeed);
        assert_eq!(g.authorize("internalNews", &Map::new(), &nobody).await, Decision::Fail);
        assert_eq!(g.authorize("user", &args(json!({"id": 3})), &nobody).await, Decision::Fail);
    }

    #[tokio::test]
    async fn department_scoped_user_access() {
        let g = guard();
        let scoped = identity(1, Some(10));

        assert_eq!(g.authorize("user", &args(json!({"id": 3})), &scoped).await, Decision::Succeed);
        assert_eq!(g.authorize("user", &args(json!({"id": 4})), &scoped).await, Decision::Fail);
        assert_eq!(g.authorize("users", &Map::new(), &scoped).await, Decision::Succeed);
        assert_eq!(
            g.authorize("createUser", &args(json!({"departmentId": 20, "password": "x"})), &scoped).await,
            Decision::Fail
        );
    }

    #[tokio::test]
    async fn escalation_reaches_other_departments() {
        let g = guard();
        let global = identity(2, Some(10));

        assert_eq!(g.authorize("user", &args(json!({"id": 4})), &global).await, Decision::Succeed);
        assert_eq!(g.authorize("updateUser", &args(json!({"id": 4})), &global).await, Decision::Fail);
    }

    #[tokio::test]
    async fn escalation_does_not_admit_unresolvable_targets() {
        let g = guard();
        let global = identity(2, Some(10));

        assert_eq!(g.authorize("user", &args(json!({"id": 9999})), &global).await, Decision::Fail);
        assert_eq!(g.authorize("user", &Map::new(), &global).await, Decision::Fail);
        assert_eq!(g.authorize("user", &args(json!({"id": null})), &global).await, Decision::Fail);
        assert_eq!(g.authorize("users", &Map::new(), &global).await, Decision::Succeed);
    }

    #[tokio::test]
    async fn users_without_a_capability_set_are_denied() {
        let g = guard();
        assert_eq!(g.authorize("externalNews", &Map::new(), &identity(3, Some(10))).await, Decision::Fail);
    }
}
