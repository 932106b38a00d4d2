use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::capability::Capability;
use super::identity::IdentitySnapshot;
use crate::errors::{AppError, AppResult};
use crate::models::access_control_list::CapabilitySet;

/// Argument name that switches department checking off for a field.
pub const IGNORED_ARGUMENT: &str = "IGNORED";

/// Objects that belong to a department.
pub trait DepartmentScoped {
    fn department_id(&self) -> Option<i64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessObjectKind {
    User,
    Department,
    DeploymentPlan,
}

pub type BoxedAccessObject = Box<dyn DepartmentScoped + Send>;

/// Loads department-scoped objects by id.
#[async_trait]
pub trait AccessObjectStore: Send + Sync {
    async fn find(&self, kind: AccessObjectKind, id: i64) -> AppResult<Option<BoxedAccessObject>>;
}

/// What the bound argument carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTarget {
    /// The argument value is the department id itself.
    DepartmentId,
    /// The argument value is the id of an object whose department is checked.
    Object(AccessObjectKind),
}

/// Declares which field argument carries department-scoping information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessObjectBinding {
    Ignored,
    Argument { name: &'static str, target: AccessTarget },
}

impl AccessObjectBinding {
    pub const fn argument(name: &'static str, target: AccessTarget) -> Self {
        AccessObjectBinding::Argument { name, target }
    }

    /// Builds a binding from its declared parts, recognising the `IGNORED`
    /// sentinel. An object binding without an object kind is malformed.
    pub fn parse(
        argument: &'static str,
        is_direct_department_id: bool,
        kind: Option<AccessObjectKind>,
    ) -> AppResult<Self> {
        if argument == IGNORED_ARGUMENT {
            return Ok(AccessObjectBinding::Ignored);
        }
        if argument.is_empty() {
            return Err(AppError::configuration("access object argument name is empty"));
        }

        let target = match (is_direct_department_id, kind) {
            (true, _) => AccessTarget::DepartmentId,
            (false, Some(kind)) => AccessTarget::Object(kind),
            (false, None) => {
                return Err(AppError::configuration(format!(
                    "access object argument {argument} needs an object kind"
                )))
            }
        };
        Ok(AccessObjectBinding::Argument { name: argument, target })
    }

    /// Re-checks a declared binding the way [`AccessObjectBinding::parse`] builds one.
    pub fn validated(self) -> AppResult<Self> {
        match self {
            AccessObjectBinding::Ignored => Ok(self),
            AccessObjectBinding::Argument { name, target } => match target {
                AccessTarget::DepartmentId => Self::parse(name, true, None),
                AccessTarget::Object(kind) => Self::parse(name, false, Some(kind)),
            },
        }
    }

    pub fn is_direct_department_id(&self) -> bool {
        matches!(
            self,
            AccessObjectBinding::Argument {
                target: AccessTarget::DepartmentId,
                ..
            }
        )
    }
}

/// Decides whether the acting user may touch the object a field targets,
/// based on department membership.
#[derive(Clone)]
pub struct DepartmentScopeResolver {
    objects: Arc<dyn AccessObjectStore>,
}

impl DepartmentScopeResolver {
    pub fn new(objects: Arc<dyn AccessObjectStore>) -> Self {
        Self { objects }
    }

    /// Never errors: anything that cannot be resolved denies.
    pub async fn resolve(
        &self,
        binding: Option<&AccessObjectBinding>,
        snapshot: &IdentitySnapshot,
        capabilities: &CapabilitySet,
        escalation: Option<Capability>,
        arguments: &Map<String, Value>,
    ) -> bool {
        let (name, target) = match binding {
            Some(AccessObjectBinding::Ignored) => return true,
            None => return false,
            Some(AccessObjectBinding::Argument { name, target }) => (*name, *target),
        };

        let Some(id) = arguments.get(name).and_then(argument_id) else {
            tracing::debug!(argument = name, "access object argument missing or not an id");
            return false;
        };

        let department_id = match target {
            AccessTarget::DepartmentId => Some(id),
            AccessTarget::Object(kind) => match self.objects.find(kind, id).await {
                Ok(Some(object)) => object.department_id(),
                Ok(None) => {
                    tracing::debug!(?kind, id, "access object not found");
                    None
                }
                Err(err) => {
                    tracing::warn!(?kind, id, error = %err, "access object lookup failed");
                    None
                }
            },
        };

        let Some(department_id) = department_id else {
            return false;
        };

        if escalation.is_some_and(|c| capabilities.get(c)) {
            return true;
        }

        snapshot.department_id == Some(department_id)
    }
}

/// GraphQL ids arrive either as integers or as strings.
fn argument_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
