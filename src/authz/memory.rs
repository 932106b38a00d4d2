use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::department::{AccessObjectKind, AccessObjectStore, BoxedAccessObject};
use super::evaluator::CurrentUserProvider;
use crate::errors::{AppError, AppResult};
use crate::models::access_control_list::CapabilitySet;
use crate::models::department::Department;
use crate::models::deployment_plan::DeploymentPlan;
use crate::models::user::User;

/// Fixed in-memory directory of users, capability sets and scoped objects.
///
/// Built once and read concurrently; useful for embedding the core without a
/// database and for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    users: HashMap<i64, User>,
    capabilities: HashMap<i64, CapabilitySet>,
    departments: HashMap<i64, Department>,
    deployment_plans: HashMap<i64, DeploymentPlan>,
    unavailable: bool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: i64, username: &str, department_id: Option<i64>) -> Self {
        self.users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                department_id,
                last_invalidated: DateTime::<Utc>::default(),
                created_at: Utc::now(),
            },
        );
        self
    }

    pub fn with_last_invalidated(mut self, user_id: i64, at: DateTime<Utc>) -> Self {
        if let Some(user) = self.users.get_mut(&user_id) {
            user.last_invalidated = at;
        }
        self
    }

    pub fn with_capabilities(mut self, set: CapabilitySet) -> Self {
        self.capabilities.insert(set.user_id, set);
        self
    }

    pub fn with_department(mut self, id: i64, name: &str) -> Self {
        self.departments.insert(
            id,
            Department {
                id,
                name: name.to_string(),
                created_at: Utc::now(),
            },
        );
        self
    }

    pub fn with_deployment_plan(mut self, id: i64, department_id: Option<i64>) -> Self {
        let now = Utc::now();
        self.deployment_plans.insert(
            id,
            DeploymentPlan {
                id,
                description: None,
                department_id,
                published: false,
                available_from: now,
                available_until: now,
            },
        );
        self
    }

    /// Every lookup fails, as if the backing store were down.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable {
            return Err(AppError::internal("directory unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl CurrentUserProvider for InMemoryDirectory {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>> {
        self.check_available()?;
        Ok(self.users.get(&user_id).cloned())
    }

    async fn capabilities(&self, user_id: i64) -> AppResult<Option<CapabilitySet>> {
        self.check_available()?;
        Ok(self.capabilities.get(&user_id).cloned())
    }
}

#[async_trait]
impl AccessObjectStore for InMemoryDirectory {
    async fn find(&self, kind: AccessObjectKind, id: i64) -> AppResult<Option<BoxedAccessObject>> {
        self.check_available()?;

        let found = match kind {
            AccessObjectKind::User => self.users.get(&id).cloned().map(|u| Box::new(u) as BoxedAccessObject),
            AccessObjectKind::Department => self.departments.get(&id).cloned().map(|d| Box::new(d) as BoxedAccessObject),
            AccessObjectKind::DeploymentPlan => self.deployment_plans.get(&id).cloned().map(|p| Box::new(p) as BoxedAccessObject),
        };
        Ok(found)
    }
}
