use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::authz::DepartmentScoped;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DeploymentPlan {
    pub id: i64,
    pub description: Option<String>,
    pub department_id: Option<i64>,
    pub published: bool,
    pub available_from: DateTime<Utc>,
    pub available_until: DateTime<Utc>,
}

impl DepartmentScoped for DeploymentPlan {
    fn department_id(&self) -> Option<i64> {
        self.department_id
    }
}
