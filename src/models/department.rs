use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::authz::DepartmentScoped;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A department is scoped to itself.
impl DepartmentScoped for Department {
    fn department_id(&self) -> Option<i64> {
        Some(self.id)
    }
}
