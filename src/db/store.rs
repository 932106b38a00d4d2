use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use sqlx::SqlitePool;

use crate::authz::{AccessObjectKind, AccessObjectStore, BoxedAccessObject, Capability, CurrentUserProvider};
use crate::errors::{AppError, AppResult};
use crate::models::access_control_list::CapabilitySet;
use crate::models::department::Department;
use crate::models::deployment_plan::DeploymentPlan;
use crate::models::user::{DbUser, User};

const MIN_PASSWORD_LENGTH: usize = 8;

const USER_COLUMNS: &str = "id, username, password_hash, department_id, last_invalidated, created_at";

const ACL_COLUMNS: &str = "user_id, can_edit_users, can_view_users, can_edit_department_users, \
    can_view_department_users, can_edit_departments, can_view_departments, can_edit_own_department, \
    can_view_own_department, can_edit_deployment_plans, can_view_deployment_plans, \
    can_edit_department_deployment_plans, can_view_department_deployment_plans, can_edit_external_news, \
    can_view_external_news, can_edit_internal_news, can_view_internal_news, can_edit_educational_content, \
    can_view_educational_content, can_edit_appointments, can_view_appointments";

/// SQLite-backed users, capability sets and department-scoped objects.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_department(&self, name: &str) -> AppResult<Department> {
        let department = sqlx::query_as::<_, Department>(
            "INSERT INTO departments (name, created_at) VALUES (?, ?) RETURNING id, name, created_at",
        )
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(department)
    }

    /// Creates the user together with a default capability set.
    pub async fn create_user(&self, username: &str, password: &str, department_id: Option<i64>) -> AppResult<User> {
        let password_hash = hash_password(password)?;
        let mut tx = self.pool.begin().await?;

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&mut *tx)
            .await?;
        if exists > 0 {
            return Err(AppError::bad_request(format!("username {username} already in use")));
        }

        let db_user = sqlx::query_as::<_, DbUser>(&format!(
            "INSERT INTO users (username, password_hash, department_id, last_invalidated, created_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(password_hash)
        .bind(department_id)
        .bind(DateTime::<Utc>::default())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        insert_capability_set(&mut tx, &CapabilitySet::new(db_user.id)).await?;
        tx.commit().await?;

        tracing::info!(user_id = db_user.id, username = %db_user.username, "user created");
        Ok(db_user.into())
    }

    pub async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self.fetch_db_user_by_username(username).await?.map(User::from))
    }

    /// Returns the user when the password matches; `None` for unknown users
    /// and wrong passwords alike.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> AppResult<Option<User>> {
        let Some(db_user) = self.fetch_db_user_by_username(username).await? else {
            return Ok(None);
        };

        if verify_password(password, &db_user.password_hash)? {
            Ok(Some(db_user.into()))
        } else {
            Ok(None)
        }
    }

    pub async fn set_capability(&self, user_id: i64, capability: Capability, value: bool) -> AppResult<CapabilitySet> {
        let mut set = self
            .load_capability_set(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("no capability set for user {user_id}")))?;

        set.set(capability, value);
        self.save_capability_set(&set).await?;

        tracing::info!(user_id, capability = %capability, value, "capability updated");
        Ok(set)
    }

    pub async fn save_capability_set(&self, set: &CapabilitySet) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM access_control_lists WHERE user_id = ?")
            .bind(set.user_id)
            .execute(&mut *tx)
            .await?;
        insert_capability_set(&mut tx, set).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Rejects every token issued at or before `at`.
    pub async fn invalidate_tokens(&self, user_id: i64, at: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET last_invalidated = ? WHERE id = ?")
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        tracing::info!(user_id, at = %at, "tokens invalidated");
        Ok(())
    }

    /// Changing the password also invalidates every token issued so far.
    pub async fn change_password(&self, user_id: i64, new_password: &str) -> AppResult<()> {
        let password_hash = hash_password(new_password)?;

        let result = sqlx::query("UPDATE users SET password_hash = ?, last_invalidated = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        tracing::info!(user_id, "password changed, tokens invalidated");
        Ok(())
    }

    pub async fn create_deployment_plan(
        &self,
        department_id: Option<i64>,
        description: Option<&str>,
        available_from: DateTime<Utc>,
        available_until: DateTime<Utc>,
    ) -> AppResult<DeploymentPlan> {
        let plan = sqlx::query_as::<_, DeploymentPlan>(
            "INSERT INTO deployment_plans (description, department_id, published, available_from, available_until) \
             VALUES (?, ?, 0, ?, ?) \
             RETURNING id, description, department_id, published, available_from, available_until",
        )
        .bind(description)
        .bind(department_id)
        .bind(available_from)
        .bind(available_until)
        .fetch_one(&self.pool)
        .await?;

        Ok(plan)
    }

    async fn fetch_db_user_by_username(&self, username: &str) -> AppResult<Option<DbUser>> {
        let user = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn load_capability_set(&self, user_id: i64) -> AppResult<Option<CapabilitySet>> {
        let set = sqlx::query_as::<_, CapabilitySet>(&format!(
            "SELECT {ACL_COLUMNS} FROM access_control_lists WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(set)
    }
}

async fn insert_capability_set(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, set: &CapabilitySet) -> AppResult<()> {
    let placeholders = vec!["?"; Capability::ALL.len() + 1].join(", ");
    let sql = format!("INSERT INTO access_control_lists ({ACL_COLUMNS}) VALUES ({placeholders})");

    // Column order of ACL_COLUMNS follows Capability::ALL.
    let mut query = sqlx::query(&sql).bind(set.user_id);
    for capability in Capability::ALL {
        query = query.bind(set.get(*capability));
    }
    query.execute(&mut **tx).await?;
    Ok(())
}

fn hash_password(password: &str) -> AppResult<String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))
}

fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(password_hash).map_err(|err| AppError::internal(format!("invalid password hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[async_trait]
impl CurrentUserProvider for SqliteStore {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user.map(User::from))
    }

    async fn capabilities(&self, user_id: i64) -> AppResult<Option<CapabilitySet>> {
        self.load_capability_set(user_id).await
    }
}

#[async_trait]
impl AccessObjectStore for SqliteStore {
    async fn find(&self, kind: AccessObjectKind, id: i64) -> AppResult<Option<BoxedAccessObject>> {
        let found = match kind {
            AccessObjectKind::User => self.find_user(id).await?.map(|u| Box::new(u) as BoxedAccessObject),
            AccessObjectKind::Department => sqlx::query_as::<_, Department>(
                "SELECT id, name, created_at FROM departments WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|d| Box::new(d) as BoxedAccessObject),
            AccessObjectKind::DeploymentPlan => sqlx::query_as::<_, DeploymentPlan>(
                "SELECT id, description, department_id, published, available_from, available_until \
                 FROM deployment_plans WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|p| Box::new(p) as BoxedAccessObject),
        };
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::DepartmentScoped;
    use chrono::Duration;

    async fn store() -> SqliteStore {
        // single connection so the in-memory database is shared
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::migrate(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn new_users_get_default_capabilities() {
        let store = store().await;
        let dept = store.create_department("Kitchen").await.unwrap();
        let user = store.create_user("bob", "password123", Some(dept.id)).await.unwrap();

        let set = store.capabilities(user.id).await.unwrap().unwrap();
        assert_eq!(set, CapabilitySet::new(user.id));
        assert_eq!(store.find_user(user.id).await.unwrap().unwrap().department_id, Some(dept.id));
    }

    #[tokio::test]
    async fn grants_round_trip_through_the_table() {
        let store = store().await;
        let user = store.create_user("bob", "password123", None).await.unwrap();

        store.set_capability(user.id, Capability::CanEditAppointments, true).await.unwrap();
        store.set_capability(user.id, Capability::CanViewExternalNews, false).await.unwrap();

        let set = store.capabilities(user.id).await.unwrap().unwrap();
        assert_eq!(set.granted(), vec![Capability::CanEditAppointments]);
    }

    #[tokio::test]
    async fn credentials_and_password_change() {
        let store = store().await;
        let user = store.create_user("bob", "password123", None).await.unwrap();

        assert!(store.verify_credentials("bob", "password123").await.unwrap().is_some());
        assert!(store.verify_credentials("bob", "wrong-password").await.unwrap().is_none());
        assert!(store.verify_credentials("nobody", "password123").await.unwrap().is_none());

        store.change_password(user.id, "new-password").await.unwrap();
        let reloaded = store.find_user(user.id).await.unwrap().unwrap();
        assert!(reloaded.last_invalidated > user.last_invalidated);
        assert!(store.verify_credentials("bob", "new-password").await.unwrap().is_some());

        assert!(matches!(store.create_user("bob", "password123", None).await, Err(AppError::BadRequest(_))));
        assert!(matches!(store.create_user("amy", "short", None).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn access_objects_expose_their_department() {
        let store = store().await;
        let dept = store.create_department("Service").await.unwrap();
        let now = Utc::now();
        let plan = store
            .create_deployment_plan(Some(dept.id), Some("week 1"), now, now + Duration::days(7))
            .await
            .unwrap();

        let found = store.find(AccessObjectKind::DeploymentPlan, plan.id).await.unwrap().unwrap();
        assert_eq!(found.department_id(), Some(dept.id));

        let department = store.find(AccessObjectKind::Department, dept.id).await.unwrap().unwrap();
        assert_eq!(department.department_id(), Some(dept.id));

        assert!(store.find(AccessObjectKind::User, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidating_unknown_user_is_not_found() {
        let store = store().await;
        assert!(matches!(store.invalidate_tokens(42, Utc::now()).await, Err(AppError::NotFound(_))));
    }
}
