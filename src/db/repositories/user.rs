use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, Set, Statement, Value, sea_query::Expr,
};

use crate::domain::Role;
use crate::entities::users;

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub lockout_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<users::Model> for User {
    type Error = anyhow::Error;

    fn try_from(model: users::Model) -> Result<Self> {
        let role = model
            .role
            .parse()
            .with_context(|| format!("User {} has an invalid role", model.id))?;

        Ok(Self {
            id: model.id,
            username: model.username,
            full_name: model.full_name,
            role,
            is_active: model.is_active,
            failed_login_attempts: model.failed_login_attempts,
            lockout_until: model.lockout_until,
            last_login: model.last_login,
            created_at: model.created_at,
        })
    }
}

/// Input for provisioning a new account. The hash is produced by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub password_hash: String,
}

/// Counter state right after a failed attempt was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedAttempt {
    pub attempts: i32,
    pub lockout_until: Option<DateTime<Utc>>,
}

/// Increments the failure counter and arms the lockout in one statement so
/// concurrent attempts against the same account cannot lose updates.
/// A lockout that has already expired restarts the count at 1.
///
/// ?1 = now, ?2 = threshold, ?3 = lockout deadline, ?4 = user id
const REGISTER_FAILED_ATTEMPT_SQL: &str = "\
UPDATE users SET
    failed_login_attempts = CASE
        WHEN lockout_until IS NOT NULL AND lockout_until <= ?1 THEN 1
        ELSE failed_login_attempts + 1
    END,
    lockout_until = CASE
        WHEN (CASE
                WHEN lockout_until IS NOT NULL AND lockout_until <= ?1 THEN 1
                ELSE failed_login_attempts + 1
              END) >= ?2 THEN ?3
        WHEN lockout_until IS NOT NULL AND lockout_until <= ?1 THEN NULL
        ELSE lockout_until
    END,
    updated_at = ?1
WHERE id = ?4
RETURNING failed_login_attempts, lockout_until";

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get user by username (exact, case-sensitive match)
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        user.map(User::try_from).transpose()
    }

    /// Get user by username together with the stored password hash
    pub async fn get_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        user.map(|u| {
            let password_hash = u.password_hash.clone();
            User::try_from(u).map(|user| (user, password_hash))
        })
        .transpose()
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        user.map(User::try_from).transpose()
    }

    pub async fn get_password_hash(&self, id: i32) -> Result<Option<String>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        Ok(user.map(|u| u.password_hash))
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        let now = Utc::now();

        let active = users::ActiveModel {
            username: Set(new_user.username),
            full_name: Set(new_user.full_name),
            role: Set(new_user.role.as_str().to_string()),
            password_hash: Set(new_user.password_hash),
            failed_login_attempts: Set(0),
            lockout_until: Set(None),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        User::try_from(model)
    }

    /// Clears the failure counter and lockout, and stamps `last_login`.
    pub async fn record_successful_login(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        users::Entity::update_many()
            .col_expr(users::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(
                users::Column::LockoutUntil,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(users::Column::LastLogin, Expr::value(now))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to record successful login")?;

        Ok(())
    }

    pub async fn register_failed_attempt(
        &self,
        id: i32,
        now: DateTime<Utc>,
        threshold: u32,
        lockout_deadline: DateTime<Utc>,
    ) -> Result<FailedAttempt> {
        let threshold = i32::try_from(threshold).unwrap_or(i32::MAX);
        let values: Vec<Value> = vec![
            now.into(),
            threshold.into(),
            lockout_deadline.into(),
            id.into(),
        ];
        let stmt =
            Statement::from_sql_and_values(DbBackend::Sqlite, REGISTER_FAILED_ATTEMPT_SQL, values);

        let row = self
            .conn
            .query_one(stmt)
            .await
            .context("Failed to register failed login attempt")?
            .ok_or_else(|| anyhow::anyhow!("User {id} not found while counting attempts"))?;

        Ok(FailedAttempt {
            attempts: row.try_get("", "failed_login_attempts")?,
            lockout_until: row.try_get("", "lockout_until")?,
        })
    }

    pub async fn update_password_hash(&self, id: i32, password_hash: String) -> Result<()> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update password hash")?;

        if result.rows_affected == 0 {
            anyhow::bail!("User not found: {id}");
        }

        Ok(())
    }

    /// Returns false when no such user exists.
    pub async fn set_active(&self, username: &str, active: bool) -> Result<bool> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::IsActive, Expr::value(active))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Username.eq(username))
            .exec(&self.conn)
            .await
            .context("Failed to update account status")?;

        Ok(result.rows_affected > 0)
    }

    /// Administrative unlock: clears both the counter and any lockout.
    pub async fn clear_lockout(&self, username: &str) -> Result<bool> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(
                users::Column::LockoutUntil,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Username.eq(username))
            .exec(&self.conn)
            .await
            .context("Failed to clear lockout")?;

        Ok(result.rows_affected > 0)
    }
}
