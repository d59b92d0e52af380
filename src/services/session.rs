//! Request-scoped wrapper around the server-side session.
//!
//! `create` and `destroy` are the only operations that change who the
//! session belongs to. `current` refreshes the idle clock and ends a
//! browser-session login that sat idle too long.
//!
//! Without "remember me" the cookie carries no `Max-Age`, so it dies with the
//! browser; the idle timeout is enforced here on the server instead.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tower_sessions::{Expiry, Session};

use crate::config::SessionConfig;
use crate::constants::session_keys;
use crate::db::User;
use crate::domain::Role;
use crate::services::auth_service::AuthError;
use crate::services::csrf::CsrfService;

/// Identity stored in an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
        }
    }
}

impl SessionUser {
    #[must_use]
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}

#[derive(Clone)]
pub struct SessionManager {
    session: Session,
    idle_timeout: Duration,
    remember_me: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(session: Session, config: &SessionConfig) -> Self {
        Self {
            session,
            idle_timeout: Duration::minutes(config.idle_timeout_minutes),
            remember_me: Duration::days(config.remember_me_days),
        }
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Binds the session to `user` under a brand-new identifier and a fresh
    /// CSRF token. The pre-login identifier is never reused.
    pub async fn create(&self, user: &User, remember_me: bool) -> Result<SessionUser, AuthError> {
        self.session.cycle_id().await.map_err(session_error)?;

        let session_user = SessionUser::from(user);
        self.session
            .insert(session_keys::USER, &session_user)
            .await
            .map_err(session_error)?;
        CsrfService::regenerate(&self.session)
            .await
            .map_err(session_error)?;

        let now = OffsetDateTime::now_utc();
        if remember_me {
            self.session
                .set_expiry(Some(Expiry::AtDateTime(now + self.remember_me)));
        } else {
            self.session.set_expiry(Some(Expiry::OnSessionEnd));
            self.session
                .insert(session_keys::LAST_SEEN, now.unix_timestamp())
                .await
                .map_err(session_error)?;
        }

        Ok(session_user)
    }

    pub async fn current(&self) -> Result<Option<SessionUser>, AuthError> {
        let Some(user) = self
            .session
            .get::<SessionUser>(session_keys::USER)
            .await
            .map_err(session_error)?
        else {
            return Ok(None);
        };

        let Some(last_seen) = self
            .session
            .get::<i64>(session_keys::LAST_SEEN)
            .await
            .map_err(session_error)?
        else {
            return Ok(Some(user));
        };

        let now = OffsetDateTime::now_utc().unix_timestamp();
        if now.saturating_sub(last_seen) > self.idle_timeout.whole_seconds() {
            tracing::info!(user_id = user.id, "Session idle timeout reached");
            self.destroy().await?;
            return Ok(None);
        }

        self.session
            .insert(session_keys::LAST_SEEN, now)
            .await
            .map_err(session_error)?;
        Ok(Some(user))
    }

    /// Deletes the record from the store; the old cookie becomes anonymous.
    pub async fn destroy(&self) -> Result<(), AuthError> {
        self.session.flush().await.map_err(session_error)
    }

    pub async fn csrf_token(&self) -> Result<String, AuthError> {
        CsrfService::issue(&self.session)
            .await
            .map_err(session_error)
    }

    pub async fn validate_csrf(&self, submitted: Option<&str>) -> bool {
        CsrfService::validate(&self.session, submitted).await
    }
}

fn session_error(err: tower_sessions::session::Error) -> AuthError {
    AuthError::SessionError(err.to_string())
}
