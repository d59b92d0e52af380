//! Domain service for authentication and account self-service.
//!
//! Handles the login state machine, logout and password changes.

use thiserror::Error;

use crate::constants::messages;
use crate::services::session::{SessionManager, SessionUser};

/// Errors specific to authentication operations.
///
/// Credential problems are not errors: they come back as
/// [`LoginOutcome::Rejected`]. These variants cover the rest.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Validated input of one login submission.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub username: String,
    pub password: String,
    pub remember_me: bool,
    pub csrf_token: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(SessionUser),
    Rejected(LoginRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRejection {
    InvalidCsrf,
    /// Unknown username and wrong password look identical to the client.
    /// `attempts_remaining` is only known for existing accounts and is never
    /// rendered.
    BadCredentials { attempts_remaining: Option<u32> },
    AccountDisabled,
    Locked { minutes_remaining: i64 },
    LockedJustNow { lockout_minutes: u64 },
}

impl LoginRejection {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCsrf => "invalid_csrf",
            Self::BadCredentials { .. } => "bad_credentials",
            Self::AccountDisabled => "account_disabled",
            Self::Locked { .. } => "locked",
            Self::LockedJustNow { .. } => "locked_just_now",
        }
    }

    /// User-facing text.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::InvalidCsrf => messages::CSRF_INVALID.to_string(),
            Self::BadCredentials { .. } => messages::BAD_CREDENTIALS.to_string(),
            Self::AccountDisabled => messages::ACCOUNT_DISABLED.to_string(),
            Self::Locked { minutes_remaining } => format!(
                "Account temporarily blocked. Try again in {minutes_remaining} {}.",
                minute_word(*minutes_remaining)
            ),
            Self::LockedJustNow { lockout_minutes } => format!(
                "Too many failed attempts. Account blocked for {lockout_minutes} {}.",
                minute_word(i64::try_from(*lockout_minutes).unwrap_or(i64::MAX))
            ),
        }
    }
}

const fn minute_word(n: i64) -> &'static str {
    if n == 1 { "minute" } else { "minutes" }
}

/// Password change form after boundary parsing.
#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Runs one login attempt against `sessions`.
    ///
    /// # Errors
    ///
    /// Only storage or session failures are errors; every credential branch
    /// yields a [`LoginOutcome`].
    async fn login(
        &self,
        sessions: &SessionManager,
        attempt: LoginAttempt,
    ) -> Result<LoginOutcome, AuthError>;

    /// Destroys the session server-side and returns who was logged in.
    async fn logout(
        &self,
        sessions: &SessionManager,
        ip_address: Option<String>,
    ) -> Result<Option<SessionUser>, AuthError>;

    /// Changes the actor's own password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if the policy is not met or the
    /// current password is incorrect.
    async fn change_password(
        &self,
        actor: &SessionUser,
        change: PasswordChange,
        ip_address: Option<String>,
    ) -> Result<(), AuthError>;
}
