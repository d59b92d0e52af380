//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::config::{AuthThrottleConfig, SecurityConfig};
use crate::db::{NewAuditEntry, Store, User};
use crate::domain::{AuditAction, EntityType};
use crate::services::audit::AuditLogger;
use crate::services::auth_service::{
    AuthError, AuthService, LoginAttempt, LoginOutcome, LoginRejection, PasswordChange,
};
use crate::services::password::CredentialHasher;
use crate::services::session::{SessionManager, SessionUser};

pub struct SeaOrmAuthService {
    store: Store,
    hasher: CredentialHasher,
    audit: AuditLogger,
    throttle: AuthThrottleConfig,
    min_password_length: usize,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        hasher: CredentialHasher,
        audit: AuditLogger,
        security: &SecurityConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            audit,
            throttle: security.auth_throttle.clone(),
            min_password_length: security.min_password_length,
        }
    }

    async fn reject(&self, rejection: LoginRejection) -> Result<LoginOutcome, AuthError> {
        metrics::counter!("auth_login_total", "outcome" => rejection.code()).increment(1);

        if self.throttle.failure_delay_ms > 0 && rejection != LoginRejection::InvalidCsrf {
            tokio::time::sleep(std::time::Duration::from_millis(
                self.throttle.failure_delay_ms,
            ))
            .await;
        }

        Ok(LoginOutcome::Rejected(rejection))
    }

    async fn wrong_password(
        &self,
        user: &User,
        ip_address: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, AuthError> {
        let lockout = i64::try_from(self.throttle.lockout_seconds).unwrap_or(i64::MAX);
        let deadline = now + Duration::seconds(lockout);
        let attempt = self
            .store
            .register_failed_attempt(user.id, now, self.throttle.max_attempts, deadline)
            .await?;

        self.audit
            .record(
                NewAuditEntry::new(AuditAction::LoginFailed, EntityType::User)
                    .actor(Some(user.id))
                    .entity(i64::from(user.id))
                    .details(json!({ "attempts": attempt.attempts }))
                    .ip(ip_address),
            )
            .await;

        let attempts = u32::try_from(attempt.attempts).unwrap_or(u32::MAX);
        if attempt.lockout_until.is_some() {
            warn!(username = %user.username, attempts, "Account locked after repeated failures");
            return self
                .reject(LoginRejection::LockedJustNow {
                    lockout_minutes: self.throttle.lockout_minutes(),
                })
                .await;
        }

        self.reject(LoginRejection::BadCredentials {
            attempts_remaining: Some(self.throttle.max_attempts.saturating_sub(attempts)),
        })
        .await
    }
}

/// Whole minutes left until `until`, rounded up and never below one.
fn minutes_until(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (until - now).num_seconds().max(1);
    (seconds + 59) / 60
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(
        &self,
        sessions: &SessionManager,
        attempt: LoginAttempt,
    ) -> Result<LoginOutcome, AuthError> {
        if !sessions.validate_csrf(attempt.csrf_token.as_deref()).await {
            warn!(ip = ?attempt.ip_address, "Login rejected: CSRF token mismatch");
            return self.reject(LoginRejection::InvalidCsrf).await;
        }

        let Some((user, password_hash)) = self
            .store
            .get_user_by_username_with_password(&attempt.username)
            .await?
        else {
            self.hasher.verify_dummy(&attempt.password).await;
            self.audit
                .record(
                    NewAuditEntry::new(AuditAction::LoginFailedUnknown, EntityType::User)
                        .details(json!({ "username": attempt.username }))
                        .ip(attempt.ip_address),
                )
                .await;
            return self
                .reject(LoginRejection::BadCredentials {
                    attempts_remaining: None,
                })
                .await;
        };

        if !user.is_active {
            self.audit
                .record(
                    NewAuditEntry::new(AuditAction::LoginBlockedInactive, EntityType::User)
                        .actor(Some(user.id))
                        .entity(i64::from(user.id))
                        .ip(attempt.ip_address),
                )
                .await;
            return self.reject(LoginRejection::AccountDisabled).await;
        }

        let now = Utc::now();
        if let Some(until) = user.lockout_until.filter(|until| *until > now) {
            let minutes_remaining = minutes_until(until, now);
            self.audit
                .record(
                    NewAuditEntry::new(AuditAction::LoginBlockedLockout, EntityType::User)
                        .actor(Some(user.id))
                        .entity(i64::from(user.id))
                        .details(json!({ "minutes_remaining": minutes_remaining }))
                        .ip(attempt.ip_address),
                )
                .await;
            return self
                .reject(LoginRejection::Locked { minutes_remaining })
                .await;
        }

        if !self.hasher.verify(&attempt.password, &password_hash).await {
            return self.wrong_password(&user, attempt.ip_address, now).await;
        }

        self.store.record_successful_login(user.id, now).await?;
        let session_user = sessions.create(&user, attempt.remember_me).await?;

        self.audit
            .record(
                NewAuditEntry::new(AuditAction::LoginSuccess, EntityType::User)
                    .actor(Some(user.id))
                    .entity(i64::from(user.id))
                    .details(json!({ "remember_me": attempt.remember_me }))
                    .ip(attempt.ip_address),
            )
            .await;

        metrics::counter!("auth_login_total", "outcome" => "success").increment(1);
        info!(username = %user.username, role = %user.role, "User logged in");

        Ok(LoginOutcome::Authenticated(session_user))
    }

    async fn logout(
        &self,
        sessions: &SessionManager,
        ip_address: Option<String>,
    ) -> Result<Option<SessionUser>, AuthError> {
        let previous = sessions.current().await?;
        sessions.destroy().await?;

        if let Some(user) = &previous {
            self.audit
                .record(
                    NewAuditEntry::new(AuditAction::Logout, EntityType::User)
                        .actor(Some(user.id))
                        .entity(i64::from(user.id))
                        .ip(ip_address),
                )
                .await;
            info!(username = %user.username, "User logged out");
        }

        Ok(previous)
    }

    async fn change_password(
        &self,
        actor: &SessionUser,
        change: PasswordChange,
        ip_address: Option<String>,
    ) -> Result<(), AuthError> {
        if change.new_password.chars().count() < self.min_password_length {
            return Err(AuthError::Validation(format!(
                "New password must be at least {} characters",
                self.min_password_length
            )));
        }

        if change.new_password != change.confirm_password {
            return Err(AuthError::Validation(
                "New password and confirmation do not match".to_string(),
            ));
        }

        if change.current_password == change.new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let current_hash = self
            .store
            .get_user_password_hash(actor.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .hasher
            .verify(&change.current_password, &current_hash)
            .await
        {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let new_hash = self
            .hasher
            .hash(&change.new_password)
            .await
            .map_err(|e| AuthError::Internal(format!("{e:#}")))?;
        self.store
            .update_user_password_hash(actor.id, new_hash)
            .await?;

        self.audit
            .record(
                NewAuditEntry::new(AuditAction::ChangePassword, EntityType::User)
                    .actor(Some(actor.id))
                    .entity(i64::from(actor.id))
                    .ip(ip_address),
            )
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_store;
    use crate::db::{AuditFilter, NewUser};
    use crate::domain::Role;
    use crate::services::password::tests::fast_security_config;
    use crate::services::session::tests::manager;

    const PASSWORD: &str = "corect-horse-9";

    struct Harness {
        store: Store,
        service: SeaOrmAuthService,
        audit: AuditLogger,
    }

    async fn harness() -> Harness {
        let store = test_store().await;
        let mut security = fast_security_config();
        security.auth_throttle.failure_delay_ms = 0;
        let hasher = CredentialHasher::new(&security).unwrap();
        let audit = AuditLogger::new(store.clone());
        let service = SeaOrmAuthService::new(store.clone(), hasher, audit.clone(), &security);
        Harness {
            store,
            service,
            audit,
        }
    }

    async fn create_user(h: &Harness, username: &str, role: Role) -> User {
        let password_hash = h.service.hasher.hash(PASSWORD).await.unwrap();
        h.store
            .create_user(NewUser {
                username: username.to_string(),
                full_name: format!("{username} test"),
                role,
                password_hash,
            })
            .await
            .unwrap()
    }

    async fn attempt(sessions: &SessionManager, username: &str, password: &str) -> LoginAttempt {
        LoginAttempt {
            username: username.to_string(),
            password: password.to_string(),
            remember_me: false,
            csrf_token: Some(sessions.csrf_token().await.unwrap()),
            ip_address: Some("10.1.2.3".to_string()),
        }
    }

    async fn actions(audit: &AuditLogger) -> Vec<String> {
        let page = audit.query(&AuditFilter::default(), 1, 100).await.unwrap();
        page.entries.into_iter().rev().map(|e| e.action).collect()
    }

    #[tokio::test]
    async fn test_successful_login_binds_session_and_resets_counter() {
        let h = harness().await;
        let user = create_user(&h, "elena", Role::Admin).await;
        let sessions = manager();

        let bad = attempt(&sessions, "elena", "wrong").await;
        h.service.login(&sessions, bad).await.unwrap();

        let good = attempt(&sessions, "elena", PASSWORD).await;
        let outcome = h.service.login(&sessions, good).await.unwrap();

        let LoginOutcome::Authenticated(session_user) = outcome else {
            panic!("expected login to succeed, got {outcome:?}");
        };
        assert_eq!(session_user.id, user.id);
        assert_eq!(sessions.current().await.unwrap(), Some(session_user));

        let reloaded = h.store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.failed_login_attempts, 0);
        assert!(reloaded.last_login.is_some());

        assert_eq!(actions(&h.audit).await, vec!["login_failed", "login_success"]);
    }

    #[tokio::test]
    async fn test_correct_password_after_one_short_of_threshold_succeeds() {
        let h = harness().await;
        let user = create_user(&h, "irina", Role::Editor).await;
        let sessions = manager();
        let threshold = fast_security_config().auth_throttle.max_attempts;

        for n in 1..threshold {
            let bad = attempt(&sessions, "irina", "wrong").await;
            let outcome = h.service.login(&sessions, bad).await.unwrap();
            assert!(
                matches!(
                    outcome,
                    LoginOutcome::Rejected(LoginRejection::BadCredentials { .. })
                ),
                "failure {n} returned {outcome:?}"
            );
        }

        let counted = h.store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(counted.failed_login_attempts, i32::try_from(threshold - 1).unwrap());
        assert!(counted.lockout_until.is_none());

        let good = attempt(&sessions, "irina", PASSWORD).await;
        let outcome = h.service.login(&sessions, good).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated(_)));

        let reset = h.store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(reset.failed_login_attempts, 0);
        assert!(reset.lockout_until.is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_the_same() {
        let h = harness().await;
        create_user(&h, "elena", Role::Admin).await;
        let sessions = manager();

        let unknown = h
            .service
            .login(&sessions, attempt(&sessions, "nobody", PASSWORD).await)
            .await
            .unwrap();
        let wrong = h
            .service
            .login(&sessions, attempt(&sessions, "elena", "nope").await)
            .await
            .unwrap();

        let (LoginOutcome::Rejected(unknown), LoginOutcome::Rejected(wrong)) = (unknown, wrong)
        else {
            panic!("both attempts must be rejected");
        };
        assert_eq!(unknown.code(), wrong.code());
        assert_eq!(unknown.message(), wrong.message());
        assert_eq!(
            actions(&h.audit).await,
            vec!["login_failed_unknown", "login_failed"]
        );
    }

    #[tokio::test]
    async fn test_csrf_mismatch_touches_nothing() {
        let h = harness().await;
        let user = create_user(&h, "elena", Role::Admin).await;
        let sessions = manager();
        sessions.csrf_token().await.unwrap();

        let mut forged = attempt(&sessions, "elena", "wrong").await;
        forged.csrf_token = Some("0".repeat(64));
        let outcome = h.service.login(&sessions, forged).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Rejected(LoginRejection::InvalidCsrf));

        let mut missing = attempt(&sessions, "elena", PASSWORD).await;
        missing.csrf_token = None;
        let outcome = h.service.login(&sessions, missing).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Rejected(LoginRejection::InvalidCsrf));

        let reloaded = h.store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.failed_login_attempts, 0);
        assert!(sessions.current().await.unwrap().is_none());
        assert!(actions(&h.audit).await.is_empty());
    }

    #[tokio::test]
    async fn test_fifth_failure_locks_and_correct_password_is_refused() {
        let h = harness().await;
        let user = create_user(&h, "irina", Role::Editor).await;
        let now = Utc::now();
        for _ in 0..4 {
            h.store
                .register_failed_attempt(user.id, now, 5, now + Duration::minutes(15))
                .await
                .unwrap();
        }
        let sessions = manager();

        let outcome = h
            .service
            .login(&sessions, attempt(&sessions, "irina", "still-wrong").await)
            .await
            .unwrap();
        let LoginOutcome::Rejected(rejection) = outcome else {
            panic!("expected a lockout");
        };
        assert_eq!(
            rejection,
            LoginRejection::LockedJustNow {
                lockout_minutes: 15
            }
        );
        assert!(rejection.message().contains("blocked for 15 minute"));

        let locked = h.store.get_user(user.id).await.unwrap().unwrap();
        let until = locked.lockout_until.unwrap();
        let minutes = (until - Utc::now()).num_minutes();
        assert!((14..=15).contains(&minutes));

        let outcome = h
            .service
            .login(&sessions, attempt(&sessions, "irina", PASSWORD).await)
            .await
            .unwrap();
        let LoginOutcome::Rejected(LoginRejection::Locked { minutes_remaining }) = outcome else {
            panic!("correct password must be refused while locked, got {outcome:?}");
        };
        assert!((1..=15).contains(&minutes_remaining));

        let still_locked = h.store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(still_locked.failed_login_attempts, 5);
        assert_eq!(still_locked.lockout_until, Some(until));
        assert!(sessions.current().await.unwrap().is_none());

        let recorded = actions(&h.audit).await;
        assert_eq!(recorded, vec!["login_failed", "login_blocked_lockout"]);
    }

    #[tokio::test]
    async fn test_disabled_account_is_refused_before_password_check() {
        let h = harness().await;
        create_user(&h, "vasile", Role::Viewer).await;
        h.store.set_user_active("vasile", false).await.unwrap();
        let sessions = manager();

        let outcome = h
            .service
            .login(&sessions, attempt(&sessions, "vasile", PASSWORD).await)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::Rejected(LoginRejection::AccountDisabled)
        );
        assert_eq!(actions(&h.audit).await, vec!["login_blocked_inactive"]);
    }

    #[tokio::test]
    async fn test_logout_records_previous_user() {
        let h = harness().await;
        let user = create_user(&h, "elena", Role::Admin).await;
        let sessions = manager();
        h.service
            .login(&sessions, attempt(&sessions, "elena", PASSWORD).await)
            .await
            .unwrap();

        let previous = h.service.logout(&sessions, None).await.unwrap();
        assert_eq!(previous.map(|u| u.id), Some(user.id));
        assert!(sessions.current().await.unwrap().is_none());

        let anonymous = h.service.logout(&manager(), None).await.unwrap();
        assert!(anonymous.is_none());
        assert_eq!(actions(&h.audit).await, vec!["login_success", "logout"]);
    }

    #[tokio::test]
    async fn test_change_password_policy() {
        let h = harness().await;
        let user = create_user(&h, "elena", Role::Admin).await;
        let actor = SessionUser::from(&user);

        let change = |current: &str, new: &str, confirm: &str| PasswordChange {
            current_password: current.to_string(),
            new_password: new.to_string(),
            confirm_password: confirm.to_string(),
        };

        for invalid in [
            change(PASSWORD, "short", "short"),
            change(PASSWORD, "long-enough-1", "long-enough-2"),
            change(PASSWORD, PASSWORD, PASSWORD),
            change("not-the-password", "long-enough-1", "long-enough-1"),
        ] {
            let err = h
                .service
                .change_password(&actor, invalid, None)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)));
        }
        assert!(actions(&h.audit).await.is_empty());

        h.service
            .change_password(&actor, change(PASSWORD, "long-enough-1", "long-enough-1"), None)
            .await
            .unwrap();

        let hash = h.store.get_user_password_hash(user.id).await.unwrap().unwrap();
        assert!(h.service.hasher.verify("long-enough-1", &hash).await);
        assert_eq!(actions(&h.audit).await, vec!["change_password"]);
    }

    #[test]
    fn test_minutes_until_rounds_up() {
        let now = Utc::now();
        assert_eq!(minutes_until(now + Duration::seconds(1), now), 1);
        assert_eq!(minutes_until(now + Duration::seconds(60), now), 1);
        assert_eq!(minutes_until(now + Duration::seconds(61), now), 2);
        assert_eq!(minutes_until(now + Duration::minutes(15), now), 15);
    }
}
