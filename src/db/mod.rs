use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::ContentKind;

pub mod migrator;
pub mod repositories;

pub use crate::entities::audit_log::Model as AuditLogRow;
pub use crate::entities::documents::Model as Document;
pub use repositories::audit::{ActionMatch, AuditFilter, NewAuditEntry};
pub use repositories::document::DocumentInput;
pub use repositories::user::{FailedAttempt, NewUser, User};

/// Explicitly constructed storage client handed to every component that
/// touches the database.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn document_repo(&self) -> repositories::document::DocumentRepository {
        repositories::document::DocumentRepository::new(self.conn.clone())
    }

    // ========== User Repository Methods ==========

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        self.user_repo()
            .get_by_username_with_password(username)
            .await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_password_hash(&self, id: i32) -> Result<Option<String>> {
        self.user_repo().get_password_hash(id).await
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        self.user_repo().create(new_user).await
    }

    pub async fn record_successful_login(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        self.user_repo().record_successful_login(id, now).await
    }

    pub async fn register_failed_attempt(
        &self,
        id: i32,
        now: DateTime<Utc>,
        threshold: u32,
        lockout_deadline: DateTime<Utc>,
    ) -> Result<FailedAttempt> {
        self.user_repo()
            .register_failed_attempt(id, now, threshold, lockout_deadline)
            .await
    }

    pub async fn update_user_password_hash(&self, id: i32, password_hash: String) -> Result<()> {
        self.user_repo()
            .update_password_hash(id, password_hash)
            .await
    }

    pub async fn set_user_active(&self, username: &str, active: bool) -> Result<bool> {
        self.user_repo().set_active(username, active).await
    }

    pub async fn clear_user_lockout(&self, username: &str) -> Result<bool> {
        self.user_repo().clear_lockout(username).await
    }

    // ========== Audit Repository Methods ==========

    pub async fn append_audit(&self, entry: NewAuditEntry) -> Result<i64> {
        self.audit_repo().append(entry).await
    }

    pub async fn get_audit_page(
        &self,
        filter: &AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<AuditLogRow>, u64)> {
        self.audit_repo().page(filter, page, page_size).await
    }

    pub async fn get_all_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditLogRow>> {
        self.audit_repo().all(filter).await
    }

    pub async fn count_audit_since(&self, since: DateTime<Utc>, action: ActionMatch) -> Result<u64> {
        self.audit_repo().count_since(since, action).await
    }

    // ========== Document Repository Methods ==========

    pub async fn list_documents(&self, kind: ContentKind) -> Result<Vec<Document>> {
        self.document_repo().list(kind).await
    }

    pub async fn get_document(&self, kind: ContentKind, id: i32) -> Result<Option<Document>> {
        self.document_repo().get(kind, id).await
    }

    pub async fn create_document(
        &self,
        kind: ContentKind,
        input: DocumentInput,
        created_by: i32,
    ) -> Result<Document> {
        self.document_repo().create(kind, input, created_by).await
    }

    pub async fn update_document(
        &self,
        kind: ContentKind,
        id: i32,
        input: DocumentInput,
    ) -> Result<Option<Document>> {
        self.document_repo().update(kind, id, input).await
    }

    pub async fn delete_document(&self, kind: ContentKind, id: i32) -> Result<Option<Document>> {
        self.document_repo().delete(kind, id).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{AuditAction, EntityType, Role};

    pub(crate) async fn test_store() -> Store {
        let db_path =
            std::env::temp_dir().join(format!("primaria-unit-{}.db", uuid::Uuid::new_v4()));
        Store::new(&format!("sqlite:{}", db_path.display()))
            .await
            .expect("failed to open test store")
    }

    pub(crate) async fn seed_user(store: &Store, username: &str, role: Role) -> User {
        store
            .create_user(NewUser {
                username: username.to_string(),
                full_name: format!("{username} test"),
                role,
                password_hash: "not-a-real-hash".to_string(),
            })
            .await
            .expect("failed to seed user")
    }

    fn entry(user_id: Option<i32>, action: AuditAction) -> NewAuditEntry {
        NewAuditEntry {
            user_id,
            action,
            entity_type: EntityType::User,
            entity_id: user_id.map(i64::from),
            details: None,
            ip_address: Some("127.0.0.1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_failed_attempts_lock_at_threshold() {
        let store = test_store().await;
        let user = seed_user(&store, "irina", Role::Editor).await;
        let now = Utc::now();
        let deadline = now + chrono::Duration::minutes(15);

        for expected in 1..5 {
            let attempt = store
                .register_failed_attempt(user.id, now, 5, deadline)
                .await
                .unwrap();
            assert_eq!(attempt.attempts, expected);
            assert!(attempt.lockout_until.is_none());
        }

        let attempt = store
            .register_failed_attempt(user.id, now, 5, deadline)
            .await
            .unwrap();
        assert_eq!(attempt.attempts, 5);
        assert_eq!(attempt.lockout_until, Some(deadline));
    }

    #[tokio::test]
    async fn test_expired_lockout_restarts_count() {
        let store = test_store().await;
        let user = seed_user(&store, "mihai", Role::Viewer).await;
        let long_ago = Utc::now() - chrono::Duration::hours(2);

        for _ in 0..3 {
            store
                .register_failed_attempt(user.id, long_ago, 3, long_ago + chrono::Duration::minutes(15))
                .await
                .unwrap();
        }

        let now = Utc::now();
        let attempt = store
            .register_failed_attempt(user.id, now, 3, now + chrono::Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(attempt.attempts, 1);
        assert!(attempt.lockout_until.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_all_counted() {
        let store = test_store().await;
        let user = seed_user(&store, "ana", Role::Viewer).await;
        let now = Utc::now();
        let deadline = now + chrono::Duration::minutes(15);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .register_failed_attempt(user.id, now, 100, deadline)
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let reloaded = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.failed_login_attempts, 8);
    }

    #[tokio::test]
    async fn test_successful_login_resets_counter() {
        let store = test_store().await;
        let user = seed_user(&store, "dan", Role::Admin).await;
        let now = Utc::now();
        for _ in 0..3 {
            store
                .register_failed_attempt(user.id, now, 5, now)
                .await
                .unwrap();
        }

        store.record_successful_login(user.id, now).await.unwrap();

        let reloaded = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.failed_login_attempts, 0);
        assert!(reloaded.lockout_until.is_none());
        assert!(reloaded.last_login.is_some());
    }

    #[tokio::test]
    async fn test_audit_page_newest_first_with_filters() {
        let store = test_store().await;
        let user = seed_user(&store, "elena", Role::Admin).await;

        store.append_audit(entry(None, AuditAction::LoginFailedUnknown)).await.unwrap();
        store.append_audit(entry(Some(user.id), AuditAction::LoginSuccess)).await.unwrap();
        let last = store.append_audit(entry(Some(user.id), AuditAction::Logout)).await.unwrap();

        let (rows, total) = store
            .get_audit_page(&AuditFilter::default(), 1, 2)
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, last);
        assert!(rows[0].id > rows[1].id);

        let filter = AuditFilter {
            user_id: Some(user.id),
            action: Some(AuditAction::LoginSuccess),
            ..AuditFilter::default()
        };
        let (rows, total) = store.get_audit_page(&filter, 1, 50).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].action, "login_success");

        let filter = AuditFilter {
            until: Some(Utc::now() - chrono::Duration::days(1)),
            ..AuditFilter::default()
        };
        let (rows, total) = store.get_audit_page(&filter, 1, 50).await.unwrap();
        assert_eq!(total, 0);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_document_delete_returns_removed_row_once() {
        let store = test_store().await;
        let user = seed_user(&store, "radu", Role::Editor).await;
        let doc = store
            .create_document(
                ContentKind::Decizie,
                DocumentInput {
                    title: "Aprobare buget".to_string(),
                    body: "...".to_string(),
                    reference_number: Some("24/2026".to_string()),
                },
                user.id,
            )
            .await
            .unwrap();

        assert!(
            store
                .delete_document(ContentKind::Anunt, doc.id)
                .await
                .unwrap()
                .is_none()
        );

        let removed = store
            .delete_document(ContentKind::Decizie, doc.id)
            .await
            .unwrap();
        assert_eq!(removed.map(|d| d.title), Some("Aprobare buget".to_string()));

        assert!(
            store
                .delete_document(ContentKind::Decizie, doc.id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
