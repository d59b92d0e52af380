use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_sessions::{
    Expiry, Session, SessionManagerLayer,
    cookie::{Key, SameSite},
};
use tower_sessions_sqlx_store::SqliteStore;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::constants::routes;
use crate::db::Store;
use crate::services::{
    AuditLogger, AuthService, CredentialHasher, DocumentService, SeaOrmAuthService,
    SessionManager,
};

mod audit_log;
pub mod auth;
mod documents;
mod error;
pub mod guard;
mod observability;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub store: Store,

    pub session_store: SqliteStore,

    pub session_key: Key,

    pub auth: Arc<dyn AuthService>,

    pub audit: AuditLogger,

    pub documents: DocumentService,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Request-scoped view of the caller's session.
    #[must_use]
    pub fn sessions(&self, session: Session) -> SessionManager {
        SessionManager::new(session, &self.config.session)
    }
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    config.validate()?;

    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let session_store = SqliteStore::new(store.conn.get_sqlite_connection_pool().clone());
    session_store
        .migrate()
        .await
        .context("Failed to migrate session store")?;

    let session_key = if config.session.secret.is_empty() {
        tracing::warn!(
            "session.secret is not set; using a random signing key, sessions will not survive a restart"
        );
        Key::generate()
    } else {
        Key::try_from(config.session.secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid session secret: {e}"))?
    };

    let hasher = CredentialHasher::new(&config.security)?;
    let audit = AuditLogger::new(store.clone());
    let auth: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
        store.clone(),
        hasher,
        audit.clone(),
        &config.security,
    ));
    let documents = DocumentService::new(store.clone(), audit.clone());

    Ok(Arc::new(AppState {
        config: Arc::new(config),
        store,
        session_store,
        session_key,
        auth,
        audit,
        documents,
        prometheus_handle,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let session_config = &state.config.session;
    let session_layer = SessionManagerLayer::new(state.session_store.clone())
        .with_name(session_config.cookie_name.clone())
        .with_secure(state.config.server.secure_cookies)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnSessionEnd)
        .with_signed(state.session_key.clone());

    let admin_routes = create_admin_router(state.clone());

    Router::new()
        .route(routes::LOGIN, get(auth::login_page).post(auth::login))
        .route(routes::LOGOUT, post(auth::logout))
        .merge(admin_routes)
        .layer(session_layer)
        .with_state(state)
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(TraceLayer::new_for_http())
}

fn create_admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let editor_routes = Router::new()
        .route("/admin/documents/{kind}", post(documents::create_document))
        .route(
            "/admin/documents/{kind}/{id}",
            post(documents::update_document),
        )
        .route("/admin/delete", post(documents::delete_document))
        .route_layer(middleware::from_fn(guard::editors_only));

    let admin_only_routes = Router::new()
        .route("/admin/audit-log", get(audit_log::get_audit_log))
        .route("/admin/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(guard::admin_only));

    Router::new()
        .route("/admin", get(audit_log::dashboard))
        .route("/admin/password", post(auth::change_password))
        .route("/admin/documents/{kind}", get(documents::list_documents))
        .merge(editor_routes)
        .merge(admin_only_routes)
        .route_layer(middleware::from_fn_with_state(
            state,
            guard::require_authenticated,
        ))
}
