pub mod audit;
pub use audit::{AuditEntryDto, AuditError, AuditLogger, AuditPage, AuditStats};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{
    AuthError, AuthService, LoginAttempt, LoginOutcome, LoginRejection, PasswordChange,
};
pub use auth_service_impl::SeaOrmAuthService;

pub mod csrf;
pub use csrf::CsrfService;

pub mod documents;
pub use documents::{ContentError, DocumentDto, DocumentService};

pub mod password;
pub use password::CredentialHasher;

pub mod session;
pub use session::{SessionManager, SessionUser};
