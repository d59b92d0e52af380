pub use super::audit_log::Entity as AuditLog;
pub use super::documents::Entity as Documents;
pub use super::users::Entity as Users;
