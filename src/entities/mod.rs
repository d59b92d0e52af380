pub mod prelude;

pub mod audit_log;
pub mod documents;
pub mod users;
