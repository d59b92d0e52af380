mod sessions;
mod users;

pub use sessions::cmd_prune_sessions;
pub use users::{cmd_create_user, cmd_set_active, cmd_unlock};
