//! Session store housekeeping

use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_prune_sessions(config: &Config) -> anyhow::Result<()> {
    let store = Store::with_pool_options(&config.general.database_path, 1, 1).await?;
    let session_store = SqliteStore::new(store.conn.get_sqlite_connection_pool().clone());
    session_store.migrate().await?;

    session_store.delete_expired().await?;

    println!("Expired sessions removed");
    Ok(())
}
