//! Account provisioning commands

use crate::config::Config;
use crate::db::{NewUser, Store};
use crate::domain::Role;
use crate::services::CredentialHasher;

async fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::with_pool_options(&config.general.database_path, 1, 1).await
}

pub async fn cmd_create_user(
    config: &Config,
    username: &str,
    full_name: &str,
    role: Role,
    password: &str,
) -> anyhow::Result<()> {
    let username = username.trim();
    if username.is_empty() {
        anyhow::bail!("Username cannot be empty");
    }

    let min = config.security.min_password_length;
    if password.chars().count() < min {
        anyhow::bail!("Password must be at least {min} characters");
    }

    let store = open_store(config).await?;
    if store.get_user_by_username(username).await?.is_some() {
        anyhow::bail!("User '{username}' already exists");
    }

    let hasher = CredentialHasher::new(&config.security)?;
    let password_hash = hasher.hash(password).await?;

    let user = store
        .create_user(NewUser {
            username: username.to_string(),
            full_name: full_name.trim().to_string(),
            role,
            password_hash,
        })
        .await?;

    println!("Created {} '{}' (ID: {})", user.role, user.username, user.id);
    Ok(())
}

pub async fn cmd_set_active(config: &Config, username: &str, active: bool) -> anyhow::Result<()> {
    let store = open_store(config).await?;

    if !store.set_user_active(username, active).await? {
        anyhow::bail!("User '{username}' not found");
    }

    let state = if active { "enabled" } else { "disabled" };
    println!("Account '{username}' {state}");
    Ok(())
}

pub async fn cmd_unlock(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = open_store(config).await?;

    if !store.clear_user_lockout(username).await? {
        anyhow::bail!("User '{username}' not found");
    }

    println!("Account '{username}' unlocked");
    Ok(())
}
