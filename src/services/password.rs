//! Argon2id hashing and verification.
//!
//! Both operations are CPU-heavy and run on the blocking pool so they never
//! stall the async runtime.

use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::Arc;
use tokio::task;

use crate::config::SecurityConfig;

#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
    /// Verified against when the username is unknown, so that branch costs
    /// the same as a wrong password.
    dummy_hash: Arc<str>,
}

impl CredentialHasher {
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        let params = Params::new(
            config.argon2_memory_cost_kib,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

        let dummy_plaintext = crate::services::csrf::generate_token();
        let dummy_hash = hash_with(&params, &dummy_plaintext)?;

        Ok(Self {
            params,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Produces a self-contained salted PHC string.
    pub async fn hash(&self, plaintext: &str) -> Result<String> {
        let params = self.params.clone();
        let password = plaintext.to_string();

        task::spawn_blocking(move || hash_with(&params, &password))
            .await
            .context("Password hashing task panicked")?
    }

    /// Returns false for a wrong password and for a malformed hash alike.
    pub async fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let password = plaintext.to_string();
        let hash = hash.to_string();

        match task::spawn_blocking(move || verify_sync(&password, &hash)).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!(error = %e, "Password verification task panicked");
                false
            }
        }
    }

    /// Spends one verification on a throwaway hash. Always false.
    pub async fn verify_dummy(&self, plaintext: &str) -> bool {
        let dummy = self.dummy_hash.clone();
        let _ = self.verify(plaintext, &dummy).await;
        false
    }
}

fn hash_with(params: &Params, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

fn verify_sync(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("Stored password hash is not a valid PHC string");
        return false;
    };

    // Cost parameters come from the PHC string itself.
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
