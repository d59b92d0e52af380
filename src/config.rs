use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable that points at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "PRIMARIA_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub session: SessionConfig,

    pub security: SecurityConfig,

    pub audit: AuditConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/primaria.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// Whether to set the Secure flag on session cookies.
    /// Default: true. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Reverse proxies allowed to report the client address via `X-Forwarded-For`.
    ///
    /// When empty, forwarded headers are ignored and the socket peer address
    /// is what lands in the audit log.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            secure_cookies: true,
            trusted_proxy_ips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,

    /// Lifetime of a regular session, measured from the last request.
    pub idle_timeout_minutes: i64,

    /// Absolute lifetime of a "remember me" session.
    pub remember_me_days: i64,

    /// Cookie signing key, at least 64 bytes. Empty means a random key per
    /// process, which logs everyone out on restart.
    pub secret: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "primaria_session".to_string(),
            idle_timeout_minutes: 60,
            remember_me_days: 30,
            secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Minimum length accepted when a user changes their password.
    pub min_password_length: usize,

    /// Login failure counting and lockout policy.
    pub auth_throttle: AuthThrottleConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            min_password_length: 8,
            auth_throttle: AuthThrottleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthThrottleConfig {
    /// Consecutive failed attempts that trigger a lockout.
    pub max_attempts: u32,

    /// Lockout duration once max attempts is reached.
    pub lockout_seconds: u64,

    /// Fixed delay added to every rejected credential check.
    pub failure_delay_ms: u64,
}

impl Default for AuthThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_seconds: 15 * 60,
            failure_delay_ms: 250,
        }
    }
}

impl AuthThrottleConfig {
    #[must_use]
    pub const fn lockout_minutes(&self) -> u64 {
        self.lockout_seconds.div_ceil(60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// How long entries are kept by the external housekeeping job.
    /// Informational only; nothing in this service deletes audit rows.
    pub retention_days: u32,

    pub default_page_size: u64,

    pub max_page_size: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: 365,
            default_page_size: 50,
            max_page_size: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "primaria".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(explicit);
            info!("Loading config from {CONFIG_PATH_ENV}: {}", path.display());
            return Self::load_from_path(&path);
        }

        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("primaria").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".primaria").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        let throttle = &self.security.auth_throttle;
        if throttle.max_attempts == 0 {
            anyhow::bail!("security.auth_throttle.max_attempts must be > 0");
        }
        if throttle.lockout_seconds == 0 {
            anyhow::bail!("security.auth_throttle.lockout_seconds must be > 0");
        }

        if !self.session.secret.is_empty() && self.session.secret.len() < 64 {
            anyhow::bail!("session.secret must be at least 64 bytes long");
        }

        if self.session.idle_timeout_minutes <= 0 || self.session.remember_me_days <= 0 {
            anyhow::bail!("session lifetimes must be positive");
        }

        if self.audit.default_page_size == 0
            || self.audit.default_page_size > self.audit.max_page_size
        {
            anyhow::bail!("audit.default_page_size must be between 1 and audit.max_page_size");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.security.auth_throttle.max_attempts, 5);
        assert_eq!(config.security.auth_throttle.lockout_seconds, 900);
        assert_eq!(config.security.auth_throttle.lockout_minutes(), 15);
        assert_eq!(config.audit.retention_days, 365);
        assert!(config.server.secure_cookies);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [security.auth_throttle]
            max_attempts = 3
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.security.auth_throttle.max_attempts, 3);
        assert_eq!(config.security.auth_throttle.lockout_seconds, 900);
        assert_eq!(config.session.cookie_name, "primaria_session");
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = Config::default();
        config.session.secret = "too-short".to_string();
        assert!(config.validate().is_err());

        config.session.secret = "x".repeat(64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = Config::default();
        config.security.auth_throttle.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
