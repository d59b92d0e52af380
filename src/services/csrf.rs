//! Per-session anti-forgery tokens.
//!
//! One active token per session, reusable across form renders, replaced
//! whenever a new authenticated session is created.

use subtle::ConstantTimeEq;
use tower_sessions::Session;

use crate::constants::session_keys;

/// Generate a random token (64 character hex string)
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// Compares without short-circuiting on the first differing byte.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

pub struct CsrfService;

impl CsrfService {
    /// Returns the session's current token, creating one if it has none.
    pub async fn issue(session: &Session) -> Result<String, tower_sessions::session::Error> {
        if let Some(token) = session
            .get::<String>(session_keys::CSRF_TOKEN)
            .await?
        {
            return Ok(token);
        }

        Self::regenerate(session).await
    }

    pub async fn regenerate(session: &Session) -> Result<String, tower_sessions::session::Error> {
        let token = generate_token();
        session.insert(session_keys::CSRF_TOKEN, &token).await?;
        Ok(token)
    }

    /// Exact match against the session-bound token. A missing token on either
    /// side, or a session read failure, is a mismatch.
    pub async fn validate(session: &Session, submitted: Option<&str>) -> bool {
        let Some(submitted) = submitted.filter(|t| !t.is_empty()) else {
            return false;
        };

        match session.get::<String>(session_keys::CSRF_TOKEN).await {
            Ok(Some(expected)) => constant_time_eq(expected.as_bytes(), submitted.as_bytes()),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read CSRF token from session");
                false
            }
        }
    }
}
