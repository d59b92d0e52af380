//! Best-effort writer and read-only query side of the audit trail.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::fmt::Write;
use thiserror::Error;

use crate::db::{ActionMatch, AuditFilter, AuditLogRow, NewAuditEntry, Store};
use crate::domain::AuditAction;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AuditError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// One page of audit rows plus the total matching the filter.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntryDto>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntryDto {
    pub id: i64,
    pub user_id: Option<i32>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: String,
}

impl From<AuditLogRow> for AuditEntryDto {
    fn from(row: AuditLogRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            details: row.details,
            ip_address: row.ip_address,
            created_at: row.created_at.to_rfc3339(),
        }
    }
}

/// Dashboard aggregates over the last 24 hours, derived from the log itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    pub entries_24h: u64,
    pub failed_logins_24h: u64,
    pub creations_24h: u64,
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Store,
}

impl AuditLogger {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Appends one entry. Failures are reported on the operational channel
    /// and never reach the caller.
    pub async fn record(&self, entry: NewAuditEntry) {
        let action = entry.action;
        if let Err(e) = self.store.append_audit(entry).await {
            metrics::counter!("audit_write_failures_total").increment(1);
            tracing::error!(error = %e, action = %action, "Failed to write audit entry");
        }
    }

    pub async fn query(
        &self,
        filter: &AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<AuditPage, AuditError> {
        let page = page.max(1);
        let (rows, total) = self.store.get_audit_page(filter, page, page_size).await?;

        Ok(AuditPage {
            entries: rows.into_iter().map(AuditEntryDto::from).collect(),
            total,
            page,
            page_size,
        })
    }

    pub async fn export(&self, filter: &AuditFilter) -> Result<Vec<AuditEntryDto>, AuditError> {
        let rows = self.store.get_all_audit(filter).await?;
        Ok(rows.into_iter().map(AuditEntryDto::from).collect())
    }

    pub async fn stats(&self) -> Result<AuditStats, AuditError> {
        let since = Utc::now() - Duration::hours(24);

        Ok(AuditStats {
            entries_24h: self.store.count_audit_since(since, ActionMatch::Any).await?,
            failed_logins_24h: self
                .store
                .count_audit_since(since, ActionMatch::Exact(AuditAction::LoginFailed))
                .await?,
            creations_24h: self
                .store
                .count_audit_since(since, ActionMatch::Prefix(AuditAction::CREATE_PREFIX))
                .await?,
        })
    }
}

/// Renders entries as CSV with a header row.
#[must_use]
pub fn to_csv(entries: &[AuditEntryDto]) -> String {
    let mut csv =
        String::from("id,created_at,user_id,action,entity_type,entity_id,ip_address,details\n");

    for entry in entries {
        let details = entry
            .details
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},\"{}\"",
            entry.id,
            entry.created_at,
            entry.user_id.map(|id| id.to_string()).unwrap_or_default(),
            entry.action,
            entry.entity_type,
            entry.entity_id.map(|id| id.to_string()).unwrap_or_default(),
            entry.ip_address.as_deref().unwrap_or_default(),
            details.replace('"', "\"\"")
        );
    }

    csv
}
