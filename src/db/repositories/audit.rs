use crate::domain::{AuditAction, EntityType};
use crate::entities::{audit_log, prelude::*};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set,
};

/// A row about to be appended to the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: Option<i32>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: Option<i64>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

impl NewAuditEntry {
    #[must_use]
    pub const fn new(action: AuditAction, entity_type: EntityType) -> Self {
        Self {
            user_id: None,
            action,
            entity_type,
            entity_id: None,
            details: None,
            ip_address: None,
        }
    }

    #[must_use]
    pub fn actor(mut self, user_id: Option<i32>) -> Self {
        self.user_id = user_id;
        self
    }

    #[must_use]
    pub fn entity(mut self, entity_id: i64) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    #[must_use]
    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub fn ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }
}

/// Independent optional filters, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub user_id: Option<i32>,
    pub action: Option<AuditAction>,
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
}

/// Which actions an aggregate counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMatch {
    Any,
    Exact(AuditAction),
    Prefix(&'static str),
}

/// Read and append access to `audit_log`. There is deliberately no update or
/// delete here; retention is handled outside this service.
pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn append(&self, entry: NewAuditEntry) -> Result<i64> {
        let active_model = audit_log::ActiveModel {
            user_id: Set(entry.user_id),
            action: Set(entry.action.as_str().to_string()),
            entity_type: Set(entry.entity_type.as_str().to_string()),
            entity_id: Set(entry.entity_id),
            details: Set(entry.details),
            ip_address: Set(entry.ip_address),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let result = AuditLog::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to append audit entry")?;

        Ok(result.last_insert_id)
    }

    /// Newest first, ties broken by insertion order. `page` is 1-based.
    pub async fn page(
        &self,
        filter: &AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<audit_log::Model>, u64)> {
        let paginator = Self::filtered(filter).paginate(&self.conn, page_size);
        let total = paginator
            .num_items()
            .await
            .context("Failed to count audit entries")?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .context("Failed to fetch audit page")?;

        Ok((items, total))
    }

    pub async fn all(&self, filter: &AuditFilter) -> Result<Vec<audit_log::Model>> {
        Self::filtered(filter)
            .all(&self.conn)
            .await
            .context("Failed to fetch audit entries")
    }

    pub async fn count_since(&self, since: DateTime<Utc>, action: ActionMatch) -> Result<u64> {
        let mut query = AuditLog::find().filter(audit_log::Column::CreatedAt.gte(since));

        query = match action {
            ActionMatch::Any => query,
            ActionMatch::Exact(action) => {
                query.filter(audit_log::Column::Action.eq(action.as_str()))
            }
            ActionMatch::Prefix(prefix) => {
                query.filter(audit_log::Column::Action.starts_with(prefix))
            }
        };

        query
            .count(&self.conn)
            .await
            .context("Failed to count audit entries")
    }

    fn filtered(filter: &AuditFilter) -> Select<AuditLog> {
        let mut condition = Condition::all();

        if let Some(user_id) = filter.user_id {
            condition = condition.add(audit_log::Column::UserId.eq(user_id));
        }

        if let Some(action) = filter.action {
            condition = condition.add(audit_log::Column::Action.eq(action.as_str()));
        }

        if let Some(from) = filter.from {
            condition = condition.add(audit_log::Column::CreatedAt.gte(from));
        }

        if let Some(until) = filter.until {
            condition = condition.add(audit_log::Column::CreatedAt.lt(until));
        }

        AuditLog::find()
            .filter(condition)
            .order_by_desc(audit_log::Column::CreatedAt)
            .order_by_desc(audit_log::Column::Id)
    }
}
