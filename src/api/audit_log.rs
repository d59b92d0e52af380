use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::guard::CurrentUser;
use super::validation::{
    clamp_page_size, non_empty, parse_day, parse_day_end, validate_audit_action, validate_page,
    validate_user_id,
};
use super::{ApiError, ApiResponse, AppState, DashboardResponse};
use crate::db::AuditFilter;
use crate::services::audit::to_csv;

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub user: Option<String>,
    pub action: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub export: Option<String>,
}

impl AuditLogQuery {
    /// `date_to` names the last day included.
    fn filter(&self) -> Result<AuditFilter, ApiError> {
        Ok(AuditFilter {
            user_id: non_empty(self.user.as_deref())
                .map(validate_user_id)
                .transpose()?,
            action: non_empty(self.action.as_deref())
                .map(validate_audit_action)
                .transpose()?,
            from: non_empty(self.date_from.as_deref())
                .map(|d| parse_day(d, "date_from"))
                .transpose()?,
            until: non_empty(self.date_to.as_deref())
                .map(|d| parse_day_end(d, "date_to"))
                .transpose()?,
        })
    }
}

/// GET /admin/audit-log
pub async fn get_audit_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Response, ApiError> {
    let filter = query.filter()?;

    match non_empty(query.export.as_deref()) {
        None => {}
        Some("csv") => {
            let entries = state.audit.export(&filter).await?;
            let filename = format!(
                "attachment; filename=\"audit-log-{}.csv\"",
                Utc::now().format("%Y%m%d")
            );
            return Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, filename),
                ],
                to_csv(&entries),
            )
                .into_response());
        }
        Some(other) => {
            return Err(ApiError::validation(format!(
                "Unsupported export format: {other}"
            )));
        }
    }

    let audit_config = &state.config.audit;
    let page_size = clamp_page_size(
        query.page_size,
        audit_config.default_page_size,
        audit_config.max_page_size,
    );
    let page = validate_page(query.page, page_size)?;
    let page = state.audit.query(&filter, page, page_size).await?;

    Ok(Json(ApiResponse::success(page)).into_response())
}

/// GET /admin
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<DashboardResponse>>, ApiError> {
    let csrf_token = state.sessions(session).csrf_token().await?;
    let stats = state.audit.stats().await?;

    Ok(Json(ApiResponse::success(DashboardResponse {
        user,
        csrf_token,
        stats,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AuditAction;

    #[test]
    fn test_filter_from_query() {
        let query = AuditLogQuery {
            user: Some("3".to_string()),
            action: Some("login_failed".to_string()),
            date_from: Some("2026-10-01".to_string()),
            date_to: Some("2026-10-15".to_string()),
            ..AuditLogQuery::default()
        };

        let filter = query.filter().unwrap();
        assert_eq!(filter.user_id, Some(3));
        assert_eq!(filter.action, Some(AuditAction::LoginFailed));
        assert_eq!(
            filter.from.unwrap().to_rfc3339(),
            "2026-10-01T00:00:00+00:00"
        );
        assert_eq!(
            filter.until.unwrap().to_rfc3339(),
            "2026-10-16T00:00:00+00:00"
        );
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let query = AuditLogQuery {
            user: Some(String::new()),
            action: Some("  ".to_string()),
            ..AuditLogQuery::default()
        };
        assert_eq!(query.filter().unwrap(), AuditFilter::default());
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let query = AuditLogQuery {
            action: Some("drop_table".to_string()),
            ..AuditLogQuery::default()
        };
        assert!(query.filter().is_err());
    }

    #[test]
    fn test_out_of_range_date_is_rejected() {
        let query = AuditLogQuery {
            date_to: Some("+262142-12-31".to_string()),
            ..AuditLogQuery::default()
        };
        assert!(matches!(query.filter(), Err(ApiError::ValidationError(_))));
    }
}
