use axum::http::uri::PathAndQuery;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::ApiError;
use crate::constants::{limits, routes};
use crate::domain::{AuditAction, ContentKind};

pub fn validate_login_fields<'a>(
    username: &'a str,
    password: &'a str,
) -> Result<(&'a str, &'a str), ApiError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::validation("Username and password are required."));
    }

    if username.chars().count() > limits::MAX_USERNAME_LEN
        || password.chars().count() > limits::MAX_PASSWORD_LEN
    {
        return Err(ApiError::validation("Username or password is too long."));
    }

    Ok((username, password))
}

pub fn validate_content_kind(kind: &str) -> Result<ContentKind, ApiError> {
    kind.parse()
        .map_err(|_| ApiError::NotFound(format!("Unknown content type: {kind}")))
}

pub fn validate_document_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid document ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}

pub fn validate_audit_action(action: &str) -> Result<AuditAction, ApiError> {
    action
        .parse()
        .map_err(|_| ApiError::validation(format!("Unknown audit action: {action}")))
}

pub fn validate_user_id(user: &str) -> Result<i32, ApiError> {
    match user.trim().parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::validation(format!("Invalid user ID: {user}"))),
    }
}

/// Parses a `YYYY-MM-DD` form value as midnight UTC of that day. Signed and
/// five-digit years are refused.
pub fn parse_day(value: &str, field: &str) -> Result<DateTime<Utc>, ApiError> {
    let value = value.trim();
    let invalid = || ApiError::validation(format!("{field} must be a date (YYYY-MM-DD)"));

    if value.len() != 10 || !value.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(invalid)
}

/// Exclusive upper bound for a filter whose last included day is `value`.
pub fn parse_day_end(value: &str, field: &str) -> Result<DateTime<Utc>, ApiError> {
    parse_day(value, field)?
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| ApiError::validation(format!("{field} is out of range")))
}

/// 1-based page number whose row offset the database can represent.
pub fn validate_page(page: Option<u64>, page_size: u64) -> Result<u64, ApiError> {
    let page = page.unwrap_or(1).max(1);

    (page - 1)
        .checked_mul(page_size)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .map(|_| page)
        .ok_or_else(|| ApiError::validation(format!("Page {page} is out of range")))
}

pub const fn clamp_page_size(requested: Option<u64>, default: u64, max: u64) -> u64 {
    let size = match requested {
        Some(size) => size,
        None => default,
    };

    if size == 0 {
        1
    } else if size > max {
        max
    } else {
        size
    }
}

/// Post-login target: a local absolute path without control characters, or
/// the dashboard.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control)
                && path.parse::<PathAndQuery>().is_ok() =>
        {
            path
        }
        _ => routes::DASHBOARD,
    }
}

/// Treats empty query and form values as absent.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_login_fields() {
        assert_eq!(
            validate_login_fields("  irina ", "secret").unwrap(),
            ("irina", "secret")
        );
        assert!(validate_login_fields("", "secret").is_err());
        assert!(validate_login_fields("   ", "secret").is_err());
        assert!(validate_login_fields("irina", "").is_err());
        assert!(validate_login_fields(&"a".repeat(65), "secret").is_err());
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/admin/audit-log?page=2")), "/admin/audit-log?page=2");
        assert_eq!(safe_next(Some("//evil.example")), "/admin");
        assert_eq!(safe_next(Some("https://evil.example")), "/admin");
        assert_eq!(safe_next(Some("/\\evil.example")), "/admin");
        assert_eq!(safe_next(None), "/admin");
        assert_eq!(safe_next(Some("/\t/evil.example")), "/admin");
        assert_eq!(safe_next(Some("/\n/evil.example")), "/admin");
        assert_eq!(safe_next(Some("/admin\nx")), "/admin");
        assert_eq!(safe_next(Some("/admin\r\nSet-Cookie: x=1")), "/admin");
    }

    #[test]
    fn test_parse_day() {
        let day = parse_day("2026-03-01", "date_from").unwrap();
        assert_eq!(day.to_rfc3339(), "2026-03-01T00:00:00+00:00");
        assert!(parse_day("01.03.2026", "date_from").is_err());
        assert!(parse_day("2026-02-30", "date_to").is_err());
        assert!(parse_day("+262142-12-31", "date_to").is_err());
        assert!(parse_day("-0001-01-01", "date_from").is_err());
    }

    #[test]
    fn test_parse_day_end() {
        let end = parse_day_end("2026-03-01", "date_to").unwrap();
        assert_eq!(end.to_rfc3339(), "2026-03-02T00:00:00+00:00");
        assert!(parse_day_end("9999-12-31", "date_to").is_ok());
        assert!(parse_day_end("+262142-12-31", "date_to").is_err());
    }

    #[test]
    fn test_validate_page() {
        assert_eq!(validate_page(None, 50).unwrap(), 1);
        assert_eq!(validate_page(Some(0), 50).unwrap(), 1);
        assert_eq!(validate_page(Some(3), 50).unwrap(), 3);
        assert!(validate_page(Some(u64::MAX), 50).is_err());
        assert!(validate_page(Some(u64::MAX / 50), 50).is_err());
        assert!(validate_page(Some(1 << 40), 200).is_ok());
    }

    #[test]
    fn test_clamp_page_size() {
        assert_eq!(clamp_page_size(None, 50, 200), 50);
        assert_eq!(clamp_page_size(Some(0), 50, 200), 1);
        assert_eq!(clamp_page_size(Some(10_000), 50, 200), 200);
        assert_eq!(clamp_page_size(Some(20), 50, 200), 20);
    }

    #[test]
    fn test_validate_content_kind_and_ids() {
        assert_eq!(validate_content_kind("decizie").unwrap(), ContentKind::Decizie);
        assert!(validate_content_kind("poze").is_err());
        assert!(validate_document_id(24).is_ok());
        assert!(validate_document_id(0).is_err());
        assert!(validate_user_id("7").is_ok());
        assert!(validate_user_id("abc").is_err());
        assert!(validate_audit_action("delete_decizie").is_ok());
        assert!(validate_audit_action("drop_table").is_err());
    }
}
