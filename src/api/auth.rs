use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;
use tower_sessions::Session;

use super::guard::{ClientIp, CurrentUser};
use super::validation::{non_empty, safe_next, validate_login_fields};
use super::{ApiError, ApiResponse, AppState, ChangePasswordForm, CsrfForm, MessageResponse};
use crate::constants::{messages, routes};
use crate::services::{LoginAttempt, LoginOutcome, LoginRejection, PasswordChange, SessionManager};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    pub next: Option<String>,
    pub logout: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub remember: Option<String>,
    pub csrf_token: Option<String>,
    pub next: Option<String>,
}

// ============================================================================
// Rendering
// ============================================================================

enum Notice<'a> {
    Error(&'a str),
    Info(&'a str),
}

fn render_login_page(csrf_token: &str, next: Option<&str>, notice: Option<Notice<'_>>) -> String {
    use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

    let mut page = String::from(
        "<!DOCTYPE html>\n<html lang=\"ro\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Autentificare - Administrare</title>\n</head>\n<body>\n<main>\n<h1>Autentificare</h1>\n",
    );

    match notice {
        Some(Notice::Error(msg)) => {
            let _ = writeln!(page, "<p class=\"alert alert-error\">{}</p>", text(msg));
        }
        Some(Notice::Info(msg)) => {
            let _ = writeln!(page, "<p class=\"alert alert-info\">{}</p>", text(msg));
        }
        None => {}
    }

    let _ = writeln!(
        page,
        "<form method=\"post\" action=\"{}\">",
        attr(routes::LOGIN)
    );
    let _ = writeln!(
        page,
        "<input type=\"hidden\" name=\"csrf_token\" value=\"{}\">",
        attr(csrf_token)
    );
    if let Some(next) = next {
        let _ = writeln!(
            page,
            "<input type=\"hidden\" name=\"next\" value=\"{}\">",
            attr(next)
        );
    }
    page.push_str(
        "<label>Utilizator <input type=\"text\" name=\"username\" autocomplete=\"username\" required></label>\n\
         <label>Parola <input type=\"password\" name=\"password\" autocomplete=\"current-password\" required></label>\n\
         <label><input type=\"checkbox\" name=\"remember\" value=\"1\"> Tine-ma minte</label>\n\
         <button type=\"submit\">Intra</button>\n</form>\n</main>\n</body>\n</html>\n",
    );

    page
}

async fn login_page_response(
    sessions: &SessionManager,
    status: StatusCode,
    next: Option<&str>,
    notice: Option<Notice<'_>>,
) -> Result<Response, ApiError> {
    let csrf_token = sessions.csrf_token().await?;
    Ok((status, Html(render_login_page(&csrf_token, next, notice))).into_response())
}

fn rejection_status(rejection: LoginRejection) -> StatusCode {
    match rejection {
        LoginRejection::InvalidCsrf => StatusCode::FORBIDDEN,
        LoginRejection::BadCredentials { .. }
        | LoginRejection::AccountDisabled
        | LoginRejection::Locked { .. }
        | LoginRejection::LockedJustNow { .. } => StatusCode::UNAUTHORIZED,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /login
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<LoginPageQuery>,
) -> Result<Response, ApiError> {
    let sessions = state.sessions(session);
    let next = non_empty(query.next.as_deref());

    if sessions.current().await?.is_some() {
        return Ok(Redirect::to(safe_next(next)).into_response());
    }

    let notice = query
        .logout
        .is_some()
        .then_some(Notice::Info(messages::LOGGED_OUT));

    login_page_response(&sessions, StatusCode::OK, next, notice).await
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    ClientIp(ip_address): ClientIp,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let sessions = state.sessions(session);
    let next = non_empty(form.next.as_deref());

    // CSRF comes before field validation; the service rejects a bad token first.
    let token_ok = sessions.validate_csrf(form.csrf_token.as_deref()).await;

    let (username, password) = match validate_login_fields(&form.username, &form.password) {
        Ok(fields) => fields,
        Err(ApiError::ValidationError(_)) if !token_ok => (form.username.as_str(), ""),
        Err(ApiError::ValidationError(msg)) => {
            return login_page_response(
                &sessions,
                StatusCode::BAD_REQUEST,
                next,
                Some(Notice::Error(&msg)),
            )
            .await;
        }
        Err(e) => return Err(e),
    };

    let attempt = LoginAttempt {
        username: username.to_string(),
        password: password.to_string(),
        remember_me: form.remember.is_some(),
        csrf_token: form.csrf_token,
        ip_address,
    };

    match state.auth.login(&sessions, attempt).await? {
        LoginOutcome::Authenticated(_) => Ok(Redirect::to(safe_next(next)).into_response()),
        LoginOutcome::Rejected(rejection) => {
            let message = rejection.message();
            login_page_response(
                &sessions,
                rejection_status(rejection),
                next,
                Some(Notice::Error(&message)),
            )
            .await
        }
    }
}

/// POST /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: Session,
    ClientIp(ip_address): ClientIp,
    Form(form): Form<CsrfForm>,
) -> Result<Response, ApiError> {
    let sessions = state.sessions(session);

    if !sessions.validate_csrf(form.csrf_token.as_deref()).await {
        tracing::warn!(ip = ?ip_address, "Logout rejected: CSRF token mismatch");
        return Err(ApiError::CsrfInvalid);
    }

    state.auth.logout(&sessions, ip_address).await?;

    Ok(Redirect::to(&format!("{}?logout=1", routes::LOGIN)).into_response())
}

/// POST /admin/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    ClientIp(ip_address): ClientIp,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let sessions = state.sessions(session);
    if !sessions.validate_csrf(form.csrf_token.as_deref()).await {
        tracing::warn!(user_id = user.id, "Password change rejected: CSRF token mismatch");
        return Err(ApiError::CsrfInvalid);
    }

    state
        .auth
        .change_password(
            &user,
            PasswordChange {
                current_password: form.current_password,
                new_password: form.new_password,
                confirm_password: form.confirm_password,
            },
            ip_address,
        )
        .await?;

    tracing::info!(username = %user.username, "Password changed");

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password updated successfully".to_string(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_page_escapes_interpolated_values() {
        let page = render_login_page(
            "abc123",
            Some("/admin\"><script>alert(1)</script>"),
            Some(Notice::Error("<b>nope</b>")),
        );
        assert!(page.contains("name=\"csrf_token\" value=\"abc123\""));
        assert!(!page.contains("<script>"));
        assert!(!page.contains("<b>nope</b>"));
        assert!(page.contains("&lt;b&gt;nope&lt;/b&gt;"));
    }

    #[test]
    fn test_logout_notice() {
        let page = render_login_page("t", None, Some(Notice::Info(messages::LOGGED_OUT)));
        assert!(page.contains(messages::LOGGED_OUT));
        assert!(!page.contains("name=\"next\""));
    }
}
