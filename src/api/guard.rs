//! Gate in front of every `/admin` route.
//!
//! `require_authenticated` runs first and resolves the session to a live
//! account; the role layers only read what it left in the request extensions.
//! Neither ever answers 401/403: anonymous visitors go to the login page and
//! insufficient roles go back to the dashboard.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, AppState};
use crate::constants::routes;
use crate::domain::Role;
use crate::services::SessionUser;

/// The authenticated actor, as confirmed against the user table for this
/// request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))
    }
}

/// Address recorded in the audit trail.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok());

        Ok(Self(resolve_client_ip(
            peer,
            forwarded,
            &state.config.server.trusted_proxy_ips,
        )))
    }
}

fn resolve_client_ip(
    peer: Option<IpAddr>,
    forwarded_for: Option<&str>,
    trusted_proxies: &[String],
) -> Option<String> {
    let peer = peer?;

    let from_proxy = trusted_proxies
        .iter()
        .any(|proxy| proxy.parse::<IpAddr>().is_ok_and(|ip| ip == peer));

    if from_proxy
        && let Some(first_hop) = forwarded_for
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .and_then(|hop| hop.parse::<IpAddr>().ok())
    {
        return Some(first_hop.to_string());
    }

    Some(peer.to_string())
}

fn login_redirect(request: &Request) -> Response {
    let target = request
        .uri()
        .path_and_query()
        .map_or(routes::DASHBOARD, |pq| pq.as_str());

    Redirect::to(&format!(
        "{}?next={}",
        routes::LOGIN,
        urlencoding::encode(target)
    ))
    .into_response()
}

pub async fn require_authenticated(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let sessions = state.sessions(session);

    let Some(session_user) = sessions.current().await? else {
        return Ok(login_redirect(&request));
    };

    // Role and active flag are re-read so that changes apply to live sessions.
    let Some(user) = state.store.get_user(session_user.id).await? else {
        sessions.destroy().await?;
        return Ok(login_redirect(&request));
    };

    if !user.is_active {
        tracing::info!(username = %user.username, "Ending session of disabled account");
        sessions.destroy().await?;
        return Ok(login_redirect(&request));
    }

    tracing::Span::current().record("user_id", user.id);
    request
        .extensions_mut()
        .insert(CurrentUser(SessionUser::from(&user)));

    Ok(next.run(request).await)
}

async fn require_role(allowed: &[Role], request: Request, next: Next) -> Response {
    let permitted = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|CurrentUser(user)| user.has_role(allowed));

    if !permitted {
        tracing::debug!(path = %request.uri().path(), "Insufficient role");
        return Redirect::to(routes::DASHBOARD).into_response();
    }

    next.run(request).await
}

pub async fn admin_only(request: Request, next: Next) -> Response {
    require_role(Role::ADMINS, request, next).await
}

pub async fn editors_only(request: Request, next: Next) -> Response {
    require_role(Role::CONTENT_EDITORS, request, next).await
}
