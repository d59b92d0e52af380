use axum::{
    Form, Json,
    extract::{Path, State},
};
use std::sync::Arc;
use tower_sessions::Session;

use super::guard::{ClientIp, CurrentUser};
use super::validation::{validate_content_kind, validate_document_id};
use super::{ApiError, ApiResponse, AppState, DeleteForm, DocumentForm};
use crate::db::DocumentInput;
use crate::services::DocumentDto;

async fn check_csrf(
    state: &AppState,
    session: Session,
    token: Option<&str>,
    user_id: i32,
) -> Result<(), ApiError> {
    if state.sessions(session).validate_csrf(token).await {
        return Ok(());
    }

    tracing::warn!(user_id, "Content change rejected: CSRF token mismatch");
    Err(ApiError::CsrfInvalid)
}

fn input_from(form: DocumentForm) -> DocumentInput {
    DocumentInput {
        title: form.title,
        body: form.body,
        reference_number: form.reference_number,
    }
}

/// GET /admin/documents/{kind}
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<ApiResponse<Vec<DocumentDto>>>, ApiError> {
    let kind = validate_content_kind(&kind)?;
    let docs = state.documents.list(kind).await?;
    Ok(Json(ApiResponse::success(docs)))
}

/// POST /admin/documents/{kind}
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    ClientIp(ip_address): ClientIp,
    Path(kind): Path<String>,
    Form(form): Form<DocumentForm>,
) -> Result<Json<ApiResponse<DocumentDto>>, ApiError> {
    check_csrf(&state, session, form.csrf_token.as_deref(), user.id).await?;
    let kind = validate_content_kind(&kind)?;

    let doc = state
        .documents
        .create(&user, kind, input_from(form), ip_address)
        .await?;

    tracing::info!(username = %user.username, kind = %kind, id = doc.id, "Document created");
    Ok(Json(ApiResponse::success(doc)))
}

/// POST /admin/documents/{kind}/{id}
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    ClientIp(ip_address): ClientIp,
    Path((kind, id)): Path<(String, i32)>,
    Form(form): Form<DocumentForm>,
) -> Result<Json<ApiResponse<DocumentDto>>, ApiError> {
    check_csrf(&state, session, form.csrf_token.as_deref(), user.id).await?;
    let kind = validate_content_kind(&kind)?;
    let id = validate_document_id(id)?;

    let doc = state
        .documents
        .update(&user, kind, id, input_from(form), ip_address)
        .await?;

    tracing::info!(username = %user.username, kind = %kind, id, "Document updated");
    Ok(Json(ApiResponse::success(doc)))
}

/// POST /admin/delete
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    ClientIp(ip_address): ClientIp,
    Form(form): Form<DeleteForm>,
) -> Result<Json<ApiResponse<DocumentDto>>, ApiError> {
    check_csrf(&state, session, form.csrf_token.as_deref(), user.id).await?;
    let kind = validate_content_kind(&form.kind)?;
    let id = validate_document_id(form.id)?;

    let doc = state
        .documents
        .delete(&user, kind, id, ip_address)
        .await?;

    tracing::info!(username = %user.username, kind = %kind, id, "Document deleted");
    Ok(Json(ApiResponse::success(doc)))
}
