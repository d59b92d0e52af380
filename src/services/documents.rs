//! Published content managed from the admin panel.
//!
//! Every successful mutation is followed by one audit entry carrying the
//! document title. Missing rows are reported without touching the trail.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::constants::limits;
use crate::db::{Document, DocumentInput, NewAuditEntry, Store};
use crate::domain::{AuditAction, ContentKind, EntityType};
use crate::services::audit::AuditLogger;
use crate::services::session::SessionUser;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for ContentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentDto {
    pub id: i32,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub reference_number: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Document> for DocumentDto {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            kind: doc.kind,
            title: doc.title,
            body: doc.body,
            reference_number: doc.reference_number,
            created_by: doc.created_by,
            created_at: doc.created_at.to_rfc3339(),
            updated_at: doc.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Clone)]
pub struct DocumentService {
    store: Store,
    audit: AuditLogger,
}

impl DocumentService {
    #[must_use]
    pub const fn new(store: Store, audit: AuditLogger) -> Self {
        Self { store, audit }
    }

    pub async fn list(&self, kind: ContentKind) -> Result<Vec<DocumentDto>, ContentError> {
        let docs = self.store.list_documents(kind).await?;
        Ok(docs.into_iter().map(DocumentDto::from).collect())
    }

    pub async fn create(
        &self,
        actor: &SessionUser,
        kind: ContentKind,
        input: DocumentInput,
        ip_address: Option<String>,
    ) -> Result<DocumentDto, ContentError> {
        let input = normalize(input)?;
        let doc = self.store.create_document(kind, input, actor.id).await?;

        self.record(AuditAction::Create(kind), actor, &doc, ip_address)
            .await;
        Ok(doc.into())
    }

    pub async fn update(
        &self,
        actor: &SessionUser,
        kind: ContentKind,
        id: i32,
        input: DocumentInput,
        ip_address: Option<String>,
    ) -> Result<DocumentDto, ContentError> {
        let input = normalize(input)?;
        let doc = self
            .store
            .update_document(kind, id, input)
            .await?
            .ok_or_else(|| not_found(kind, id))?;

        self.record(AuditAction::Update(kind), actor, &doc, ip_address)
            .await;
        Ok(doc.into())
    }

    /// Deleting a row that is already gone is `NotFound` and leaves the
    /// audit trail untouched.
    pub async fn delete(
        &self,
        actor: &SessionUser,
        kind: ContentKind,
        id: i32,
        ip_address: Option<String>,
    ) -> Result<DocumentDto, ContentError> {
        let doc = self
            .store
            .delete_document(kind, id)
            .await?
            .ok_or_else(|| not_found(kind, id))?;

        self.record(AuditAction::Delete(kind), actor, &doc, ip_address)
            .await;
        Ok(doc.into())
    }

    async fn record(
        &self,
        action: AuditAction,
        actor: &SessionUser,
        doc: &Document,
        ip_address: Option<String>,
    ) {
        let Ok(kind) = doc.kind.parse::<ContentKind>() else {
            tracing::error!(id = doc.id, kind = %doc.kind, "Document has an unknown kind");
            return;
        };

        self.audit
            .record(
                NewAuditEntry::new(action, EntityType::Content(kind))
                    .actor(Some(actor.id))
                    .entity(i64::from(doc.id))
                    .details(json!({ "titlu": doc.title }))
                    .ip(ip_address),
            )
            .await;
    }
}

fn not_found(kind: ContentKind, id: i32) -> ContentError {
    ContentError::NotFound(format!("{kind} {id}"))
}

fn normalize(input: DocumentInput) -> Result<DocumentInput, ContentError> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(ContentError::Validation("Title cannot be empty".to_string()));
    }
    if title.chars().count() > limits::MAX_TITLE_LEN {
        return Err(ContentError::Validation(format!(
            "Title cannot exceed {} characters",
            limits::MAX_TITLE_LEN
        )));
    }

    let reference_number = input
        .reference_number
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    Ok(DocumentInput {
        title,
        body: input.body,
        reference_number,
    })
}
