use crate::domain::ContentKind;
use crate::entities::{documents, prelude::*};
use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInput {
    pub title: String,
    pub body: String,
    pub reference_number: Option<String>,
}

pub struct DocumentRepository {
    conn: DatabaseConnection,
}

impl DocumentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self, kind: ContentKind) -> Result<Vec<documents::Model>> {
        Documents::find()
            .filter(documents::Column::Kind.eq(kind.as_str()))
            .order_by_desc(documents::Column::CreatedAt)
            .order_by_desc(documents::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list documents")
    }

    pub async fn get(&self, kind: ContentKind, id: i32) -> Result<Option<documents::Model>> {
        Documents::find_by_id(id)
            .filter(documents::Column::Kind.eq(kind.as_str()))
            .one(&self.conn)
            .await
            .context("Failed to query document")
    }

    pub async fn create(
        &self,
        kind: ContentKind,
        input: DocumentInput,
        created_by: i32,
    ) -> Result<documents::Model> {
        let now = Utc::now();
        let active = documents::ActiveModel {
            kind: Set(kind.as_str().to_string()),
            title: Set(input.title),
            body: Set(input.body),
            reference_number: Set(input.reference_number),
            created_by: Set(Some(created_by)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert document")
    }

    /// Returns `None` when the document does not exist.
    pub async fn update(
        &self,
        kind: ContentKind,
        id: i32,
        input: DocumentInput,
    ) -> Result<Option<documents::Model>> {
        let Some(existing) = self.get(kind, id).await? else {
            return Ok(None);
        };

        let mut active: documents::ActiveModel = existing.into();
        active.title = Set(input.title);
        active.body = Set(input.body);
        active.reference_number = Set(input.reference_number);
        active.updated_at = Set(Utc::now());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update document")?;

        Ok(Some(model))
    }

    /// Returns the removed row, or `None` when nothing was deleted.
    pub async fn delete(&self, kind: ContentKind, id: i32) -> Result<Option<documents::Model>> {
        let Some(existing) = self.get(kind, id).await? else {
            return Ok(None);
        };

        let result = existing
            .clone()
            .delete(&self.conn)
            .await
            .context("Failed to delete document")?;

        Ok((result.rows_affected > 0).then_some(existing))
    }
}
