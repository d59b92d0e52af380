use sea_orm::entity::prelude::*;

/// Append-only trail of security and content events.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Null for anonymous events such as a login with an unknown username.
    pub user_id: Option<i32>,

    pub action: String,

    pub entity_type: String,

    pub entity_id: Option<i64>,

    pub details: Option<Json>,

    pub ip_address: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
