use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Compared case-sensitively at login.
    #[sea_orm(unique)]
    pub username: String,

    pub full_name: String,

    /// One of `admin`, `editor`, `viewer`.
    pub role: String,

    /// Argon2id PHC string. Never logged, never serialized.
    pub password_hash: String,

    pub failed_login_attempts: i32,

    pub lockout_until: Option<DateTimeUtc>,

    pub is_active: bool,

    pub last_login: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
