use sea_orm_migration::prelude::*;

mod m20260301_add_users;
mod m20260301_add_audit_log;
mod m20260302_add_documents;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_add_users::Migration),
            Box::new(m20260301_add_audit_log::Migration),
            Box::new(m20260302_add_documents::Migration),
        ]
    }
}
