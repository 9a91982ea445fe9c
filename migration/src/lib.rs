pub use sea_orm_migration::prelude::*;

mod m20250910_000001_create_roles;
mod m20250910_000002_create_users;
mod m20250911_000003_create_app_templates;
mod m20250911_000004_create_favorites;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250910_000001_create_roles::Migration),
            Box::new(m20250910_000002_create_users::Migration),
            Box::new(m20250911_000003_create_app_templates::Migration),
            Box::new(m20250911_000004_create_favorites::Migration),
        ]
    }
}
