//! Database migrations for the emag_desk schema.
//!
//! Only compiled with the `migrate` feature.

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_schema;
mod m20250315_000001_create_saved_calculations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_schema::Migration),
            Box::new(m20250315_000001_create_saved_calculations::Migration),
        ]
    }

    fn migration_table_name() -> SeaRc<dyn Iden> {
        SeaRc::new(Alias::new("emag_desk_migrations"))
    }
}
