use sea_orm_migration::prelude::*;

mod m20250612_initial;
mod m20250630_add_users;
mod m20250811_add_saved_views;
mod m20250902_add_activities;
mod m20251015_add_media_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250612_initial::Migration),
            Box::new(m20250630_add_users::Migration),
            Box::new(m20250811_add_saved_views::Migration),
            Box::new(m20250902_add_activities::Migration),
            Box::new(m20251015_add_media_indexes::Migration),
        ]
    }
}
