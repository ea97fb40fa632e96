use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(SavedViews)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // One name per user.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-saved-views-user-name")
                    .table(SavedViews)
                    .col(crate::entities::saved_views::Column::UserId)
                    .col(crate::entities::saved_views::Column::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SavedViews).to_owned())
            .await?;

        Ok(())
    }
}
