use crate::entities::media::Column;
use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// Covers the whitelisted sort columns and the most common filters.
const INDEXES: [(&str, Column); 4] = [
    ("idx-media-review-date", Column::ReviewDate),
    ("idx-media-created-at", Column::CreatedAt),
    ("idx-media-updated-at", Column::UpdatedAt),
    ("idx-media-status", Column::Status),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, column) in INDEXES {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(Media)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, _) in INDEXES {
            manager
                .drop_index(Index::drop().name(name).table(Media).to_owned())
                .await?;
        }

        Ok(())
    }
}
