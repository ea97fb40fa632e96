use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::info;

use crate::entities::{media_tags, prelude::*, tags};
use crate::models::catalog::{Tag, TagWithCount};

pub struct TagRepository {
    conn: DatabaseConnection,
}

impl TagRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: tags::Model) -> Tag {
        Tag {
            id: model.id,
            name: model.name,
        }
    }

    /// All tags sorted by name, with the number of media linked to each.
    pub async fn list_with_counts(&self) -> anyhow::Result<Vec<TagWithCount>> {
        let rows = Tags::find()
            .order_by_asc(tags::Column::Name)
            .all(&self.conn)
            .await?;

        let counts: Vec<(i32, i64)> = MediaTags::find()
            .select_only()
            .column(media_tags::Column::TagId)
            .column_as(media_tags::Column::MediaId.count(), "media_count")
            .group_by(media_tags::Column::TagId)
            .into_tuple()
            .all(&self.conn)
            .await?;
        let counts: HashMap<i32, i64> = counts.into_iter().collect();

        Ok(rows
            .into_iter()
            .map(|model| TagWithCount {
                media_count: counts.get(&model.id).copied().unwrap_or(0),
                id: model.id,
                name: model.name,
            })
            .collect())
    }

    pub async fn get(&self, id: i32) -> anyhow::Result<Option<Tag>> {
        let model = Tags::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(Self::map_model))
    }

    /// Find a tag by exact name, creating it when missing. Runs on any
    /// connection so media writes can reuse their transaction.
    pub async fn get_or_create_on<C: ConnectionTrait>(
        conn: &C,
        name: &str,
        now: &str,
    ) -> anyhow::Result<Tag> {
        if let Some(existing) = Tags::find()
            .filter(tags::Column::Name.eq(name))
            .one(conn)
            .await?
        {
            return Ok(Self::map_model(existing));
        }

        let inserted = tags::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(now.to_string()),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        Ok(Self::map_model(inserted))
    }

    /// Delete the given tags if they are no longer linked to any media.
    pub async fn delete_orphans(&self, tag_ids: &[i32]) -> anyhow::Result<u64> {
        let ids: Vec<i32> = tag_ids
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let still_linked: Vec<i32> = MediaTags::find()
            .select_only()
            .column(media_tags::Column::TagId)
            .filter(media_tags::Column::TagId.is_in(ids.clone()))
            .group_by(media_tags::Column::TagId)
            .into_tuple()
            .all(&self.conn)
            .await?;

        let linked: HashSet<i32> = still_linked.into_iter().collect();
        let orphans: Vec<i32> = ids.into_iter().filter(|id| !linked.contains(id)).collect();
        if orphans.is_empty() {
            return Ok(0);
        }

        let result = Tags::delete_many()
            .filter(tags::Column::Id.is_in(orphans))
            .exec(&self.conn)
            .await?;

        if result.rows_affected > 0 {
            info!("Removed {} orphaned tag(s)", result.rows_affected);
        }
        Ok(result.rows_affected)
    }

    pub async fn count(&self) -> anyhow::Result<u64> {
        Ok(Tags::find().count(&self.conn).await?)
    }
}
