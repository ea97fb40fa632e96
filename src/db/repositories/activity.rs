use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entities::{activities, media, prelude::*};

pub struct ActivityRepository {
    conn: DatabaseConnection,
}

impl ActivityRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Append one history row. The media type is denormalized so history
    /// stays legible even after later edits.
    pub async fn append(
        &self,
        media_id: i32,
        media_kind: &str,
        status: &str,
        score: Option<i32>,
        now: &str,
    ) -> anyhow::Result<()> {
        activities::ActiveModel {
            media_id: Set(media_id),
            media_kind: Set(media_kind.to_string()),
            status: Set(status.to_string()),
            score: Set(score),
            recorded_at: Set(now.to_string()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        Ok(())
    }

    /// Newest-first history for one media entry.
    pub async fn list_for_media(&self, media_id: i32) -> anyhow::Result<Vec<activities::Model>> {
        Ok(Activities::find()
            .filter(activities::Column::MediaId.eq(media_id))
            .order_by_desc(activities::Column::RecordedAt)
            .order_by_desc(activities::Column::Id)
            .all(&self.conn)
            .await?)
    }

    /// Newest-first across the whole catalogue, with the media title when
    /// the entry still exists.
    pub async fn recent(
        &self,
        limit: u64,
    ) -> anyhow::Result<Vec<(activities::Model, Option<media::Model>)>> {
        Ok(Activities::find()
            .find_also_related(Media)
            .order_by_desc(activities::Column::RecordedAt)
            .order_by_desc(activities::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?)
    }
}
