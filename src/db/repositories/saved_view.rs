use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;

use crate::entities::{prelude::*, saved_views};

pub struct SavedViewRepository {
    conn: DatabaseConnection,
}

impl SavedViewRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_user(&self, user_id: i32) -> anyhow::Result<Vec<saved_views::Model>> {
        Ok(SavedViews::find()
            .filter(saved_views::Column::UserId.eq(user_id))
            .order_by_asc(saved_views::Column::Name)
            .all(&self.conn)
            .await?)
    }

    pub async fn find_by_name(
        &self,
        user_id: i32,
        name: &str,
    ) -> anyhow::Result<Option<saved_views::Model>> {
        Ok(SavedViews::find()
            .filter(saved_views::Column::UserId.eq(user_id))
            .filter(saved_views::Column::Name.eq(name))
            .one(&self.conn)
            .await?)
    }

    pub async fn create(
        &self,
        user_id: i32,
        name: &str,
        query_string: &str,
        view_mode: &str,
        now: &str,
    ) -> anyhow::Result<saved_views::Model> {
        let inserted = saved_views::ActiveModel {
            user_id: Set(user_id),
            name: Set(name.to_string()),
            query_string: Set(query_string.to_string()),
            view_mode: Set(view_mode.to_string()),
            created_at: Set(now.to_string()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        info!("Saved view '{}' for user {}", name, user_id);
        Ok(inserted)
    }

    /// Delete one of the user's views. Views of other users are invisible
    /// here, so a foreign id just reports not-found.
    pub async fn delete(&self, user_id: i32, id: i32) -> anyhow::Result<bool> {
        let result = SavedViews::delete_many()
            .filter(saved_views::Column::Id.eq(id))
            .filter(saved_views::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
