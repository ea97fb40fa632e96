use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{activities, media, saved_views};
use crate::models::catalog::{
    Agent, MediaDeleted, MediaEntry, MediaInput, MediaPage, Tag, TagWithCount,
};
use crate::models::filters::MediaQuery;

pub mod migrator;
pub mod repositories;

pub use crate::entities::activities::Model as Activity;
pub use crate::entities::saved_views::Model as SavedView;
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn media_repo(&self) -> repositories::media::MediaRepository {
        repositories::media::MediaRepository::new(self.conn.clone())
    }

    fn agent_repo(&self) -> repositories::agent::AgentRepository {
        repositories::agent::AgentRepository::new(self.conn.clone())
    }

    fn tag_repo(&self) -> repositories::tag::TagRepository {
        repositories::tag::TagRepository::new(self.conn.clone())
    }

    fn saved_view_repo(&self) -> repositories::saved_view::SavedViewRepository {
        repositories::saved_view::SavedViewRepository::new(self.conn.clone())
    }

    fn activity_repo(&self) -> repositories::activity::ActivityRepository {
        repositories::activity::ActivityRepository::new(self.conn.clone())
    }

    // ========== Media ==========

    pub async fn list_media(&self, query: &MediaQuery) -> Result<MediaPage> {
        self.media_repo().list(query).await
    }

    pub async fn get_media(&self, id: i32) -> Result<Option<MediaEntry>> {
        self.media_repo().get(id).await
    }

    pub async fn media_for_agent(&self, agent_id: i32) -> Result<Vec<MediaEntry>> {
        self.media_repo().list_for_agent(agent_id).await
    }

    /// Create an entry and record its first engagement activity.
    pub async fn create_media(&self, input: &MediaInput) -> Result<MediaEntry> {
        let now = chrono::Utc::now().to_rfc3339();
        let entry = self.media_repo().create(input, &now).await?;

        self.activity_repo()
            .append(
                entry.id,
                entry.media_type.as_str(),
                entry.status.as_str(),
                entry.score,
                &now,
            )
            .await?;

        Ok(entry)
    }

    /// Replace an entry. Appends an activity row when status or score
    /// changed and prunes agents/tags the edit detached.
    pub async fn update_media(&self, id: i32, input: &MediaInput) -> Result<Option<MediaEntry>> {
        let now = chrono::Utc::now().to_rfc3339();
        let Some(outcome) = self.media_repo().update(id, input, &now).await? else {
            return Ok(None);
        };

        if outcome.engagement_changed {
            self.activity_repo()
                .append(
                    outcome.entry.id,
                    outcome.entry.media_type.as_str(),
                    outcome.entry.status.as_str(),
                    outcome.entry.score,
                    &now,
                )
                .await?;
        }

        // Cleanup runs after the save has committed.
        self.agent_repo()
            .delete_orphans(&outcome.removed_agents)
            .await?;
        self.tag_repo().delete_orphans(&outcome.removed_tags).await?;

        Ok(Some(outcome.entry))
    }

    /// Delete an entry and prune agents/tags it was the last user of.
    /// Returns what was removed so the caller can delete the cover file.
    pub async fn delete_media(&self, id: i32) -> Result<Option<MediaDeleted>> {
        let Some(deleted) = self.media_repo().delete(id).await? else {
            return Ok(None);
        };

        self.agent_repo().delete_orphans(&deleted.agents).await?;
        self.tag_repo().delete_orphans(&deleted.tags).await?;

        Ok(Some(deleted))
    }

    pub async fn set_media_cover(&self, id: i32, cover: Option<&str>) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.media_repo().set_cover(id, cover, &now).await
    }

    pub async fn list_review_sources(&self) -> Result<Vec<(i32, String)>> {
        self.media_repo().list_review_sources().await
    }

    pub async fn update_review_html(&self, id: i32, html: &str) -> Result<()> {
        self.media_repo().update_review_html(id, html).await
    }

    pub async fn media_count(&self) -> Result<u64> {
        self.media_repo().count().await
    }

    // ========== Agents ==========

    pub async fn get_agent(&self, id: i32) -> Result<Option<Agent>> {
        self.agent_repo().get(id).await
    }

    pub async fn search_agents(&self, query: &str, limit: u64) -> Result<Vec<Agent>> {
        self.agent_repo().search(query, limit).await
    }

    pub async fn agent_count(&self) -> Result<u64> {
        self.agent_repo().count().await
    }

    // ========== Tags ==========

    pub async fn list_tags(&self) -> Result<Vec<TagWithCount>> {
        self.tag_repo().list_with_counts().await
    }

    pub async fn get_tag(&self, id: i32) -> Result<Option<Tag>> {
        self.tag_repo().get(id).await
    }

    pub async fn tag_count(&self) -> Result<u64> {
        self.tag_repo().count().await
    }

    // ========== Saved views ==========

    pub async fn list_saved_views(&self, user_id: i32) -> Result<Vec<saved_views::Model>> {
        self.saved_view_repo().list_for_user(user_id).await
    }

    pub async fn find_saved_view_by_name(
        &self,
        user_id: i32,
        name: &str,
    ) -> Result<Option<saved_views::Model>> {
        self.saved_view_repo().find_by_name(user_id, name).await
    }

    pub async fn create_saved_view(
        &self,
        user_id: i32,
        name: &str,
        query_string: &str,
        view_mode: &str,
    ) -> Result<saved_views::Model> {
        let now = chrono::Utc::now().to_rfc3339();
        self.saved_view_repo()
            .create(user_id, name, query_string, view_mode, &now)
            .await
    }

    pub async fn delete_saved_view(&self, user_id: i32, id: i32) -> Result<bool> {
        self.saved_view_repo().delete(user_id, id).await
    }

    // ========== Activity ==========

    pub async fn media_activity(&self, media_id: i32) -> Result<Vec<activities::Model>> {
        self.activity_repo().list_for_media(media_id).await
    }

    pub async fn recent_activity(
        &self,
        limit: u64,
    ) -> Result<Vec<(activities::Model, Option<media::Model>)>> {
        self.activity_repo().recent(limit).await
    }

    // ========== Users ==========

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(username, password).await
    }

    pub async fn update_user_password(
        &self,
        username: &str,
        new_password: &str,
        config: Option<&crate::config::SecurityConfig>,
    ) -> Result<()> {
        self.user_repo()
            .update_password(username, new_password, config)
            .await
    }

    pub async fn update_user_profile(
        &self,
        username: &str,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<User> {
        self.user_repo()
            .update_profile(username, display_name, email)
            .await
    }

    pub async fn verify_api_key(&self, api_key: &str) -> Result<Option<User>> {
        self.user_repo().verify_api_key(api_key).await
    }

    pub async fn get_user_api_key(&self, username: &str) -> Result<Option<String>> {
        self.user_repo().get_api_key(username).await
    }

    pub async fn regenerate_user_api_key(&self, username: &str) -> Result<String> {
        self.user_repo().regenerate_api_key(username).await
    }
}
