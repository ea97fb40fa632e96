use std::collections::HashSet;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::info;

use crate::entities::{agents, media_contributors, prelude::*};
use crate::models::catalog::Agent;

pub struct AgentRepository {
    conn: DatabaseConnection,
}

impl AgentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: agents::Model) -> Agent {
        Agent {
            id: model.id,
            name: model.name,
        }
    }

    pub async fn get(&self, id: i32) -> anyhow::Result<Option<Agent>> {
        let model = Agents::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(Self::map_model))
    }

    /// Case-insensitive substring search over agent names, for the
    /// contributor autocomplete.
    pub async fn search(&self, query: &str, limit: u64) -> anyhow::Result<Vec<Agent>> {
        let rows = Agents::find()
            .filter(agents::Column::Name.contains(query))
            .order_by_asc(agents::Column::Name)
            .limit(limit)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    /// Find an agent by exact name, creating it when missing. Runs on any
    /// connection so media writes can reuse their transaction.
    pub async fn get_or_create_on<C: ConnectionTrait>(
        conn: &C,
        name: &str,
        now: &str,
    ) -> anyhow::Result<Agent> {
        if let Some(existing) = Agents::find()
            .filter(agents::Column::Name.eq(name))
            .one(conn)
            .await?
        {
            return Ok(Self::map_model(existing));
        }

        let inserted = agents::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(now.to_string()),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        Ok(Self::map_model(inserted))
    }

    /// Delete the given agents if they are no longer linked to any media.
    /// Returns the number of agents deleted.
    pub async fn delete_orphans(&self, agent_ids: &[i32]) -> anyhow::Result<u64> {
        let ids: Vec<i32> = agent_ids
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let still_linked: Vec<i32> = MediaContributors::find()
            .select_only()
            .column(media_contributors::Column::AgentId)
            .filter(media_contributors::Column::AgentId.is_in(ids.clone()))
            .group_by(media_contributors::Column::AgentId)
            .into_tuple()
            .all(&self.conn)
            .await?;

        let linked: HashSet<i32> = still_linked.into_iter().collect();
        let orphans: Vec<i32> = ids.into_iter().filter(|id| !linked.contains(id)).collect();
        if orphans.is_empty() {
            return Ok(0);
        }

        let result = Agents::delete_many()
            .filter(agents::Column::Id.is_in(orphans))
            .exec(&self.conn)
            .await?;

        if result.rows_affected > 0 {
            info!("Removed {} orphaned agent(s)", result.rows_affected);
        }
        Ok(result.rows_affected)
    }

    pub async fn count(&self) -> anyhow::Result<u64> {
        Ok(Agents::find().count(&self.conn).await?)
    }
}
