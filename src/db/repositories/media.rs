use std::collections::{HashMap, HashSet};

use anyhow::Context;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use crate::db::repositories::agent::AgentRepository;
use crate::db::repositories::tag::TagRepository;
use crate::entities::{activities, agents, media, media_contributors, media_tags, prelude::*, tags};
use crate::models::catalog::{
    Agent, EntityRef, MediaDeleted, MediaEntry, MediaInput, MediaPage, MediaUpdate, Tag,
};
use crate::models::filters::{MediaQuery, PAGE_SIZE, Presence, ScoreFilter, SortField};

pub struct MediaRepository {
    conn: DatabaseConnection,
}

impl MediaRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(
        model: media::Model,
        contributors: Vec<Agent>,
        tags: Vec<Tag>,
    ) -> anyhow::Result<MediaEntry> {
        let media_type = model.media_type.parse()?;
        let status = model.status.parse()?;

        Ok(MediaEntry {
            id: model.id,
            title: model.title,
            media_type,
            status,
            pub_year: model.pub_year,
            score: model.score,
            review: model.review,
            review_html: model.review_html,
            review_date: model.review_date.as_deref().and_then(|d| d.parse().ok()),
            cover: model.cover.filter(|c| !c.is_empty()),
            created_at: model.created_at,
            updated_at: model.updated_at,
            contributors,
            tags,
        })
    }

    /// Batch-load contributors and tags for a set of media ids, each list
    /// sorted by name.
    async fn load_relations<C: ConnectionTrait>(
        conn: &C,
        ids: &[i32],
    ) -> anyhow::Result<(HashMap<i32, Vec<Agent>>, HashMap<i32, Vec<Tag>>)> {
        let mut contributors: HashMap<i32, Vec<Agent>> = HashMap::new();
        let mut tag_map: HashMap<i32, Vec<Tag>> = HashMap::new();
        if ids.is_empty() {
            return Ok((contributors, tag_map));
        }

        let contributor_rows = MediaContributors::find()
            .filter(media_contributors::Column::MediaId.is_in(ids.to_vec()))
            .find_also_related(Agents)
            .order_by_asc(agents::Column::Name)
            .all(conn)
            .await?;
        for (link, agent) in contributor_rows {
            if let Some(agent) = agent {
                contributors.entry(link.media_id).or_default().push(Agent {
                    id: agent.id,
                    name: agent.name,
                });
            }
        }

        let tag_rows = MediaTags::find()
            .filter(media_tags::Column::MediaId.is_in(ids.to_vec()))
            .find_also_related(Tags)
            .order_by_asc(tags::Column::Name)
            .all(conn)
            .await?;
        for (link, tag) in tag_rows {
            if let Some(tag) = tag {
                tag_map.entry(link.media_id).or_default().push(Tag {
                    id: tag.id,
                    name: tag.name,
                });
            }
        }

        Ok((contributors, tag_map))
    }

    /// Free-text search: title, review body and contributor names by
    /// substring, plus an exact publication-year match when the query
    /// parses as an integer.
    fn search_condition(query: &str) -> Condition {
        let pattern = format!("%{query}%");
        let matching_agents = Query::select()
            .column(agents::Column::Id)
            .from(Agents)
            .and_where(Expr::col(agents::Column::Name).like(pattern))
            .to_owned();
        let linked_media = Query::select()
            .column(media_contributors::Column::MediaId)
            .from(MediaContributors)
            .and_where(Expr::col(media_contributors::Column::AgentId).in_subquery(matching_agents))
            .to_owned();

        let mut cond = Condition::any()
            .add(media::Column::Title.contains(query))
            .add(media::Column::Review.contains(query))
            .add(media::Column::Id.in_subquery(linked_media));

        if let Ok(year) = query.parse::<i32>() {
            cond = cond.add(media::Column::PubYear.eq(year));
        }

        cond
    }

    /// Values within one filter are OR-combined; filters are AND-combined.
    fn build_condition(query: &MediaQuery, contributor: Option<&Agent>) -> Condition {
        let mut cond = Condition::all();

        if !query.search.is_empty() {
            cond = cond.add(Self::search_condition(&query.search));
        }

        if let Some(agent) = contributor {
            let linked = Query::select()
                .column(media_contributors::Column::MediaId)
                .from(MediaContributors)
                .and_where(Expr::col(media_contributors::Column::AgentId).eq(agent.id))
                .to_owned();
            cond = cond.add(media::Column::Id.in_subquery(linked));
        }

        if !query.types.is_empty() {
            cond = cond.add(media::Column::MediaType.is_in(query.types.iter().map(|t| t.as_str())));
        }
        if !query.statuses.is_empty() {
            cond =
                cond.add(media::Column::Status.is_in(query.statuses.iter().map(|s| s.as_str())));
        }

        if !query.scores.is_empty() {
            let mut scores = Condition::any();
            for score in &query.scores {
                scores = match score {
                    ScoreFilter::Rated(value) => scores.add(media::Column::Score.eq(*value)),
                    ScoreFilter::Unrated => scores.add(media::Column::Score.is_null()),
                };
            }
            cond = cond.add(scores);
        }

        // Canonical partial-date text compares in chronological order, so
        // the bounds work directly on the column.
        if let Some(from) = &query.review_from {
            cond = cond.add(media::Column::ReviewDate.gte(from.to_string()));
        }
        if let Some(to) = &query.review_to {
            cond = cond.add(media::Column::ReviewDate.lte(to.to_string()));
        }

        match query.has_review {
            Some(Presence::Filled) => cond = cond.add(media::Column::Review.ne("")),
            Some(Presence::Empty) => cond = cond.add(media::Column::Review.eq("")),
            None => {}
        }
        match query.has_cover {
            Some(Presence::Filled) => {
                cond = cond
                    .add(media::Column::Cover.is_not_null())
                    .add(media::Column::Cover.ne(""));
            }
            Some(Presence::Empty) => {
                cond = cond.add(
                    Condition::any()
                        .add(media::Column::Cover.is_null())
                        .add(media::Column::Cover.eq("")),
                );
            }
            None => {}
        }

        cond
    }

    const fn sort_column(field: SortField) -> media::Column {
        match field {
            SortField::CreatedAt => media::Column::CreatedAt,
            SortField::UpdatedAt => media::Column::UpdatedAt,
            SortField::ReviewDate => media::Column::ReviewDate,
            SortField::Score => media::Column::Score,
        }
    }

    pub async fn list(&self, query: &MediaQuery) -> anyhow::Result<MediaPage> {
        // The contributor narrowing only applies when that agent exists;
        // a stale id leaves the listing untouched.
        let contributor = match query.contributor {
            Some(id) => Agents::find_by_id(id).one(&self.conn).await?.map(|m| Agent {
                id: m.id,
                name: m.name,
            }),
            None => None,
        };

        let mut select = Media::find().filter(Self::build_condition(query, contributor.as_ref()));

        let column = Self::sort_column(query.sort.field);
        select = if query.sort.descending {
            select.order_by_desc(column)
        } else {
            select.order_by_asc(column)
        };
        select = select.order_by_desc(media::Column::Id);

        let paginator = select.paginate(&self.conn, PAGE_SIZE);
        let totals = paginator.num_items_and_pages().await?;

        // Out-of-range pages resolve to the last one instead of erroring.
        let page = if totals.number_of_pages == 0 {
            1
        } else {
            query.page.min(totals.number_of_pages)
        };

        let models = paginator.fetch_page(page - 1).await?;
        let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
        let (mut contributors, mut tag_map) = Self::load_relations(&self.conn, &ids).await?;

        let mut entries = Vec::with_capacity(models.len());
        for model in models {
            let entry_contributors = contributors.remove(&model.id).unwrap_or_default();
            let entry_tags = tag_map.remove(&model.id).unwrap_or_default();
            entries.push(Self::map_model(model, entry_contributors, entry_tags)?);
        }

        Ok(MediaPage {
            entries,
            page,
            total_pages: totals.number_of_pages,
            total_items: totals.number_of_items,
            contributor,
        })
    }

    pub async fn get(&self, id: i32) -> anyhow::Result<Option<MediaEntry>> {
        let Some(model) = Media::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let (mut contributors, mut tag_map) = Self::load_relations(&self.conn, &[id]).await?;
        let entry = Self::map_model(
            model,
            contributors.remove(&id).unwrap_or_default(),
            tag_map.remove(&id).unwrap_or_default(),
        )?;
        Ok(Some(entry))
    }

    /// Everything credited to one agent, for the agent detail page.
    pub async fn list_for_agent(&self, agent_id: i32) -> anyhow::Result<Vec<MediaEntry>> {
        let linked = Query::select()
            .column(media_contributors::Column::MediaId)
            .from(MediaContributors)
            .and_where(Expr::col(media_contributors::Column::AgentId).eq(agent_id))
            .to_owned();

        let models = Media::find()
            .filter(media::Column::Id.in_subquery(linked))
            .order_by_asc(media::Column::Title)
            .all(&self.conn)
            .await?;

        let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
        let (mut contributors, mut tag_map) = Self::load_relations(&self.conn, &ids).await?;

        let mut entries = Vec::with_capacity(models.len());
        for model in models {
            let entry_contributors = contributors.remove(&model.id).unwrap_or_default();
            let entry_tags = tag_map.remove(&model.id).unwrap_or_default();
            entries.push(Self::map_model(model, entry_contributors, entry_tags)?);
        }
        Ok(entries)
    }

    async fn resolve_contributor_refs<C: ConnectionTrait>(
        conn: &C,
        refs: &[EntityRef],
        now: &str,
    ) -> anyhow::Result<Vec<i32>> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        for reference in refs {
            let id = match reference {
                // Unknown ids were rejected by validation; one deleted in
                // between is simply skipped.
                EntityRef::Id(id) => match Agents::find_by_id(*id).one(conn).await? {
                    Some(model) => model.id,
                    None => continue,
                },
                EntityRef::Name(name) => {
                    let name = name.trim();
                    if name.is_empty() {
                        continue;
                    }
                    AgentRepository::get_or_create_on(conn, name, now).await?.id
                }
            };
            if seen.insert(id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn resolve_tag_refs<C: ConnectionTrait>(
        conn: &C,
        refs: &[EntityRef],
        now: &str,
    ) -> anyhow::Result<Vec<i32>> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        for reference in refs {
            let id = match reference {
                EntityRef::Id(id) => match Tags::find_by_id(*id).one(conn).await? {
                    Some(model) => model.id,
                    None => continue,
                },
                EntityRef::Name(name) => {
                    let name = name.trim();
                    if name.is_empty() {
                        continue;
                    }
                    TagRepository::get_or_create_on(conn, name, now).await?.id
                }
            };
            if seen.insert(id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn link_contributors<C: ConnectionTrait>(
        conn: &C,
        media_id: i32,
        agent_ids: &[i32],
    ) -> anyhow::Result<()> {
        if agent_ids.is_empty() {
            return Ok(());
        }
        let links = agent_ids
            .iter()
            .map(|agent_id| media_contributors::ActiveModel {
                media_id: Set(media_id),
                agent_id: Set(*agent_id),
            });
        MediaContributors::insert_many(links).exec(conn).await?;
        Ok(())
    }

    async fn link_tags<C: ConnectionTrait>(
        conn: &C,
        media_id: i32,
        tag_ids: &[i32],
    ) -> anyhow::Result<()> {
        if tag_ids.is_empty() {
            return Ok(());
        }
        let links = tag_ids.iter().map(|tag_id| media_tags::ActiveModel {
            media_id: Set(media_id),
            tag_id: Set(*tag_id),
        });
        MediaTags::insert_many(links).exec(conn).await?;
        Ok(())
    }

    async fn linked_agent_ids<C: ConnectionTrait>(conn: &C, id: i32) -> anyhow::Result<Vec<i32>> {
        Ok(MediaContributors::find()
            .select_only()
            .column(media_contributors::Column::AgentId)
            .filter(media_contributors::Column::MediaId.eq(id))
            .into_tuple()
            .all(conn)
            .await?)
    }

    async fn linked_tag_ids<C: ConnectionTrait>(conn: &C, id: i32) -> anyhow::Result<Vec<i32>> {
        Ok(MediaTags::find()
            .select_only()
            .column(media_tags::Column::TagId)
            .filter(media_tags::Column::MediaId.eq(id))
            .into_tuple()
            .all(conn)
            .await?)
    }

    pub async fn create(&self, input: &MediaInput, now: &str) -> anyhow::Result<MediaEntry> {
        let txn = self.conn.begin().await?;

        let inserted = media::ActiveModel {
            title: Set(input.title.clone()),
            media_type: Set(input.media_type.as_str().to_string()),
            status: Set(input.status.as_str().to_string()),
            pub_year: Set(input.pub_year),
            score: Set(input.score),
            review: Set(input.review.clone()),
            review_html: Set(input.review_html.clone()),
            review_date: Set(input.review_date.map(|d| d.to_string())),
            cover: Set(None),
            created_at: Set(now.to_string()),
            updated_at: Set(now.to_string()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let agent_ids = Self::resolve_contributor_refs(&txn, &input.contributors, now).await?;
        Self::link_contributors(&txn, inserted.id, &agent_ids).await?;
        let tag_ids = Self::resolve_tag_refs(&txn, &input.tags, now).await?;
        Self::link_tags(&txn, inserted.id, &tag_ids).await?;

        txn.commit().await?;

        info!("Added media entry: {}", input.title);
        self.get(inserted.id)
            .await?
            .context("media entry missing right after insert")
    }

    pub async fn update(
        &self,
        id: i32,
        input: &MediaInput,
        now: &str,
    ) -> anyhow::Result<Option<MediaUpdate>> {
        let txn = self.conn.begin().await?;

        let Some(existing) = Media::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(None);
        };

        let engagement_changed =
            existing.status != input.status.as_str() || existing.score != input.score;

        let before_agents: HashSet<i32> =
            Self::linked_agent_ids(&txn, id).await?.into_iter().collect();
        let before_tags: HashSet<i32> =
            Self::linked_tag_ids(&txn, id).await?.into_iter().collect();

        media::ActiveModel {
            id: Set(id),
            title: Set(input.title.clone()),
            media_type: Set(input.media_type.as_str().to_string()),
            status: Set(input.status.as_str().to_string()),
            pub_year: Set(input.pub_year),
            score: Set(input.score),
            review: Set(input.review.clone()),
            review_html: Set(input.review_html.clone()),
            review_date: Set(input.review_date.map(|d| d.to_string())),
            updated_at: Set(now.to_string()),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        let desired_agents = Self::resolve_contributor_refs(&txn, &input.contributors, now).await?;
        let desired: HashSet<i32> = desired_agents.iter().copied().collect();
        let removed_agents: Vec<i32> = before_agents.difference(&desired).copied().collect();
        let added_agents: Vec<i32> = desired_agents
            .iter()
            .copied()
            .filter(|agent_id| !before_agents.contains(agent_id))
            .collect();
        if !removed_agents.is_empty() {
            MediaContributors::delete_many()
                .filter(media_contributors::Column::MediaId.eq(id))
                .filter(media_contributors::Column::AgentId.is_in(removed_agents.clone()))
                .exec(&txn)
                .await?;
        }
        Self::link_contributors(&txn, id, &added_agents).await?;

        let desired_tags = Self::resolve_tag_refs(&txn, &input.tags, now).await?;
        let desired: HashSet<i32> = desired_tags.iter().copied().collect();
        let removed_tags: Vec<i32> = before_tags.difference(&desired).copied().collect();
        let added_tags: Vec<i32> = desired_tags
            .iter()
            .copied()
            .filter(|tag_id| !before_tags.contains(tag_id))
            .collect();
        if !removed_tags.is_empty() {
            MediaTags::delete_many()
                .filter(media_tags::Column::MediaId.eq(id))
                .filter(media_tags::Column::TagId.is_in(removed_tags.clone()))
                .exec(&txn)
                .await?;
        }
        Self::link_tags(&txn, id, &added_tags).await?;

        txn.commit().await?;

        let entry = self
            .get(id)
            .await?
            .context("media entry missing right after update")?;
        Ok(Some(MediaUpdate {
            entry,
            removed_agents,
            removed_tags,
            engagement_changed,
        }))
    }

    pub async fn delete(&self, id: i32) -> anyhow::Result<Option<MediaDeleted>> {
        let txn = self.conn.begin().await?;

        let Some(existing) = Media::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(None);
        };

        let agent_ids = Self::linked_agent_ids(&txn, id).await?;
        let tag_ids = Self::linked_tag_ids(&txn, id).await?;

        MediaContributors::delete_many()
            .filter(media_contributors::Column::MediaId.eq(id))
            .exec(&txn)
            .await?;
        MediaTags::delete_many()
            .filter(media_tags::Column::MediaId.eq(id))
            .exec(&txn)
            .await?;
        Activities::delete_many()
            .filter(activities::Column::MediaId.eq(id))
            .exec(&txn)
            .await?;
        Media::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        info!("Removed media entry {}: {}", id, existing.title);
        Ok(Some(MediaDeleted {
            title: existing.title,
            cover: existing.cover.filter(|c| !c.is_empty()),
            agents: agent_ids,
            tags: tag_ids,
        }))
    }

    pub async fn set_cover(&self, id: i32, cover: Option<&str>, now: &str) -> anyhow::Result<()> {
        Media::update_many()
            .col_expr(
                media::Column::Cover,
                Expr::value(cover.map(ToString::to_string)),
            )
            .col_expr(media::Column::UpdatedAt, Expr::value(now))
            .filter(media::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// `(id, review)` pairs for offline re-rendering.
    pub async fn list_review_sources(&self) -> anyhow::Result<Vec<(i32, String)>> {
        Ok(Media::find()
            .select_only()
            .column(media::Column::Id)
            .column(media::Column::Review)
            .into_tuple()
            .all(&self.conn)
            .await?)
    }

    pub async fn update_review_html(&self, id: i32, html: &str) -> anyhow::Result<()> {
        Media::update_many()
            .col_expr(media::Column::ReviewHtml, Expr::value(html))
            .filter(media::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> anyhow::Result<u64> {
        Ok(Media::find().count(&self.conn).await?)
    }
}
