use serde::{Deserialize, Serialize};

use crate::models::media::{MediaStatus, MediaType};
use crate::models::partial_date::PartialDate;

/// Person or organisation credited on a media entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agent {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagWithCount {
    pub id: i32,
    pub name: String,
    pub media_count: i64,
}

/// A catalogue entry with contributors and tags loaded.
#[derive(Debug, Clone, Serialize)]
pub struct MediaEntry {
    pub id: i32,
    pub title: String,
    pub media_type: MediaType,
    pub status: MediaStatus,
    pub pub_year: Option<i32>,
    pub score: Option<i32>,
    pub review: String,
    pub review_html: String,
    pub review_date: Option<PartialDate>,
    pub cover: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub contributors: Vec<Agent>,
    pub tags: Vec<Tag>,
}

/// Contributor/tag reference in a write payload: an existing row by id, or
/// one by name (created on first use).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(i32),
    Name(String),
}

/// Write model for creating or replacing a media entry. `review_html` is
/// the rendering of `review` and is produced by the caller.
#[derive(Debug, Clone)]
pub struct MediaInput {
    pub title: String,
    pub media_type: MediaType,
    pub status: MediaStatus,
    pub pub_year: Option<i32>,
    pub score: Option<i32>,
    pub review: String,
    pub review_html: String,
    pub review_date: Option<PartialDate>,
    pub contributors: Vec<EntityRef>,
    pub tags: Vec<EntityRef>,
}

/// One page of catalogue results. `contributor` is set when the listing was
/// narrowed to an existing agent, for the "filtered by" header.
#[derive(Debug, Clone)]
pub struct MediaPage {
    pub entries: Vec<MediaEntry>,
    pub page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub contributor: Option<Agent>,
}

/// Outcome of a media update: the fresh entry plus what the caller needs
/// for orphan cleanup and activity recording.
#[derive(Debug)]
pub struct MediaUpdate {
    pub entry: MediaEntry,
    pub removed_agents: Vec<i32>,
    pub removed_tags: Vec<i32>,
    pub engagement_changed: bool,
}

/// What was detached by a media deletion.
#[derive(Debug)]
pub struct MediaDeleted {
    pub title: String,
    pub cover: Option<String>,
    pub agents: Vec<i32>,
    pub tags: Vec<i32>,
}
