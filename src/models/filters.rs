use std::borrow::Cow;
use std::fmt::Write as _;

use serde::Serialize;

use crate::models::media::{
    MediaStatus, MediaType, SCORE_NONE_LABEL, score_label,
};
use crate::models::partial_date::PartialDate;

/// Fixed page size for catalogue listings.
pub const PAGE_SIZE: u64 = 20;

/// Columns the catalogue may be sorted on. Everything else falls back to
/// the default so raw query input never reaches the ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    ReviewDate,
    Score,
}

impl SortField {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::ReviewDate => "review_date",
            Self::Score => "score",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            "review_date" => Some(Self::ReviewDate),
            "score" => Some(Self::Score),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortOrder {
    pub field: SortField,
    pub descending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            field: SortField::ReviewDate,
            descending: true,
        }
    }
}

impl SortOrder {
    /// Resolve a raw `sort` parameter ("score", "-created_at", ...). An
    /// unknown field keeps the requested direction but falls back to the
    /// default field; an absent or empty parameter yields the default order.
    #[must_use]
    pub fn resolve(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|s| !s.is_empty()) else {
            return Self::default();
        };

        let descending = raw.starts_with('-');
        let field =
            SortField::parse(raw.trim_start_matches('-')).unwrap_or(SortField::ReviewDate);

        Self { field, descending }
    }

    /// Normalized parameter form, e.g. `-review_date`.
    #[must_use]
    pub fn as_param(&self) -> String {
        if self.descending {
            format!("-{}", self.field.as_str())
        } else {
            self.field.as_str().to_string()
        }
    }
}

/// One value of the multi-select score filter. `none` selects unrated
/// entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFilter {
    Rated(i32),
    Unrated,
}

impl ScoreFilter {
    fn parse(raw: &str) -> Option<Self> {
        if raw == "none" {
            return Some(Self::Unrated);
        }
        raw.parse::<i32>().ok().map(Self::Rated)
    }

    #[must_use]
    pub fn as_param(&self) -> String {
        match self {
            Self::Rated(score) => score.to_string(),
            Self::Unrated => "none".to_string(),
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Rated(score) => score_label(*score)
                .map_or_else(|| score.to_string(), ToString::to_string),
            Self::Unrated => SCORE_NONE_LABEL.to_string(),
        }
    }
}

/// `filled` / `empty` selector for optional content (review text, cover).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Filled,
    Empty,
}

impl Presence {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "filled" => Some(Self::Filled),
            "empty" => Some(Self::Empty),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Filled => "filled",
            Self::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == "list" { Self::List } else { Self::Grid }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::List => "list",
        }
    }
}

/// Parsed catalogue listing parameters: free-text search, the multi-value
/// filters, sort order, view mode and page number.
///
/// Filter values are OR-combined within a field and AND-combined across
/// fields. Malformed values (bad score, bad date) are dropped rather than
/// rejected so stale bookmarked URLs keep working.
#[derive(Debug, Clone)]
pub struct MediaQuery {
    pub search: String,
    pub contributor: Option<i32>,
    pub types: Vec<MediaType>,
    pub statuses: Vec<MediaStatus>,
    pub scores: Vec<ScoreFilter>,
    pub review_from: Option<PartialDate>,
    pub review_to: Option<PartialDate>,
    pub has_review: Option<Presence>,
    pub has_cover: Option<Presence>,
    pub sort: SortOrder,
    pub view_mode: ViewMode,
    pub page: u64,
    raw_filter_present: bool,
}

impl Default for MediaQuery {
    fn default() -> Self {
        Self::parse("")
    }
}

impl MediaQuery {
    /// Parse a raw URL query string. Repeated `type`, `status` and `score`
    /// keys accumulate; `order_by` is accepted as a legacy alias of `sort`.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let mut search = String::new();
        let mut contributor = String::new();
        let mut types = Vec::new();
        let mut statuses = Vec::new();
        let mut scores = Vec::new();
        let mut review_from = String::new();
        let mut review_to = String::new();
        let mut has_review = String::new();
        let mut has_cover = String::new();
        let mut sort: Option<String> = None;
        let mut order_by: Option<String> = None;
        let mut view_mode = String::new();
        let mut page = String::new();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            match key.as_ref() {
                "search" => search = value,
                "contributor" => contributor = value,
                "type" => types.push(value),
                "status" => statuses.push(value),
                "score" => scores.push(value),
                "review_from" => review_from = value,
                "review_to" => review_to = value,
                "has_review" => has_review = value,
                "has_cover" => has_cover = value,
                "sort" => sort = Some(value),
                "order_by" => order_by = Some(value),
                "view_mode" => view_mode = value,
                "page" => page = value,
                _ => {}
            }
        }

        // A filter counts as "present" on its raw value, before validation,
        // so a malformed value still flips the active-filters indicator.
        let raw_filter_present = !types.is_empty()
            || !statuses.is_empty()
            || !scores.is_empty()
            || !review_from.is_empty()
            || !review_to.is_empty()
            || !has_review.is_empty()
            || !has_cover.is_empty();

        let sort_param = sort
            .filter(|s| !s.is_empty())
            .or_else(|| order_by.filter(|s| !s.is_empty()));

        Self {
            search: search.trim().to_string(),
            contributor: contributor.parse().ok(),
            types: types.iter().filter_map(|t| t.parse().ok()).collect(),
            statuses: statuses.iter().filter_map(|s| s.parse().ok()).collect(),
            scores: scores
                .iter()
                .filter_map(|s| ScoreFilter::parse(s))
                .collect(),
            review_from: review_from.parse().ok(),
            review_to: review_to.parse().ok(),
            has_review: Presence::parse(&has_review),
            has_cover: Presence::parse(&has_cover),
            sort: SortOrder::resolve(sort_param.as_deref()),
            view_mode: ViewMode::parse(&view_mode),
            page: page.parse().ok().filter(|p| *p >= 1).unwrap_or(1),
            raw_filter_present,
        }
    }

    /// Whether any narrowing filter is set. Search text and the contributor
    /// link do not count; they have their own UI affordances.
    #[must_use]
    pub const fn has_active_filters(&self) -> bool {
        self.raw_filter_present
    }

    /// Rebuild the canonical query string (without the page number), used
    /// when persisting the current view.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut out = String::new();

        let mut push = |key: &str, value: Cow<'_, str>| {
            if !out.is_empty() {
                out.push('&');
            }
            let _ = write!(out, "{key}={}", urlencoding::encode(&value));
        };

        if !self.search.is_empty() {
            push("search", Cow::Borrowed(&self.search));
        }
        if let Some(id) = self.contributor {
            push("contributor", Cow::Owned(id.to_string()));
        }
        for t in &self.types {
            push("type", Cow::Borrowed(t.as_str()));
        }
        for s in &self.statuses {
            push("status", Cow::Borrowed(s.as_str()));
        }
        for s in &self.scores {
            push("score", Cow::Owned(s.as_param()));
        }
        if let Some(from) = &self.review_from {
            push("review_from", Cow::Owned(from.to_string()));
        }
        if let Some(to) = &self.review_to {
            push("review_to", Cow::Owned(to.to_string()));
        }
        if let Some(p) = &self.has_review {
            push("has_review", Cow::Borrowed(p.as_str()));
        }
        if let Some(p) = &self.has_cover {
            push("has_cover", Cow::Borrowed(p.as_str()));
        }
        push("sort", Cow::Owned(self.sort.as_param()));
        push("view_mode", Cow::Borrowed(self.view_mode.as_str()));

        out
    }

    /// `(value, label)` pairs for the chips describing active filters.
    #[must_use]
    pub fn active_filter_labels(&self) -> ActiveFilterLabels {
        ActiveFilterLabels {
            types: self
                .types
                .iter()
                .map(|t| LabeledValue::new(t.as_str(), t.label()))
                .collect(),
            statuses: self
                .statuses
                .iter()
                .map(|s| LabeledValue::new(s.as_str(), s.label()))
                .collect(),
            scores: self
                .scores
                .iter()
                .map(|s| LabeledValue {
                    value: s.as_param(),
                    label: s.label(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LabeledValue {
    pub value: String,
    pub label: String,
}

impl LabeledValue {
    fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveFilterLabels {
    pub types: Vec<LabeledValue>,
    pub statuses: Vec<LabeledValue>,
    pub scores: Vec<LabeledValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_defaults_to_recent_reviews() {
        let sort = SortOrder::resolve(None);
        assert_eq!(sort.field, SortField::ReviewDate);
        assert!(sort.descending);
        assert_eq!(sort.as_param(), "-review_date");
    }

    #[test]
    fn test_sort_unknown_field_keeps_direction() {
        let desc = SortOrder::resolve(Some("-rating"));
        assert_eq!(desc.field, SortField::ReviewDate);
        assert!(desc.descending);

        let asc = SortOrder::resolve(Some("rating"));
        assert_eq!(asc.field, SortField::ReviewDate);
        assert!(!asc.descending);
    }

    #[test]
    fn test_sort_accepts_whitelisted_fields() {
        for raw in ["created_at", "updated_at", "review_date", "score"] {
            assert_eq!(SortOrder::resolve(Some(raw)).field.as_str(), raw);
        }
    }

    #[test]
    fn test_order_by_alias() {
        let query = MediaQuery::parse("order_by=-score");
        assert_eq!(query.sort.field, SortField::Score);
        assert!(query.sort.descending);

        // An explicit sort wins over the alias.
        let query = MediaQuery::parse("sort=created_at&order_by=-score");
        assert_eq!(query.sort.field, SortField::CreatedAt);

        // An empty sort falls through to the alias like an absent one.
        let query = MediaQuery::parse("sort=&order_by=score");
        assert_eq!(query.sort.field, SortField::Score);
        assert!(!query.sort.descending);
    }

    #[test]
    fn test_repeated_filter_values_accumulate() {
        let query = MediaQuery::parse("type=BOOK&type=FILM&status=COMPLETED");
        assert_eq!(query.types, vec![MediaType::Book, MediaType::Film]);
        assert_eq!(query.statuses, vec![MediaStatus::Completed]);
    }

    #[test]
    fn test_score_filter_parses_none_and_skips_garbage() {
        let query = MediaQuery::parse("score=none&score=7&score=high");
        assert_eq!(
            query.scores,
            vec![ScoreFilter::Unrated, ScoreFilter::Rated(7)]
        );
        // The malformed value still marks filters as active.
        assert!(query.has_active_filters());
    }

    #[test]
    fn test_malformed_dates_are_dropped() {
        let query = MediaQuery::parse("review_from=soon&review_to=2024-05");
        assert!(query.review_from.is_none());
        assert_eq!(query.review_to.unwrap().to_string(), "2024-05");
    }

    #[test]
    fn test_search_and_contributor_do_not_count_as_filters() {
        let query = MediaQuery::parse("search=dune&contributor=3");
        assert_eq!(query.search, "dune");
        assert_eq!(query.contributor, Some(3));
        assert!(!query.has_active_filters());
    }

    #[test]
    fn test_page_falls_back_to_one() {
        assert_eq!(MediaQuery::parse("page=abc").page, 1);
        assert_eq!(MediaQuery::parse("page=0").page, 1);
        assert_eq!(MediaQuery::parse("page=4").page, 4);
    }

    #[test]
    fn test_query_string_round_trip() {
        let raw = "search=dune&type=BOOK&score=none&has_cover=filled&sort=-score&view_mode=list";
        let query = MediaQuery::parse(raw);
        let rebuilt = query.to_query_string();
        assert_eq!(
            rebuilt,
            "search=dune&type=BOOK&score=none&has_cover=filled&sort=-score&view_mode=list"
        );

        let reparsed = MediaQuery::parse(&rebuilt);
        assert_eq!(reparsed.types, query.types);
        assert_eq!(reparsed.scores, query.scores);
        assert_eq!(reparsed.sort, query.sort);
        assert_eq!(reparsed.view_mode, ViewMode::List);
    }

    #[test]
    fn test_filter_labels() {
        let query = MediaQuery::parse("type=TV&status=DNF&score=none&score=9");
        let labels = query.active_filter_labels();
        assert_eq!(labels.types[0].label, "TV series");
        assert_eq!(labels.statuses[0].label, "Did not finish");
        assert_eq!(labels.scores[0].label, "Not rated");
        assert_eq!(labels.scores[1].label, "9\u{2b50} - Loved");
    }
}
