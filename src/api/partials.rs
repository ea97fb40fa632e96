use axum::{
    extract::{Form, Query, RawQuery, State},
    response::Html,
};
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;

use super::validation::{
    validate_email, validate_pub_year, validate_review_date, validate_score, validate_title,
};
use super::{ApiError, AppState};
use crate::models::catalog::MediaEntry;
use crate::models::filters::{MediaQuery, ViewMode};

const AGENT_SUGGESTION_LIMIT: u64 = 12;

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn escape_attr(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}

fn error_span(message: &str) -> String {
    format!(
        "<span class=\"label-text-alt text-error\">{}</span>",
        escape(message)
    )
}

/// The bare message for inline display; other error kinds stay generic
/// so internals never leak into markup.
fn field_error(err: &ApiError) -> String {
    match err {
        ApiError::ValidationError(msg) => error_span(msg),
        _ => error_span("Invalid value"),
    }
}

/// GET /partials/media
///
/// The catalogue fragment: grid or list body plus the pagination bar,
/// driven by the same query parameters as the JSON listing.
pub async fn media_fragment(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, ApiError> {
    let raw = raw.unwrap_or_default();
    let query = MediaQuery::parse(&raw);

    let page = state
        .store()
        .list_media(&query)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    let mut html = String::new();

    if page.entries.is_empty() {
        html.push_str("<p class=\"empty-state\">No entries match the current filters.</p>");
    } else {
        match query.view_mode {
            ViewMode::Grid => render_grid(&mut html, &page.entries),
            ViewMode::List => render_list(&mut html, &page.entries),
        }
    }

    render_pagination(&mut html, &query, page.page, page.total_pages);

    Ok(Html(html))
}

fn render_grid(html: &mut String, entries: &[MediaEntry]) {
    html.push_str("<div class=\"media-grid\">");
    for entry in entries {
        let _ = write!(html, "<a class=\"media-card\" href=\"/entries/{}\">", entry.id);
        if let Some(cover) = &entry.cover {
            let _ = write!(
                html,
                "<img src=\"/media/{}\" alt=\"{}\" loading=\"lazy\">",
                escape_attr(cover),
                escape_attr(&entry.title)
            );
        } else {
            let _ = write!(
                html,
                "<div class=\"media-card-placeholder\">{}</div>",
                escape(&entry.title)
            );
        }
        let _ = write!(
            html,
            "<div class=\"media-card-body\"><h3>{}</h3><p>{} &middot; {}</p>",
            escape(&entry.title),
            entry.media_type.label(),
            entry.status.label()
        );
        if let Some(score) = entry.score {
            let _ = write!(html, "<p class=\"media-card-score\">{}/10</p>", score);
        }
        html.push_str("</div></a>");
    }
    html.push_str("</div>");
}

fn render_list(html: &mut String, entries: &[MediaEntry]) {
    html.push_str(
        "<table class=\"media-list\"><thead><tr>\
         <th>Title</th><th>Type</th><th>Status</th><th>Score</th><th>Reviewed</th>\
         </tr></thead><tbody>",
    );
    for entry in entries {
        let score = entry
            .score
            .map_or(String::from("&ndash;"), |s| s.to_string());
        let reviewed = entry
            .review_date
            .as_ref()
            .map_or(String::from("&ndash;"), |d| escape(&d.to_string()));
        let _ = write!(
            html,
            "<tr><td><a href=\"/entries/{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            entry.id,
            escape(&entry.title),
            entry.media_type.label(),
            entry.status.label(),
            score,
            reviewed
        );
    }
    html.push_str("</tbody></table>");
}

fn render_pagination(html: &mut String, query: &MediaQuery, page: u64, total_pages: u64) {
    if total_pages <= 1 {
        return;
    }

    let base = query.to_query_string();
    html.push_str("<nav class=\"pagination join\">");
    for target in 1..=total_pages {
        let current = if target == page { " btn-active" } else { "" };
        let _ = write!(
            html,
            "<button class=\"join-item btn{}\" hx-get=\"/partials/media?{}&page={}\" \
             hx-target=\"#media-content\">{}</button>",
            current,
            escape_attr(&base),
            target,
            target
        );
    }
    html.push_str("</nav>");
}

#[derive(Debug, Deserialize)]
pub struct AgentSearchQuery {
    #[serde(default)]
    pub q: String,
}

/// GET /partials/agents/search
///
/// Autocomplete suggestions. An empty query yields an empty body so the
/// dropdown collapses.
pub async fn agent_suggestions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AgentSearchQuery>,
) -> Result<Html<String>, ApiError> {
    let q = params.q.trim();
    if q.is_empty() {
        return Ok(Html(String::new()));
    }

    let agents = state
        .store()
        .search_agents(q, AGENT_SUGGESTION_LIMIT)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    let mut html = String::new();
    for agent in agents {
        let _ = write!(
            html,
            "<li class=\"agent-suggestion\" data-agent-id=\"{}\">{}</li>",
            agent.id,
            escape(&agent.name)
        );
    }

    Ok(Html(html))
}

#[derive(Debug, Deserialize)]
pub struct AgentSelectForm {
    pub id: i32,
}

/// POST /partials/agents/select
///
/// Returns the removable contributor chip for a picked suggestion, or an
/// inline error when the id no longer exists.
pub async fn agent_select(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AgentSelectForm>,
) -> Result<Html<String>, ApiError> {
    let agent = state
        .store()
        .get_agent(form.id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    let html = agent.map_or_else(
        || error_span("Agent not found"),
        |agent| {
            format!(
                "<span class=\"badge badge-outline agent-chip\" data-agent-id=\"{}\">{}\
                 <button type=\"button\" class=\"agent-chip-remove\">&times;</button></span>",
                agent.id,
                escape(&agent.name)
            )
        },
    );

    Ok(Html(html))
}

#[derive(Debug, Deserialize)]
pub struct FieldValidationForm {
    pub field: String,
    #[serde(default)]
    pub value: String,
}

/// POST /partials/validate/media
///
/// Per-field validation for the media form: the error span on failure, an
/// empty body when the value is fine.
pub async fn validate_media_field(Form(form): Form<FieldValidationForm>) -> Html<String> {
    let value = form.value.trim();

    let result = match form.field.as_str() {
        "title" => validate_title(value).map(|_| ()),
        "pub_year" => parse_optional_int(value, "Year must be a number")
            .and_then(|year| validate_pub_year(year).map(|_| ())),
        "score" => parse_optional_int(value, "Score must be a number")
            .and_then(|score| validate_score(score).map(|_| ())),
        "review_date" => validate_review_date(Some(value)).map(|_| ()),
        _ => Err(ApiError::validation("Unknown field")),
    };

    Html(result.err().as_ref().map(field_error).unwrap_or_default())
}

/// POST /partials/validate/profile
pub async fn validate_profile_field(Form(form): Form<FieldValidationForm>) -> Html<String> {
    let value = form.value.trim();

    let result = match form.field.as_str() {
        "email" => {
            if value.is_empty() {
                Ok(())
            } else {
                validate_email(value).map(|_| ())
            }
        }
        "display_name" => {
            if value.chars().count() > 100 {
                Err(ApiError::validation(
                    "Display name must be 100 characters or less",
                ))
            } else {
                Ok(())
            }
        }
        _ => Err(ApiError::validation("Unknown field")),
    };

    Html(result.err().as_ref().map(field_error).unwrap_or_default())
}

fn parse_optional_int(value: &str, message: &str) -> Result<Option<i32>, ApiError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<i32>()
        .map(Some)
        .map_err(|_| ApiError::validation(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_span_escapes_message() {
        let span = error_span("needs <b>bold</b> & more");
        assert_eq!(
            span,
            "<span class=\"label-text-alt text-error\">needs &lt;b&gt;bold&lt;/b&gt; &amp; more</span>"
        );
    }

    #[test]
    fn test_render_pagination_skipped_for_single_page() {
        let mut html = String::new();
        render_pagination(&mut html, &MediaQuery::parse(""), 1, 1);
        assert!(html.is_empty());
    }

    #[test]
    fn test_render_pagination_marks_current_page() {
        let mut html = String::new();
        render_pagination(&mut html, &MediaQuery::parse("type=BOOK"), 2, 3);
        assert!(html.contains("btn btn-active"));
        assert!(html.contains("type=BOOK"));
        assert!(html.contains("page=3"));
    }

    #[test]
    fn test_parse_optional_int() {
        assert_eq!(parse_optional_int("", "nope").unwrap(), None);
        assert_eq!(parse_optional_int("1982", "nope").unwrap(), Some(1982));
        assert!(parse_optional_int("abc", "nope").is_err());
    }
}
