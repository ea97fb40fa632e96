use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::{LookupDetails, LookupResult, MIN_COVER_SIZE_BYTES, MIN_QUERY_LENGTH, SEARCH_LIMIT};

const OPENLIBRARY_API: &str = "https://openlibrary.org";
const OPENLIBRARY_COVERS_BASE: &str = "https://covers.openlibrary.org/";

fn cover_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^https://covers\.openlibrary\.org/[baw]/(?:id|olid|isbn)/[^/]+\.jpg$").ok()
        })
        .as_ref()
}

fn publish_year_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b(1[89]\d{2}|20[0-2]\d)\b").ok())
        .as_ref()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    key: Option<String>,
    title: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
    first_publish_year: Option<i32>,
    cover_i: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Work {
    title: Option<String>,
    description: Option<Description>,
    #[serde(default)]
    covers: Vec<i64>,
    #[serde(default)]
    authors: Vec<AuthorRef>,
}

/// Work descriptions come back either as a bare string or wrapped in a
/// `{"type": "/type/text", "value": "..."}` object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Description {
    Text(String),
    Object { value: String },
}

impl Description {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) | Self::Object { value: text } => text,
        }
    }
}

/// Author references appear both as `{"author": {"key": ...}}` and as a bare
/// `{"key": ...}` depending on the work's age.
#[derive(Debug, Deserialize)]
struct AuthorRef {
    author: Option<KeyRef>,
    key: Option<String>,
}

impl AuthorRef {
    fn key(&self) -> Option<&str> {
        self.author
            .as_ref()
            .and_then(|author| author.key.as_deref())
            .or(self.key.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct KeyRef {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Edition {
    #[serde(default)]
    works: Vec<KeyRef>,
    publish_date: Option<String>,
}

/// Client for the OpenLibrary book catalog. No authentication required.
#[derive(Clone)]
pub struct OpenLibraryClient {
    client: Client,
}

impl OpenLibraryClient {
    pub const fn with_shared_client(client: Client) -> Self {
        Self { client }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let response = self.client.get(url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("OpenLibrary API error: {} - {}", status, body));
        }

        Ok(Some(response.json().await?))
    }

    pub async fn search(&self, query: &str) -> Result<Vec<LookupResult>> {
        if query.trim().len() < MIN_QUERY_LENGTH {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/search.json?q={}&limit={}&fields=key,title,author_name,first_publish_year,cover_i",
            OPENLIBRARY_API,
            urlencoding::encode(query),
            SEARCH_LIMIT
        );

        let Some(response) = self.get_json::<SearchResponse>(&url).await? else {
            return Ok(Vec::new());
        };

        Ok(response.docs.into_iter().map(map_search_doc).collect())
    }

    /// Accepts either a work identifier (`OL45883W`) or an ISBN-10/13 with
    /// optional dashes and spaces.
    pub async fn get_details(
        &self,
        id: &str,
        year_hint: Option<i32>,
    ) -> Result<Option<LookupDetails>> {
        if let Some(isbn) = clean_isbn(id) {
            return self.get_by_isbn(&isbn).await;
        }
        self.get_work_details(id, year_hint).await
    }

    async fn get_work_details(
        &self,
        work_key: &str,
        year_hint: Option<i32>,
    ) -> Result<Option<LookupDetails>> {
        let key = normalize_work_key(work_key);
        let url = format!("{OPENLIBRARY_API}{key}.json");

        let Some(work) = self.get_json::<Work>(&url).await? else {
            return Ok(None);
        };

        let mut contributors = Vec::new();
        for author_ref in &work.authors {
            let Some(author_key) = author_ref.key() else {
                continue;
            };
            match self.fetch_author_name(author_key).await {
                Ok(Some(name)) => contributors.push(name),
                Ok(None) => {}
                Err(err) => warn!("Failed to fetch OpenLibrary author {}: {}", author_key, err),
            }
        }

        let cover_url = work
            .covers
            .iter()
            .find(|&&cover_id| cover_id > 0)
            .map(|cover_id| cover_image_url(*cover_id, "L"));

        Ok(Some(LookupDetails {
            title: work.title.clone().unwrap_or_default(),
            year: year_hint,
            overview: work.description.map(Description::into_text).unwrap_or_default(),
            contributors,
            genres: Vec::new(),
            media_type: "BOOK".to_string(),
            cover_url,
            external_url: format!("https://openlibrary.org{key}"),
        }))
    }

    /// The ISBN endpoint returns an edition; the linked work carries the
    /// description and authors. The edition's publish date wins over the
    /// work-level year when it parses.
    async fn get_by_isbn(&self, isbn: &str) -> Result<Option<LookupDetails>> {
        let url = format!("{OPENLIBRARY_API}/isbn/{isbn}.json");

        let Some(edition) = self.get_json::<Edition>(&url).await? else {
            return Ok(None);
        };

        let Some(work_key) = edition.works.first().and_then(|work| work.key.as_deref()) else {
            return Ok(None);
        };

        let mut details = self.get_work_details(work_key, None).await?;

        if let Some(details) = &mut details {
            let edition_year = edition
                .publish_date
                .as_deref()
                .and_then(year_from_publish_date);
            if edition_year.is_some() {
                details.year = edition_year;
            }
        }

        Ok(details)
    }

    async fn fetch_author_name(&self, author_key: &str) -> Result<Option<String>> {
        let url = format!("{OPENLIBRARY_API}{author_key}.json");
        let author = self.get_json::<Author>(&url).await?;
        Ok(author.and_then(|author| author.name))
    }

    pub async fn download_cover(&self, cover_url: &str) -> Result<Option<Vec<u8>>> {
        let valid = cover_url_pattern().is_some_and(|pattern| pattern.is_match(cover_url));
        if !valid {
            anyhow::bail!("Invalid OpenLibrary cover URL: {cover_url}");
        }

        let response = self.client.get(cover_url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow::anyhow!(
                "OpenLibrary image error: {} - {}",
                status,
                cover_url
            ));
        }

        let bytes = response.bytes().await?;

        // OpenLibrary answers with a 1x1 placeholder when no cover exists.
        if bytes.len() < MIN_COVER_SIZE_BYTES {
            return Ok(None);
        }

        Ok(Some(bytes.to_vec()))
    }
}

fn map_search_doc(doc: SearchDoc) -> LookupResult {
    let olid = doc
        .key
        .as_deref()
        .and_then(|key| key.rsplit('/').next())
        .unwrap_or_default()
        .to_string();

    LookupResult {
        id: olid,
        title: doc.title.clone().unwrap_or_default(),
        year: doc.first_publish_year,
        byline: doc.author_name.join(", "),
        overview: String::new(),
        media_type: "BOOK".to_string(),
        cover_url: doc.cover_i.map(|cover_id| cover_image_url(cover_id, "M")),
        thumb_url: doc.cover_i.map(|cover_id| cover_image_url(cover_id, "S")),
    }
}

fn cover_image_url(cover_id: i64, size: &str) -> String {
    format!("{OPENLIBRARY_COVERS_BASE}b/id/{cover_id}-{size}.jpg")
}

fn normalize_work_key(key: &str) -> String {
    let trimmed = key.trim_start_matches('/');
    if trimmed.starts_with("works/") {
        format!("/{trimmed}")
    } else {
        format!("/works/{trimmed}")
    }
}

/// Strips dashes and whitespace; accepts the result only when it has the
/// shape of an ISBN-10 (trailing check digit may be X) or ISBN-13.
fn clean_isbn(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    let bytes = cleaned.as_bytes();
    let shape_ok = match bytes.len() {
        10 => {
            bytes[..9].iter().all(u8::is_ascii_digit)
                && (bytes[9].is_ascii_digit() || bytes[9].eq_ignore_ascii_case(&b'X'))
        }
        13 => bytes.iter().all(u8::is_ascii_digit),
        _ => false,
    };

    shape_ok.then_some(cleaned)
}

fn year_from_publish_date(date: &str) -> Option<i32> {
    publish_year_pattern()?
        .captures(date)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_isbn() {
        assert_eq!(clean_isbn("978-2-07-061275-8").as_deref(), Some("9782070612758"));
        assert_eq!(clean_isbn("2 07 061275 5").as_deref(), Some("2070612755"));
        assert_eq!(clean_isbn("080442957X").as_deref(), Some("080442957X"));
        assert_eq!(clean_isbn("OL45883W"), None);
        assert_eq!(clean_isbn("12345"), None);
        assert_eq!(clean_isbn(""), None);
    }

    #[test]
    fn test_normalize_work_key() {
        assert_eq!(normalize_work_key("OL45883W"), "/works/OL45883W");
        assert_eq!(normalize_work_key("/works/OL45883W"), "/works/OL45883W");
        assert_eq!(normalize_work_key("works/OL45883W"), "/works/OL45883W");
    }

    #[test]
    fn test_year_from_publish_date() {
        assert_eq!(year_from_publish_date("March 2005"), Some(2005));
        assert_eq!(year_from_publish_date("1987"), Some(1987));
        assert_eq!(year_from_publish_date("2nd edition, 2019-05-01"), Some(2019));
        assert_eq!(year_from_publish_date("n.d."), None);
        assert_eq!(year_from_publish_date("2199"), None);
    }

    #[test]
    fn test_cover_url_pattern() {
        let pattern = cover_url_pattern().unwrap();
        assert!(pattern.is_match("https://covers.openlibrary.org/b/id/8739161-L.jpg"));
        assert!(pattern.is_match("https://covers.openlibrary.org/b/olid/OL7440033M-M.jpg"));
        assert!(!pattern.is_match("https://covers.openlibrary.org/b/id/8739161-L.png"));
        assert!(!pattern.is_match("https://example.com/b/id/8739161-L.jpg"));
        assert!(!pattern.is_match("https://covers.openlibrary.org/b/id/a/b-L.jpg"));
    }

    #[test]
    fn test_description_both_shapes() {
        let text: Work = serde_json::from_str(r#"{"description": "plain text"}"#).unwrap();
        assert_eq!(
            text.description.map(Description::into_text).as_deref(),
            Some("plain text")
        );

        let object: Work =
            serde_json::from_str(r#"{"description": {"type": "/type/text", "value": "wrapped"}}"#)
                .unwrap();
        assert_eq!(
            object.description.map(Description::into_text).as_deref(),
            Some("wrapped")
        );
    }

    #[test]
    fn test_author_ref_both_shapes() {
        let nested: AuthorRef =
            serde_json::from_str(r#"{"author": {"key": "/authors/OL23919A"}}"#).unwrap();
        assert_eq!(nested.key(), Some("/authors/OL23919A"));

        let bare: AuthorRef = serde_json::from_str(r#"{"key": "/authors/OL23919A"}"#).unwrap();
        assert_eq!(bare.key(), Some("/authors/OL23919A"));
    }

    #[test]
    fn test_map_search_doc() {
        let doc = SearchDoc {
            key: Some("/works/OL45883W".to_string()),
            title: Some("Fantastic Mr Fox".to_string()),
            author_name: vec!["Roald Dahl".to_string()],
            first_publish_year: Some(1970),
            cover_i: Some(6_498_519),
        };

        let result = map_search_doc(doc);
        assert_eq!(result.id, "OL45883W");
        assert_eq!(result.byline, "Roald Dahl");
        assert_eq!(result.media_type, "BOOK");
        assert_eq!(
            result.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/6498519-M.jpg")
        );
        assert_eq!(
            result.thumb_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/6498519-S.jpg")
        );
    }
}
