use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use super::{LookupDetails, LookupResult, MIN_COVER_SIZE_BYTES, MIN_QUERY_LENGTH, SEARCH_LIMIT};

const MUSICBRAINZ_API: &str = "https://musicbrainz.org/ws/2";
const COVERART_BASE: &str = "https://coverartarchive.org/";

fn coverart_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^https://coverartarchive\.org/release/[a-f0-9-]+/").ok())
        .as_ref()
}

#[derive(Debug, Deserialize)]
struct ReleaseSearchResponse {
    #[serde(default)]
    releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    id: Option<String>,
    title: Option<String>,
    date: Option<String>,
    country: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<ArtistCredit>,
    #[serde(rename = "label-info", default)]
    label_info: Vec<LabelInfo>,
    #[serde(default)]
    genres: Vec<NamedEntry>,
    #[serde(default)]
    tags: Vec<NamedEntry>,
    #[serde(rename = "release-group")]
    release_group: Option<ReleaseGroup>,
}

#[derive(Debug, Deserialize)]
struct ArtistCredit {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelInfo {
    label: Option<NamedEntry>,
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroup {
    #[serde(rename = "primary-type")]
    primary_type: Option<String>,
}

/// Client for the MusicBrainz release catalog and the Cover Art Archive.
/// MusicBrainz requires a descriptive User-Agent, which the shared HTTP
/// client already carries.
#[derive(Clone)]
pub struct MusicBrainzClient {
    client: Client,
}

impl MusicBrainzClient {
    pub const fn with_shared_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<Option<reqwest::Response>> {
        let response = self.client.get(url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("MusicBrainz API error: {} - {}", status, body));
        }

        Ok(Some(response))
    }

    pub async fn search(&self, query: &str) -> Result<Vec<LookupResult>> {
        if query.trim().len() < MIN_QUERY_LENGTH {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/release?query={}&limit={}&fmt=json",
            MUSICBRAINZ_API,
            urlencoding::encode(query),
            SEARCH_LIMIT
        );

        let Some(response) = self.fetch(&url).await? else {
            return Ok(Vec::new());
        };
        let response: ReleaseSearchResponse = response.json().await?;

        Ok(response.releases.iter().map(map_search_release).collect())
    }

    pub async fn get_details(&self, mbid: &str) -> Result<Option<LookupDetails>> {
        let url = format!(
            "{MUSICBRAINZ_API}/release/{mbid}?inc=artists+labels+tags+genres+release-groups&fmt=json"
        );

        let Some(response) = self.fetch(&url).await? else {
            return Ok(None);
        };
        let release: Release = response.json().await?;

        let cover_url = self.resolve_front_cover(mbid).await;

        Ok(Some(LookupDetails {
            title: release.title.clone().unwrap_or_default(),
            year: year_from_date(release.date.as_deref()),
            overview: build_overview(&release),
            contributors: extract_artists(&release),
            genres: extract_genres_and_tags(&release),
            media_type: "MUSIC".to_string(),
            cover_url,
            external_url: format!("https://musicbrainz.org/release/{mbid}"),
        }))
    }

    /// Probes the Cover Art Archive with HEAD requests, largest size first.
    /// The archive answers via redirect, so redirects are followed here.
    async fn resolve_front_cover(&self, mbid: &str) -> Option<String> {
        for name in ["front-500", "front-250", "front"] {
            let url = format!("{COVERART_BASE}release/{mbid}/{name}");
            match self.client.head(&url).send().await {
                Ok(response) if response.status().is_success() => return Some(url),
                Ok(_) | Err(_) => {}
            }
        }
        None
    }

    pub async fn download_cover(&self, cover_url: &str) -> Result<Option<Vec<u8>>> {
        let valid = coverart_url_pattern().is_some_and(|pattern| pattern.is_match(cover_url));
        if !valid {
            anyhow::bail!("Invalid Cover Art Archive URL: {cover_url}");
        }

        let response = self.client.get(cover_url).send().await?;

        // The archive answers 404 when a release has no cover art.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow::anyhow!(
                "Cover Art Archive error: {} - {}",
                status,
                cover_url
            ));
        }

        let bytes = response.bytes().await?;

        if bytes.len() < MIN_COVER_SIZE_BYTES {
            return Ok(None);
        }

        Ok(Some(bytes.to_vec()))
    }
}

fn map_search_release(release: &Release) -> LookupResult {
    let mbid = release.id.clone().unwrap_or_default();
    let cover_url = (!mbid.is_empty())
        .then(|| format!("{COVERART_BASE}release/{mbid}/front-500"));
    let thumb_url = (!mbid.is_empty())
        .then(|| format!("{COVERART_BASE}release/{mbid}/front-250"));

    LookupResult {
        id: mbid,
        title: release.title.clone().unwrap_or_default(),
        year: year_from_date(release.date.as_deref()),
        byline: extract_artists(release).join(", "),
        overview: build_overview(release),
        media_type: "MUSIC".to_string(),
        cover_url,
        thumb_url,
    }
}

fn extract_artists(release: &Release) -> Vec<String> {
    release
        .artist_credit
        .iter()
        .filter_map(|credit| credit.name.clone())
        .collect()
}

fn extract_label(release: &Release) -> Option<String> {
    release
        .label_info
        .first()
        .and_then(|info| info.label.as_ref())
        .and_then(|label| label.name.clone())
}

/// Genres first, then tags not already present.
fn extract_genres_and_tags(release: &Release) -> Vec<String> {
    let mut names: Vec<String> = release
        .genres
        .iter()
        .filter_map(|genre| genre.name.clone())
        .collect();
    for tag in &release.tags {
        if let Some(name) = &tag.name {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

fn build_overview(release: &Release) -> String {
    let mut parts = Vec::new();
    if let Some(label) = extract_label(release) {
        parts.push(format!("Label: {label}"));
    }
    if let Some(country) = &release.country {
        parts.push(format!("Country: {country}"));
    }
    if let Some(primary_type) = release
        .release_group
        .as_ref()
        .and_then(|group| group.primary_type.as_deref())
    {
        parts.push(format!("Type: {primary_type}"));
    }
    parts.join(" | ")
}

fn year_from_date(date: Option<&str>) -> Option<i32> {
    let head = date?.get(..4)?;
    if head.bytes().all(|byte| byte.is_ascii_digit()) {
        head.parse().ok()
    } else {
        None
    }
}
