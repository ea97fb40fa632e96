use std::net::IpAddr;
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tokio::net::lookup_host;
use url::Url;

use super::{LookupDetails, LookupResult, MIN_QUERY_LENGTH};

const TMDB_API: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/";
const TMDB_IMAGE_HOST: &str = "image.tmdb.org";

fn poster_path_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^/t/p/w\d+/[a-zA-Z0-9]+\.[a-z]{3,4}$").ok())
        .as_ref()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: i64,
    media_type: Option<String>,
    title: Option<String>,
    original_title: Option<String>,
    name: Option<String>,
    original_name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TitleDetails {
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    created_by: Vec<NamedEntry>,
    #[serde(default)]
    production_companies: Vec<NamedEntry>,
    #[serde(default)]
    genres: Vec<NamedEntry>,
    credits: Option<Credits>,
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Credits {
    #[serde(default)]
    crew: Vec<CrewMember>,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    name: Option<String>,
    job: Option<String>,
}

/// Client for The Movie Database. Covers both movies and TV shows; item
/// identifiers carry the kind as a `movie:{id}` / `tv:{id}` prefix because
/// the two live in separate TMDB endpoints.
#[derive(Clone)]
pub struct TmdbClient {
    api_key: String,
    language: String,
    client: Client,
    download_client: Client,
}

impl TmdbClient {
    pub const fn with_shared_client(
        client: Client,
        download_client: Client,
        api_key: String,
        language: String,
    ) -> Self {
        Self {
            api_key,
            language,
            client,
            download_client,
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<LookupResult>> {
        if query.trim().len() < MIN_QUERY_LENGTH {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/search/multi?api_key={}&query={}&language={}&include_adult=false",
            TMDB_API,
            self.api_key,
            urlencoding::encode(query),
            self.language
        );
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("TMDB API error: {} - {}", status, body));
        }

        let response: SearchResponse = response.json().await?;

        Ok(response.results.iter().filter_map(map_search_item).collect())
    }

    pub async fn get_details(&self, id: &str) -> Result<Option<LookupDetails>> {
        let Some((kind, tmdb_id)) = parse_item_id(id) else {
            return Ok(None);
        };

        let url = format!(
            "{}/{}/{}?api_key={}&language={}&append_to_response=credits",
            TMDB_API, kind, tmdb_id, self.api_key, self.language
        );
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("TMDB API error: {} - {}", status, body));
        }

        let details: TitleDetails = response.json().await?;

        Ok(Some(map_details(kind, tmdb_id, &details)))
    }

    /// Downloads a poster after checking the URL against the TMDB image CDN
    /// allowlist. Redirect responses are rejected rather than followed.
    pub async fn download_poster(&self, poster_url: &str) -> Result<Option<Vec<u8>>> {
        validate_poster_url(poster_url).await?;

        let response = self.download_client.get(poster_url).send().await?;

        if response.status().is_redirection() {
            anyhow::bail!("TMDB poster URL answered with a redirect: {poster_url}");
        }

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow::anyhow!("TMDB image error: {} - {}", status, poster_url));
        }

        Ok(Some(response.bytes().await?.to_vec()))
    }
}

fn map_search_item(item: &SearchItem) -> Option<LookupResult> {
    let kind = item.media_type.as_deref()?;
    let (title, original_title, date) = match kind {
        "movie" => (&item.title, &item.original_title, &item.release_date),
        "tv" => (&item.name, &item.original_name, &item.first_air_date),
        _ => return None,
    };

    let title = title.clone().unwrap_or_default();
    let original = original_title.clone().unwrap_or_default();
    let byline = if original.is_empty() || original == title {
        String::new()
    } else {
        original
    };

    Some(LookupResult {
        id: format!("{}:{}", kind, item.id),
        title,
        year: year_from_date(date.as_deref()),
        byline,
        overview: item.overview.clone().unwrap_or_default(),
        media_type: media_type_code(kind).to_string(),
        cover_url: item.poster_path.as_deref().map(|path| poster_url(path, "w500")),
        thumb_url: item.poster_path.as_deref().map(|path| poster_url(path, "w185")),
    })
}

fn map_details(kind: &str, tmdb_id: i64, details: &TitleDetails) -> LookupDetails {
    let (title, date, mut contributors) = if kind == "movie" {
        let crew = details
            .credits
            .as_ref()
            .map(|credits| credits.crew.as_slice())
            .unwrap_or_default();
        let directors: Vec<String> = crew
            .iter()
            .filter(|member| member.job.as_deref() == Some("Director"))
            .filter_map(|member| member.name.clone())
            .collect();
        (&details.title, &details.release_date, directors)
    } else {
        let creators: Vec<String> = details
            .created_by
            .iter()
            .filter_map(|person| person.name.clone())
            .collect();
        (&details.name, &details.first_air_date, creators)
    };

    for company in details.production_companies.iter().take(2) {
        if let Some(name) = &company.name {
            if !contributors.contains(name) {
                contributors.push(name.clone());
            }
        }
    }

    let genres = details
        .genres
        .iter()
        .filter_map(|genre| genre.name.clone())
        .collect();

    LookupDetails {
        title: title.clone().unwrap_or_default(),
        year: year_from_date(date.as_deref()),
        overview: details.overview.clone().unwrap_or_default(),
        contributors,
        genres,
        media_type: media_type_code(kind).to_string(),
        cover_url: details
            .poster_path
            .as_deref()
            .map(|path| poster_url(path, "w500")),
        external_url: format!("https://www.themoviedb.org/{kind}/{tmdb_id}"),
    }
}

fn parse_item_id(id: &str) -> Option<(&str, i64)> {
    let (kind, raw) = id.split_once(':')?;
    if kind != "movie" && kind != "tv" {
        return None;
    }
    raw.parse().ok().map(|tmdb_id| (kind, tmdb_id))
}

fn media_type_code(kind: &str) -> &'static str {
    if kind == "movie" { "FILM" } else { "TV" }
}

fn year_from_date(date: Option<&str>) -> Option<i32> {
    date?.get(..4)?.parse().ok()
}

fn poster_url(path: &str, size: &str) -> String {
    format!("{TMDB_IMAGE_BASE}{size}{path}")
}

async fn validate_poster_url(poster_url: &str) -> Result<()> {
    let parsed = Url::parse(poster_url)
        .map_err(|_| anyhow::anyhow!("Invalid TMDB poster URL: {poster_url}"))?;

    if parsed.scheme() != "https" {
        anyhow::bail!("Non-HTTPS poster URL rejected: {poster_url}");
    }

    if parsed.host_str() != Some(TMDB_IMAGE_HOST) {
        anyhow::bail!("Poster URL host rejected: {poster_url}");
    }

    let path_ok = poster_path_pattern().is_some_and(|pattern| pattern.is_match(parsed.path()));
    if !path_ok {
        anyhow::bail!("Poster URL path rejected: {poster_url}");
    }

    ensure_public_host(TMDB_IMAGE_HOST).await
}

/// Rejects hosts that resolve to anything other than public addresses, so a
/// poisoned DNS answer cannot turn a poster download into an internal probe.
async fn ensure_public_host(host: &str) -> Result<()> {
    let addrs = lookup_host((host, 443))
        .await
        .map_err(|err| anyhow::anyhow!("DNS resolution failed for {}: {}", host, err))?;

    for addr in addrs {
        if !is_public_ip(addr.ip()) {
            anyhow::bail!("Host {} resolves to a non-public address: {}", host, addr.ip());
        }
    }

    Ok(())
}

fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation())
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_public_ip(IpAddr::V4(mapped));
            }
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || v6.is_unique_local()
                || v6.is_unicast_link_local())
        }
    }
}
