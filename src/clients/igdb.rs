use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Datelike;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{LookupDetails, LookupResult, MIN_QUERY_LENGTH, SEARCH_LIMIT};

const IGDB_API: &str = "https://api.igdb.com/v4";
const TWITCH_AUTH_URL: &str = "https://id.twitch.tv/oauth2/token";
const IGDB_IMAGE_BASE: &str = "https://images.igdb.com/igdb/image/upload/";

/// Refresh the Twitch token this long before it actually expires.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Default)]
struct TokenCache {
    access_token: Option<String>,
    expires_at: Option<Instant>,
}

#[derive(Debug, Deserialize)]
struct Game {
    id: i64,
    name: Option<String>,
    first_release_date: Option<i64>,
    summary: Option<String>,
    cover: Option<Cover>,
    url: Option<String>,
    #[serde(default)]
    involved_companies: Vec<InvolvedCompany>,
    #[serde(default)]
    genres: Vec<NamedEntry>,
}

#[derive(Debug, Deserialize)]
struct Cover {
    image_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvolvedCompany {
    company: Option<NamedEntry>,
    #[serde(default)]
    developer: bool,
    #[serde(default)]
    publisher: bool,
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: Option<String>,
}

/// Client for the IGDB video-game catalog. Authenticates through the Twitch
/// client-credentials flow; the access token is cached on the client instance
/// and shared across clones.
#[derive(Clone)]
pub struct IgdbClient {
    client_id: String,
    client_secret: String,
    client: Client,
    token: Arc<Mutex<TokenCache>>,
}

impl IgdbClient {
    pub fn with_shared_client(client: Client, client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            client,
            token: Arc::new(Mutex::new(TokenCache::default())),
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    async fn access_token(&self) -> Result<String> {
        let mut cache = self.token.lock().await;

        if let (Some(token), Some(expires_at)) = (&cache.access_token, cache.expires_at) {
            if expires_at > Instant::now() + TOKEN_EXPIRY_BUFFER {
                return Ok(token.clone());
            }
        }

        let response = self
            .client
            .post(TWITCH_AUTH_URL)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Twitch auth error: {} - {}", status, body));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME));

        cache.access_token = Some(token.access_token.clone());
        cache.expires_at = Some(Instant::now() + lifetime);

        Ok(token.access_token)
    }

    /// IGDB takes POST requests whose body is an Apicalypse query string.
    async fn request(&self, endpoint: &str, body: String) -> Result<Vec<Game>> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!("{IGDB_API}/{endpoint}"))
            .header("Client-ID", &self.client_id)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "text/plain")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("IGDB API error: {} - {}", status, body));
        }

        Ok(response.json().await?)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<LookupResult>> {
        if query.trim().len() < MIN_QUERY_LENGTH {
            return Ok(Vec::new());
        }

        let safe_query = escape_apicalypse(query);
        let body = format!(
            "search \"{safe_query}\"; fields name, first_release_date, summary, cover.image_id; limit {SEARCH_LIMIT};"
        );

        let games = self.request("games", body).await?;

        Ok(games.into_iter().map(map_search_game).collect())
    }

    pub async fn get_details(&self, id: &str) -> Result<Option<LookupDetails>> {
        let Ok(game_id) = id.parse::<i64>() else {
            return Ok(None);
        };

        let body = format!(
            "fields name, first_release_date, summary, url, cover.image_id, \
             involved_companies.company.name, involved_companies.developer, \
             involved_companies.publisher, genres.name; where id = {game_id};"
        );

        let games = self.request("games", body).await?;

        Ok(games.into_iter().next().map(map_game_details))
    }

    pub async fn download_cover(&self, cover_url: &str) -> Result<Option<Vec<u8>>> {
        if !cover_url.starts_with(IGDB_IMAGE_BASE) {
            anyhow::bail!("Invalid IGDB cover URL: {cover_url}");
        }

        let response = self.client.get(cover_url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow::anyhow!("IGDB image error: {} - {}", status, cover_url));
        }

        Ok(Some(response.bytes().await?.to_vec()))
    }
}

fn map_search_game(game: Game) -> LookupResult {
    let image_id = game.cover.as_ref().and_then(|cover| cover.image_id.as_deref());

    LookupResult {
        id: game.id.to_string(),
        title: game.name.clone().unwrap_or_default(),
        year: year_from_timestamp(game.first_release_date),
        byline: String::new(),
        overview: game.summary.clone().unwrap_or_default(),
        media_type: "GAME".to_string(),
        cover_url: image_url(image_id, "cover_big"),
        thumb_url: image_url(image_id, "cover_small"),
    }
}

fn map_game_details(game: Game) -> LookupDetails {
    let mut developers = Vec::new();
    let mut publishers = Vec::new();
    for involved in &game.involved_companies {
        let Some(name) = involved.company.as_ref().and_then(|company| company.name.clone()) else {
            continue;
        };
        if involved.developer && !developers.contains(&name) {
            developers.push(name.clone());
        }
        if involved.publisher && !publishers.contains(&name) {
            publishers.push(name);
        }
    }
    // Publishers only stand in when no developer is credited.
    let contributors = if developers.is_empty() { publishers } else { developers };

    let genres = game
        .genres
        .iter()
        .filter_map(|genre| genre.name.clone())
        .collect();

    let image_id = game.cover.as_ref().and_then(|cover| cover.image_id.as_deref());
    let cover_url = image_url(image_id, "cover_big");

    LookupDetails {
        title: game.name.clone().unwrap_or_default(),
        year: year_from_timestamp(game.first_release_date),
        overview: game.summary.clone().unwrap_or_default(),
        contributors,
        genres,
        media_type: "GAME".to_string(),
        cover_url,
        external_url: game
            .url
            .clone()
            .unwrap_or_else(|| format!("https://www.igdb.com/games/{}", game.id)),
    }
}

/// Escapes user input for interpolation into an Apicalypse string literal.
fn escape_apicalypse(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ")
        .trim()
        .to_string()
}

fn year_from_timestamp(timestamp: Option<i64>) -> Option<i32> {
    chrono::DateTime::from_timestamp(timestamp?, 0).map(|date| date.year())
}

fn image_url(image_id: Option<&str>, size: &str) -> Option<String> {
    image_id.map(|id| format!("{IGDB_IMAGE_BASE}t_{size}/{id}.jpg"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_apicalypse() {
        assert_eq!(escape_apicalypse("zelda"), "zelda");
        assert_eq!(escape_apicalypse(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_apicalypse(r"back\slash"), r"back\\slash");
        assert_eq!(escape_apicalypse("two\nlines "), "two lines");
    }

    #[test]
    fn test_year_from_timestamp() {
        // 2017-03-03, release date of Breath of the Wild.
        assert_eq!(year_from_timestamp(Some(1_488_499_200)), Some(2017));
        assert_eq!(year_from_timestamp(None), None);
    }

    #[test]
    fn test_image_url() {
        assert_eq!(
            image_url(Some("co1wyy"), "cover_big").as_deref(),
            Some("https://images.igdb.com/igdb/image/upload/t_cover_big/co1wyy.jpg")
        );
        assert_eq!(image_url(None, "cover_big"), None);
    }

    #[test]
    fn test_details_contributors_prefer_developers() {
        let game = Game {
            id: 7346,
            name: Some("The Legend of Zelda: Breath of the Wild".to_string()),
            first_release_date: Some(1_488_499_200),
            summary: Some("Open-air adventure.".to_string()),
            cover: Some(Cover {
                image_id: Some("co3p2d".to_string()),
            }),
            url: None,
            involved_companies: vec![
                InvolvedCompany {
                    company: Some(NamedEntry {
                        name: Some("Nintendo EPD".to_string()),
                    }),
                    developer: true,
                    publisher: false,
                },
                InvolvedCompany {
                    company: Some(NamedEntry {
                        name: Some("Nintendo".to_string()),
                    }),
                    developer: false,
                    publisher: true,
                },
            ],
            genres: vec![NamedEntry {
                name: Some("Adventure".to_string()),
            }],
        };

        let details = map_game_details(game);
        assert_eq!(details.contributors, vec!["Nintendo EPD"]);
        assert_eq!(details.genres, vec!["Adventure"]);
        assert_eq!(details.year, Some(2017));
        assert_eq!(details.media_type, "GAME");
        assert_eq!(details.external_url, "https://www.igdb.com/games/7346");
        assert_eq!(
            details.cover_url.as_deref(),
            Some("https://images.igdb.com/igdb/image/upload/t_cover_big/co3p2d.jpg")
        );
    }
}
