use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clients::{IgdbClient, MusicBrainzClient, OpenLibraryClient, TmdbClient};
use crate::config::Config;
use crate::db::Store;
use crate::services::{BackupService, CoverService, LookupService};

const USER_AGENT: &str = concat!(
    "Datakult/",
    env!("CARGO_PKG_VERSION"),
    " (personal media catalog)"
);

/// Build a shared HTTP client with reasonable defaults for API calls.
/// This client should be reused across all HTTP-based services to enable
/// connection pooling and avoid socket exhaustion. MusicBrainz rejects
/// requests without a descriptive User-Agent, so every client carries one.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

/// Build the client used for TMDB poster downloads. Redirects are refused so
/// a validated image URL cannot bounce the request to another host.
fn build_pinned_download_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build download HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub lookup: Arc<LookupService>,

    pub covers: Arc<CoverService>,

    pub backups: Arc<BackupService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        // One pooled client for API calls, one redirect-refusing client for
        // TMDB poster downloads.
        let http_client = build_shared_http_client(config.metadata.request_timeout_seconds.into())?;
        let download_client =
            build_pinned_download_client(config.metadata.request_timeout_seconds.into())?;

        let tmdb = TmdbClient::with_shared_client(
            http_client.clone(),
            download_client,
            config.metadata.tmdb_api_key.clone(),
            config.metadata.language.clone(),
        );
        let igdb = IgdbClient::with_shared_client(
            http_client.clone(),
            config.metadata.igdb_client_id.clone(),
            config.metadata.igdb_client_secret.clone(),
        );
        let openlibrary = OpenLibraryClient::with_shared_client(http_client.clone());
        let musicbrainz = MusicBrainzClient::with_shared_client(http_client);

        let lookup = Arc::new(LookupService::new(tmdb, igdb, openlibrary, musicbrainz));
        let covers = Arc::new(CoverService::new(
            &config.general.media_path,
            config.general.max_cover_bytes,
        ));
        let backups = Arc::new(BackupService::new(
            store.clone(),
            &config.backup.directory,
            &config.general.media_path,
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            lookup,
            covers,
            backups,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
