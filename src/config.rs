use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub metadata: MetadataConfig,

    pub backup: BackupConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Root of user media files; covers are stored under `covers/` inside it.
    pub media_path: String,

    /// Reject cover uploads larger than this (bytes).
    pub max_cover_bytes: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/datakult.db".to_string(),
            log_level: "info".to_string(),
            media_path: "media".to_string(),
            max_cover_bytes: 10 * 1024 * 1024,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8210,
            cors_allowed_origins: vec![
                "http://localhost:8210".to_string(),
                "http://127.0.0.1:8210".to_string(),
            ],
            secure_cookies: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// TMDB API key; empty disables the films/TV provider.
    pub tmdb_api_key: String,

    /// Twitch developer credentials for IGDB; empty disables the games provider.
    pub igdb_client_id: String,
    pub igdb_client_secret: String,

    /// Language for TMDB results.
    pub language: String,

    /// Request timeout in seconds for all metadata providers.
    pub request_timeout_seconds: u32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: String::new(),
            igdb_client_id: String::new(),
            igdb_client_secret: String::new(),
            language: "fr-FR".to_string(),
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory archives are written to.
    pub directory: String,

    /// How many archives rotation keeps.
    pub keep: usize,

    /// Run export + rotation on a schedule inside the daemon.
    pub auto_enabled: bool,

    /// Cron expression (with seconds field) for the auto-backup job.
    pub cron: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: "backups".to_string(),
            keep: 10,
            auto_enabled: false,
            cron: "0 0 3 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "datakult".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    /// Lower values reduce memory usage but decrease GPU resistance.
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            metadata: MetadataConfig::default(),
            backup: BackupConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                let mut config = Self::load_from_path(path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Provider credentials may come from the environment instead of the
    /// config file, so keys never have to live on disk.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("DATAKULT_TMDB_API_KEY") {
            if !key.is_empty() {
                self.metadata.tmdb_api_key = key;
            }
        }
        if let Ok(id) = std::env::var("DATAKULT_IGDB_CLIENT_ID") {
            if !id.is_empty() {
                self.metadata.igdb_client_id = id;
            }
        }
        if let Ok(secret) = std::env::var("DATAKULT_IGDB_CLIENT_SECRET") {
            if !secret.is_empty() {
                self.metadata.igdb_client_secret = secret;
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("datakult").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".datakult").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.enabled && self.server.port == 0 {
            anyhow::bail!("Server port must be set when the server is enabled");
        }

        if self.general.max_cover_bytes == 0 {
            anyhow::bail!("max_cover_bytes must be > 0");
        }

        if self.backup.keep == 0 {
            anyhow::bail!("Backup rotation must keep at least one archive");
        }

        if self.backup.auto_enabled && self.backup.cron.trim().is_empty() {
            anyhow::bail!("Auto-backup requires a cron expression");
        }

        if self.metadata.language.trim().is_empty() {
            anyhow::bail!("Metadata language cannot be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8210);
        assert_eq!(config.general.max_cover_bytes, 10 * 1024 * 1024);
        assert_eq!(config.backup.keep, 10);
        assert_eq!(config.metadata.language, "fr-FR");
        assert_eq!(config.security.argon2_memory_cost_kib, 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[metadata]"));
        assert!(toml_str.contains("[backup]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [backup]
            keep = 3
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.backup.keep, 3);

        assert_eq!(config.server.port, 8210);
        assert!(config.metadata.tmdb_api_key.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_keep() {
        let mut config = Config::default();
        config.backup.keep = 0;
        assert!(config.validate().is_err());
    }
}
