use crate::catalog::DownloadBackend;
use crate::catalog::apify::DEFAULT_ACTOR_ID;
use crate::recognition::shazam::DEFAULT_API_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_recognition_api_url")]
    pub recognition_api_url: String,

    #[serde(default)]
    pub shazam_api_key: String,

    #[serde(default)]
    pub download_backend: DownloadBackend,

    #[serde(default)]
    pub apify_token: String,

    #[serde(default = "default_actor_id")]
    pub apify_actor_id: String,

    #[serde(default)]
    pub spotify_client_id: String,

    #[serde(default)]
    pub spotify_client_secret: String,

    #[serde(default)]
    pub rapidapi_key: String,

    #[serde(default = "default_rapidapi_host")]
    pub rapidapi_host: String,

    #[serde(default = "default_recording_duration")]
    pub recording_duration: u32,

    #[serde(default)]
    pub input_device: Option<usize>,

    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: PathBuf,

    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,

    /// Overall HTTP client timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout: u64,
}

fn default_recognition_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_actor_id() -> String {
    DEFAULT_ACTOR_ID.to_string()
}

fn default_rapidapi_host() -> String {
    "spotify-downloader9.p.rapidapi.com".to_string()
}

fn default_recording_duration() -> u32 {
    15
}

fn default_recordings_dir() -> PathBuf {
    PathBuf::from("recordings")
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_timeout() -> u64 {
    180
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recognition_api_url: default_recognition_api_url(),
            shazam_api_key: String::new(),
            download_backend: DownloadBackend::default(),
            apify_token: String::new(),
            apify_actor_id: default_actor_id(),
            spotify_client_id: String::new(),
            spotify_client_secret: String::new(),
            rapidapi_key: String::new(),
            rapidapi_host: default_rapidapi_host(),
            recording_duration: default_recording_duration(),
            input_device: None,
            recordings_dir: default_recordings_dir(),
            downloads_dir: default_downloads_dir(),
            request_timeout: default_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the default location
    /// (~/.config/flashshazam/config.json), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: Self = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            tracing::info!("Loaded config from {:?}", config_path);
            config
        } else {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save(&config_path)?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Save configuration to `config_path`
    pub fn save(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("flashshazam").join("config.json"))
    }

    /// Override file values with any variables `lookup` returns
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let string_fields: [(&str, &mut String); 6] = [
            ("SHAZAM_API_KEY", &mut self.shazam_api_key),
            ("APIFY_TOKEN", &mut self.apify_token),
            ("SPOTIFY_CLIENT_ID", &mut self.spotify_client_id),
            ("SPOTIFY_CLIENT_SECRET", &mut self.spotify_client_secret),
            ("RAPIDAPI_KEY", &mut self.rapidapi_key),
            ("RAPIDAPI_HOST", &mut self.rapidapi_host),
        ];
        for (key, field) in string_fields {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }

        if let Some(value) = lookup("DOWNLOAD_BACKEND") {
            self.download_backend = value.parse().context("Invalid DOWNLOAD_BACKEND")?;
        }
        if let Some(value) = lookup("RECORDING_DURATION") {
            self.recording_duration = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid RECORDING_DURATION: {}", value))?;
        }
        if let Some(value) = lookup("INPUT_DEVICE") {
            self.input_device = Some(
                value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid INPUT_DEVICE: {}", value))?,
            );
        }
        if let Some(value) = lookup("RECORDINGS_DIR") {
            self.recordings_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("DOWNLOADS_DIR") {
            self.downloads_dir = PathBuf::from(value);
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.recognition_api_url.is_empty() {
            return Err(anyhow::anyhow!("recognition_api_url cannot be empty"));
        }

        if self.recording_duration == 0 {
            return Err(anyhow::anyhow!("recording_duration must be at least 1 second"));
        }

        if self.request_timeout == 0 {
            return Err(anyhow::anyhow!("request_timeout must be positive"));
        }

        if self.download_backend == DownloadBackend::RapidApi && self.rapidapi_host.is_empty() {
            return Err(anyhow::anyhow!("rapidapi_host cannot be empty"));
        }

        Ok(())
    }

    /// Names of credentials the configured services need but do not have
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.shazam_api_key.is_empty() {
            missing.push("SHAZAM_API_KEY");
        }
        match self.download_backend {
            DownloadBackend::Apify => {
                if self.apify_token.is_empty() {
                    missing.push("APIFY_TOKEN");
                }
                if self.spotify_client_id.is_empty() {
                    missing.push("SPOTIFY_CLIENT_ID");
                }
                if self.spotify_client_secret.is_empty() {
                    missing.push("SPOTIFY_CLIENT_SECRET");
                }
            }
            DownloadBackend::RapidApi => {
                if self.rapidapi_key.is_empty() {
                    missing.push("RAPIDAPI_KEY");
                }
            }
        }
        missing
    }

    /// Create the recordings and downloads directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.recordings_dir, &self.downloads_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }
        Ok(())
    }
}
