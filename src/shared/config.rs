//! Application configuration. Backend URL, credentials, paths, tuning.

use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Backend API base URL, e.g. `http://localhost:8000/api`. Read from
    /// DOCFLOW_API_BASE_URL. Unset means run against the built-in mock.
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Backend account. Read from DOCFLOW_USERNAME / DOCFLOW_PASSWORD.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds (default 30). Read from
    /// DOCFLOW_REQUEST_TIMEOUT_SECS.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Upload timeout in seconds (default 60). Read from
    /// DOCFLOW_UPLOAD_TIMEOUT_SECS.
    #[serde(default)]
    pub upload_timeout_secs: Option<u64>,

    /// Extra attempts after the first failure (default 2). Read from
    /// DOCFLOW_RETRY_ATTEMPTS.
    #[serde(default)]
    pub retry_attempts: Option<u32>,

    /// Delay between retry attempts in ms (default 1000). Read from
    /// DOCFLOW_RETRY_DELAY_MS.
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,

    /// Where the bearer tokens are persisted. Read from DOCFLOW_TOKEN_PATH.
    #[serde(default)]
    pub token_path: Option<String>,

    /// Where downloaded documents are written. Read from
    /// DOCFLOW_DOWNLOAD_DIR.
    #[serde(default)]
    pub download_dir: Option<String>,

    /// Simulated latency of the mock backend in ms (default 150). Read from
    /// DOCFLOW_MOCK_DELAY_MS.
    #[serde(default)]
    pub mock_delay_ms: Option<u64>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("DOCFLOW"));
        if let Ok(path) = std::env::var("DOCFLOW_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c.build()?.try_deserialize()
    }

    pub fn request_timeout_secs_or_default(&self) -> u64 {
        self.request_timeout_secs.unwrap_or(30)
    }

    pub fn upload_timeout_secs_or_default(&self) -> u64 {
        self.upload_timeout_secs.unwrap_or(60)
    }

    pub fn retry_attempts_or_default(&self) -> u32 {
        self.retry_attempts
            .unwrap_or(crate::usecases::retry::DEFAULT_MAX_RETRIES)
    }

    pub fn retry_delay_ms_or_default(&self) -> u64 {
        self.retry_delay_ms
            .unwrap_or(crate::usecases::retry::DEFAULT_RETRY_DELAY_MS)
    }

    pub fn token_path_or_default(&self) -> String {
        self.token_path
            .clone()
            .unwrap_or_else(|| "./tokens.json".to_string())
    }

    pub fn download_dir_or_default(&self) -> String {
        self.download_dir
            .clone()
            .unwrap_or_else(|| "./downloads".to_string())
    }

    pub fn mock_delay_ms_or_default(&self) -> u64 {
        self.mock_delay_ms.unwrap_or(150)
    }

    /// True when a real backend is configured; otherwise the mock is used.
    pub fn is_backend_configured(&self) -> bool {
        self.api_base_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::default();
        assert_eq!(config.request_timeout_secs_or_default(), 30);
        assert_eq!(config.upload_timeout_secs_or_default(), 60);
        assert_eq!(config.retry_attempts_or_default(), 2);
        assert_eq!(config.retry_delay_ms_or_default(), 1_000);
        assert_eq!(config.token_path_or_default(), "./tokens.json");
        assert_eq!(config.download_dir_or_default(), "./downloads");
        assert!(!config.is_backend_configured());
    }

    #[test]
    fn blank_base_url_counts_as_unconfigured() {
        let config = AppConfig {
            api_base_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!config.is_backend_configured());
    }
}
