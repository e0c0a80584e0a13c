//! Configuration settings structure
//!
//! Defines the main settings structure and loading logic for the web client.

use crate::governor::DelayRange;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration settings for the web client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Platform endpoints and browser identity
    pub platform: PlatformSettings,
    /// Transport behaviour (timeouts, retries, pacing)
    pub transport: TransportSettings,
    /// Hourly / daily action ceilings
    pub limits: LimitSettings,
    /// Human-like pauses around governed actions
    pub delays: DelaySettings,
    /// Session snapshot persistence
    pub session: SessionSettings,
    /// External media tools
    pub upload: UploadSettings,
    /// Logging configuration
    pub logging: LoggingSettings,
    /// Account credentials
    pub credentials: CredentialSettings,
}

/// Platform endpoints and the browser the client presents as
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    /// Web root, used for login, legacy web-form calls and GraphQL queries
    pub base_url: String,
    /// Versioned API root
    pub api_url: String,
    /// Host receiving binary uploads
    pub upload_url: String,
    /// Public web application id sent as `X-IG-App-ID`
    pub app_id: String,
    /// Browser user agent
    pub user_agent: String,
    /// `Accept-Language` header value
    pub accept_language: String,
    /// Timezone offset in seconds reported by configure calls
    pub timezone_offset: i32,
}

/// Transport behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Timeout for binary upload requests in seconds
    pub upload_timeout_secs: u64,
    /// Retries after the first attempt when the platform answers 429
    pub max_retries: u32,
    /// Backoff unit in milliseconds; attempt `n` waits `n * backoff_base_ms`
    pub backoff_base_ms: u64,
    /// Unconditional pause before every request
    pub request_delay: DelayRange,
    /// Pause between pages of a cursor-paginated listing
    pub page_delay: DelayRange,
    /// Optional proxy URL (http, https or socks5)
    pub proxy: Option<String>,
}

/// Per action-kind hourly ceilings plus a daily ceiling over all kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub follows: u32,
    pub unfollows: u32,
    pub likes: u32,
    pub comments: u32,
    pub daily_actions: u32,
}

/// Pauses applied after successful governed actions and before configure calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelaySettings {
    pub follow: DelayRange,
    pub unfollow: DelayRange,
    pub like: DelayRange,
    pub comment: DelayRange,
    /// Pause between fetching the CSRF cookie and submitting credentials
    pub login: DelayRange,
    pub before_photo_configure: DelayRange,
    pub before_video_configure: DelayRange,
}

/// Session snapshot persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Snapshot file location
    pub path: PathBuf,
    /// Snapshots older than this are discarded without probing
    pub max_age_days: i64,
}

/// External tools used to probe videos and extract thumbnail frames
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub ffprobe_path: String,
    pub ffmpeg_path: String,
    pub probe_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,
    /// Enable verbose logging
    pub verbose: bool,
}

/// Account credentials. The password is never read from or written to files.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
}

impl std::fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSettings")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.instagram.com".to_string(),
            api_url: "https://www.instagram.com/api/v1".to_string(),
            upload_url: "https://www.instagram.com".to_string(),
            app_id: "936619743392459".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            timezone_offset: -10800,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            upload_timeout_secs: 120,
            max_retries: 2,
            backoff_base_ms: 30_000,
            request_delay: DelayRange::new(500, 1_500),
            page_delay: DelayRange::new(1_000, 3_000),
            proxy: None,
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            follows: 20,
            unfollows: 25,
            likes: 30,
            comments: 8,
            daily_actions: 400,
        }
    }
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            follow: DelayRange::new(8_000, 15_000),
            unfollow: DelayRange::new(5_000, 10_000),
            like: DelayRange::new(2_000, 5_000),
            comment: DelayRange::new(10_000, 20_000),
            login: DelayRange::new(1_000, 3_000),
            before_photo_configure: DelayRange::new(2_000, 4_000),
            before_video_configure: DelayRange::new(3_000, 6_000),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: base.join("gramweb").join("session.json"),
            max_age_days: 30,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            ffprobe_path: "ffprobe".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            probe_timeout_secs: 30,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            verbose: false,
        }
    }
}

impl TransportSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

impl Settings {
    /// Create new settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file; missing sections keep their defaults
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from environment variables on top of the defaults
    pub fn from_env() -> crate::Result<Self> {
        Self::default().merge_with_env()
    }

    /// Apply environment variable overrides
    pub fn merge_with_env(mut self) -> crate::Result<Self> {
        if let Ok(username) = std::env::var("IG_USERNAME")
            && !username.trim().is_empty()
        {
            self.credentials.username = Some(username.trim().to_string());
        }
        if let Ok(password) = std::env::var("IG_PASSWORD")
            && !password.is_empty()
        {
            self.credentials.password = Some(password);
        }
        if let Ok(proxy) = std::env::var("PROXY_URL")
            && !proxy.trim().is_empty()
        {
            self.transport.proxy = Some(proxy.trim().to_string());
        }
        if let Ok(path) = std::env::var("GRAMWEB_SESSION_FILE") {
            self.session.path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("GRAMWEB_LOG_LEVEL") {
            self.logging.level = level;
        }

        // Request pacing is configured in seconds in the environment
        if let Some(min) = env_secs_as_ms("MIN_DELAY")? {
            self.transport.request_delay.min_ms = min;
        }
        if let Some(max) = env_secs_as_ms("MAX_DELAY")? {
            self.transport.request_delay.max_ms = max;
        }

        if let Some(v) = env_u32("MAX_LIKES_PER_HOUR")? {
            self.limits.likes = v;
        }
        if let Some(v) = env_u32("MAX_FOLLOWS_PER_HOUR")? {
            self.limits.follows = v;
        }
        if let Some(v) = env_u32("MAX_UNFOLLOWS_PER_HOUR")? {
            self.limits.unfollows = v;
        }
        if let Some(v) = env_u32("MAX_COMMENTS_PER_HOUR")? {
            self.limits.comments = v;
        }
        if let Some(v) = env_u32("MAX_ACTIONS_PER_DAY")? {
            self.limits.daily_actions = v;
        }

        Ok(self)
    }

    /// Check that the settings describe a usable client
    pub fn validate(&self) -> crate::Result<()> {
        for (name, value) in [
            ("platform.base_url", &self.platform.base_url),
            ("platform.api_url", &self.platform.api_url),
            ("platform.upload_url", &self.platform.upload_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| crate::Error::config(format!("Invalid {}: {}", name, e)))?;
        }

        if let Some(proxy) = &self.transport.proxy {
            url::Url::parse(proxy)
                .map_err(|e| crate::Error::config(format!("Invalid proxy URL: {}", e)))?;
        }

        for (name, range) in [
            ("transport.request_delay", &self.transport.request_delay),
            ("transport.page_delay", &self.transport.page_delay),
            ("delays.follow", &self.delays.follow),
            ("delays.unfollow", &self.delays.unfollow),
            ("delays.like", &self.delays.like),
            ("delays.comment", &self.delays.comment),
            ("delays.login", &self.delays.login),
            ("delays.before_photo_configure", &self.delays.before_photo_configure),
            ("delays.before_video_configure", &self.delays.before_video_configure),
        ] {
            if range.min_ms > range.max_ms {
                return Err(crate::Error::config(format!(
                    "{}: min {}ms exceeds max {}ms",
                    name, range.min_ms, range.max_ms
                )));
            }
        }

        if self.limits.follows == 0
            || self.limits.unfollows == 0
            || self.limits.likes == 0
            || self.limits.comments == 0
            || self.limits.daily_actions == 0
        {
            return Err(crate::Error::config("Action ceilings must be non-zero"));
        }

        if self.session.max_age_days <= 0 {
            return Err(crate::Error::config("session.max_age_days must be positive"));
        }

        Ok(())
    }

    /// Point every platform endpoint at one origin (staging hosts, local mocks)
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.platform.base_url = base.to_string();
        self.platform.api_url = format!("{}/api/v1", base);
        self.platform.upload_url = base.to_string();
        self
    }

    /// Disable every intentional pause and backoff wait
    pub fn without_delays(mut self) -> Self {
        self.transport.request_delay = DelayRange::ZERO;
        self.transport.page_delay = DelayRange::ZERO;
        self.transport.backoff_base_ms = 0;
        self.delays = DelaySettings {
            follow: DelayRange::ZERO,
            unfollow: DelayRange::ZERO,
            like: DelayRange::ZERO,
            comment: DelayRange::ZERO,
            login: DelayRange::ZERO,
            before_photo_configure: DelayRange::ZERO,
            before_video_configure: DelayRange::ZERO,
        };
        self
    }
}

fn env_u32(name: &str) -> crate::Result<Option<u32>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| crate::Error::Config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

fn env_secs_as_ms(name: &str) -> crate::Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => {
            let secs: f64 = value
                .trim()
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid {}: {}", name, e)))?;
            if secs < 0.0 {
                return Err(crate::Error::Config(format!("{} must not be negative", name)));
            }
            Ok(Some((secs * 1000.0).round() as u64))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.platform.base_url, "https://www.instagram.com");
        assert_eq!(settings.transport.max_retries, 2);
        assert_eq!(settings.limits.follows, 20);
        assert_eq!(settings.limits.likes, 30);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_with_base_url() {
        let settings = Settings::new().with_base_url("http://127.0.0.1:9000/");
        assert_eq!(settings.platform.base_url, "http://127.0.0.1:9000");
        assert_eq!(settings.platform.api_url, "http://127.0.0.1:9000/api/v1");
        assert_eq!(settings.platform.upload_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_without_delays() {
        let settings = Settings::new().without_delays();
        assert!(settings.transport.request_delay.is_zero());
        assert!(settings.delays.follow.is_zero());
        assert_eq!(settings.transport.backoff_base_ms, 0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut settings = Settings::default();
        settings.delays.like = DelayRange::new(5_000, 1_000);
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("delays.like"));
    }

    #[test]
    fn test_validate_rejects_zero_ceiling() {
        let mut settings = Settings::default();
        settings.limits.comments = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let credentials = CredentialSettings {
            username: Some("alice".to_string()),
            password: Some("hunter2".to_string()),
        };
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
