//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Upper bound for `detection.days_lookahead` (ten years).
pub const MAX_DAYS_LOOKAHEAD: i64 = 3650;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and traversal behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Event eligibility rules
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Confirmation oracle settings
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Output artifact and persistence settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Seed URLs used when no seed is given on the command line
    #[serde(default = "defaults::seeds")]
    pub seeds: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply `SPIDER_*` / `GEMINI_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(key: &str, raw: Option<String>) -> Option<T> {
            let raw = raw?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("Ignoring unparseable {}={:?}", key, raw);
                    None
                }
            }
        }

        if let Some(v) = parsed("SPIDER_MAX_PAGES", lookup("SPIDER_MAX_PAGES")) {
            self.crawler.max_pages = v;
        }
        if let Some(v) = parsed("SPIDER_MAX_DEPTH", lookup("SPIDER_MAX_DEPTH")) {
            self.crawler.max_depth = v;
        }
        if let Some(v) = parsed(
            "SPIDER_CONCURRENT_REQUESTS",
            lookup("SPIDER_CONCURRENT_REQUESTS"),
        ) {
            self.crawler.max_concurrent = v;
        }
        if let Some(v) = parsed("SPIDER_DAYS_LOOKAHEAD", lookup("SPIDER_DAYS_LOOKAHEAD")) {
            self.detection.days_lookahead = v;
        }
        if let Some(v) = parsed("SPIDER_MIN_CONFIDENCE", lookup("SPIDER_MIN_CONFIDENCE")) {
            self.detection.min_confidence = v;
        }
        if let Some(raw) = lookup("SPIDER_SEED_URLS") {
            let seeds: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !seeds.is_empty() {
                self.seeds = seeds;
            }
        }
        if let Some(model) = lookup("GEMINI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.oracle.model = model.trim().to_string();
        }
        if let Some(v) = parsed("GEMINI_TIMEOUT_S", lookup("GEMINI_TIMEOUT_S")) {
            self.oracle.timeout_secs = v;
        }
        if let Some(v) = parsed("GEMINI_MAX_RETRIES", lookup("GEMINI_MAX_RETRIES")) {
            self.oracle.max_retries = v;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::validation("crawler.max_pages must be > 0"));
        }
        RegexSet::new(&self.crawler.priority_patterns).map_err(|e| {
            AppError::validation(format!("crawler.priority_patterns is invalid: {e}"))
        })?;
        if !(0..=MAX_DAYS_LOOKAHEAD).contains(&self.detection.days_lookahead) {
            return Err(AppError::validation(format!(
                "detection.days_lookahead must be within [0, {MAX_DAYS_LOOKAHEAD}]"
            )));
        }
        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(AppError::validation(
                "detection.min_confidence must be within [0, 1]",
            ));
        }
        self.detection.tz()?;
        if self.oracle.model.trim().is_empty() {
            return Err(AppError::validation("oracle.model is empty"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(AppError::validation("oracle.timeout_secs must be > 0"));
        }
        if self.oracle.max_description_chars == 0 {
            return Err(AppError::validation(
                "oracle.max_description_chars must be > 0",
            ));
        }
        if self.output.source_tag.trim().is_empty() {
            return Err(AppError::validation("output.source_tag is empty"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            detection: DetectionConfig::default(),
            oracle: OracleConfig::default(),
            output: OutputConfig::default(),
            seeds: defaults::seeds(),
        }
    }
}

/// HTTP client and traversal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Total request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Polite delay between dequeues in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum in-flight requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Page cap per seed traversal
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Maximum link depth from the seed
    #[serde(default = "defaults::max_depth")]
    pub max_depth: usize,

    /// Only follow links on the seed's host[:port]
    #[serde(default = "defaults::same_site")]
    pub restrict_to_same_site: bool,

    /// Stop dequeuing after this many seconds (unbounded if unset)
    #[serde(default)]
    pub max_runtime_secs: Option<u64>,

    /// URL regexes that send a link to the priority queue
    #[serde(default = "defaults::priority_patterns")]
    pub priority_patterns: Vec<String>,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn max_runtime(&self) -> Option<Duration> {
        self.max_runtime_secs.map(Duration::from_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            max_pages: defaults::max_pages(),
            max_depth: defaults::max_depth(),
            restrict_to_same_site: defaults::same_site(),
            max_runtime_secs: None,
            priority_patterns: defaults::priority_patterns(),
        }
    }
}

/// Event eligibility settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Forward horizon (days) within which an event must start
    #[serde(default = "defaults::days_lookahead")]
    pub days_lookahead: i64,

    /// Minimum oracle confidence to accept an event
    #[serde(default = "defaults::min_confidence")]
    pub min_confidence: f64,

    /// IANA zone assumed for timezone-naive event dates
    #[serde(default = "defaults::timezone")]
    pub timezone: String,
}

impl DetectionConfig {
    /// Resolve the configured timezone name.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|e| {
            AppError::validation(format!(
                "detection.timezone '{}' is not a known zone: {e}",
                self.timezone
            ))
        })
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            days_lookahead: defaults::days_lookahead(),
            min_confidence: defaults::min_confidence(),
            timezone: defaults::timezone(),
        }
    }
}

/// Confirmation oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// API root of the generative language endpoint
    #[serde(default = "defaults::oracle_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "defaults::oracle_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "defaults::oracle_api_key_env")]
    pub api_key_env: String,

    /// Per-call timeout in seconds
    #[serde(default = "defaults::oracle_timeout")]
    pub timeout_secs: u64,

    /// Attempts per confirmation (at least one is always made)
    #[serde(default = "defaults::oracle_max_retries")]
    pub max_retries: usize,

    /// Description characters sent in the prompt
    #[serde(default = "defaults::max_description_chars")]
    pub max_description_chars: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::oracle_base_url(),
            model: defaults::oracle_model(),
            api_key_env: defaults::oracle_api_key_env(),
            timeout_secs: defaults::oracle_timeout(),
            max_retries: defaults::oracle_max_retries(),
            max_description_chars: defaults::max_description_chars(),
        }
    }
}

/// Output artifact and persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON artifact path for accepted events
    #[serde(default = "defaults::output_path")]
    pub path: String,

    /// Source tag used as the second half of the persistence key
    #[serde(default = "defaults::source_tag")]
    pub source_tag: String,

    /// File backing the local event store
    #[serde(default = "defaults::store_path")]
    pub store_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: defaults::output_path(),
            source_tag: defaults::source_tag(),
            store_path: defaults::store_path(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "FoodSpider/2.0 (+free food event crawler)".into()
    }
    pub fn timeout() -> u64 {
        20
    }
    pub fn request_delay() -> u64 {
        100
    }
    pub fn max_concurrent() -> usize {
        10
    }
    pub fn max_pages() -> usize {
        300
    }
    pub fn max_depth() -> usize {
        3
    }
    pub fn same_site() -> bool {
        true
    }
    pub fn priority_patterns() -> Vec<String> {
        vec![
            r"/events?/".into(),
            r"/calendar/".into(),
            r"/event-details/".into(),
            r"/registration/".into(),
            r"/programs/".into(),
            r"/activities/".into(),
            r"localist\.com".into(),
            r"eventbrite\.com".into(),
            r"facebook\.com/events".into(),
            r"meetup\.com".into(),
        ]
    }

    // Detection defaults
    pub fn days_lookahead() -> i64 {
        90
    }
    pub fn min_confidence() -> f64 {
        0.60
    }
    pub fn timezone() -> String {
        "America/New_York".into()
    }

    // Oracle defaults
    pub fn oracle_base_url() -> String {
        "https://generativelanguage.googleapis.com".into()
    }
    pub fn oracle_model() -> String {
        "gemini-2.0-flash".into()
    }
    pub fn oracle_api_key_env() -> String {
        "GEMINI_API_KEY".into()
    }
    pub fn oracle_timeout() -> u64 {
        12
    }
    pub fn oracle_max_retries() -> usize {
        2
    }
    pub fn max_description_chars() -> usize {
        3000
    }

    // Output defaults
    pub fn output_path() -> String {
        "free_food_events.json".into()
    }
    pub fn source_tag() -> String {
        "foodspider".into()
    }
    pub fn store_path() -> String {
        "data/events.json".into()
    }

    pub fn seeds() -> Vec<String> {
        vec!["https://events.umass.edu".into()]
    }
}
