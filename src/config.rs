//! Configuration types for content-export
//!
//! Settings are read from a base JSON file plus an optional local overlay
//! (typically holding client secrets) that is deep-merged over it.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};
use url::Url;

/// Placeholder replaced with the current cursor in query templates
pub const LAST_ID_PLACEHOLDER: &str = "{lastId}";

/// Placeholder replaced with the page size in query templates
pub const TAKE_PLACEHOLDER: &str = "{take}";

/// Content API connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API site, also used to resolve relative media URLs
    pub site_url: Url,

    /// Path of the GraphQL endpoint relative to `site_url` (default: "/api/v1/graphql")
    #[serde(default = "default_graphql_path")]
    pub graphql_path: String,

    /// Per-request HTTP timeout (default: 100 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

/// OAuth2 client-credentials settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Identity service base URL; the token endpoint is `<identity_url>/connect/token`
    #[serde(default)]
    pub identity_url: String,

    /// OAuth client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,

    /// Space separated scopes requested with the token
    #[serde(default)]
    pub scopes: String,
}

/// Export behavior (destinations, paging, concurrency, queries)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Root folder for exported item JSON files
    pub export_path: PathBuf,

    /// Root folder for downloaded media
    pub media_path: PathBuf,

    /// Page size substituted for `{take}` (default: 1000)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum items processed concurrently within a page (default: 3)
    #[serde(default = "default_parallel_tasks")]
    pub parallel_tasks: usize,

    /// Starting cursor for every node type (default: 99999999)
    #[serde(default = "default_upper_limit_id")]
    pub upper_limit_id: i64,

    /// Maximum length of the node name part of an item file name (default: 50)
    #[serde(default = "default_file_name_max_len")]
    pub file_name_max_len: usize,

    /// Node type alias → query template, processed in declaration order
    #[serde(default)]
    pub queries: IndexMap<String, String>,
}

/// Retry configuration for transient API statuses
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (default: 60 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Maximum delay between retries (default: 3600 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay: default_max_delay(),
            jitter: false,
        }
    }
}

/// Log file settings (console output is always on)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogConfig {
    /// Also write a plain-text log file for the run (default: true)
    #[serde(default = "default_true")]
    pub file_enabled: bool,

    /// Folder for log files (default: the folder containing `export.export_path`)
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_enabled: true,
            directory: None,
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Content API connection
    pub api: ApiConfig,

    /// Credentials for the bearer token
    #[serde(default)]
    pub auth: AuthConfig,

    /// Export destinations and paging
    pub export: ExportConfig,

    /// Retry policy for API calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Run log file
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a base file and an optional overlay file.
    ///
    /// A missing overlay is not an error. Overlay objects are merged key by
    /// key into the base; any other overlay value replaces the base value.
    /// Files in the legacy `Unily`/`GraphQl` layout are translated first.
    pub fn load(base: &Path, overlay: Option<&Path>) -> Result<Self> {
        let mut value = read_json(base)?;
        upgrade_legacy_layout(&mut value);

        if let Some(overlay) = overlay
            && overlay.exists()
        {
            let mut overlay = read_json(overlay)?;
            upgrade_legacy_layout(&mut overlay);
            merge_json(&mut value, overlay);
        }

        let config: Config = serde_json::from_value(value).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", base.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check required settings and value ranges
    pub fn validate(&self) -> Result<()> {
        if self.export.export_path.as_os_str().is_empty() {
            return Err(Error::config("export.export_path", "export path cannot be empty"));
        }
        if self.export.media_path.as_os_str().is_empty() {
            return Err(Error::config("export.media_path", "media path cannot be empty"));
        }
        if self.export.batch_size == 0 {
            return Err(Error::config("export.batch_size", "must be greater than zero"));
        }
        if self.export.parallel_tasks == 0 {
            return Err(Error::config("export.parallel_tasks", "must be greater than zero"));
        }
        if self.export.queries.is_empty() {
            return Err(Error::config("export.queries", "no node type queries configured"));
        }
        for (alias, template) in &self.export.queries {
            for placeholder in [LAST_ID_PLACEHOLDER, TAKE_PLACEHOLDER] {
                if !template.contains(placeholder) {
                    return Err(Error::config(
                        format!("export.queries.{alias}"),
                        format!("query template is missing the {placeholder} placeholder"),
                    ));
                }
            }
        }

        let auth = [
            ("auth.identity_url", &self.auth.identity_url),
            ("auth.client_id", &self.auth.client_id),
            ("auth.client_secret", &self.auth.client_secret),
            ("auth.scopes", &self.auth.scopes),
        ];
        for (key, value) in auth {
            if value.trim().is_empty() {
                return Err(Error::config(key, "required setting is not configured"));
            }
        }

        let multiplier = self.retry.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }

        Ok(())
    }

    /// Full GraphQL endpoint URL
    pub fn graphql_endpoint(&self) -> Result<Url> {
        Ok(self.api.site_url.join(&self.api.graphql_path)?)
    }

    /// Folder receiving run logs
    pub fn log_directory(&self) -> PathBuf {
        if let Some(directory) = &self.log.directory {
            return directory.clone();
        }
        match self.export.export_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Log file for a run started at `started`: `<log dir>/log_<yyyyMMddHHmm>.txt`
    pub fn log_file_path<Tz>(&self, started: &chrono::DateTime<Tz>) -> PathBuf
    where
        Tz: chrono::TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        self.log_directory()
            .join(format!("log_{}.txt", started.format("%Y%m%d%H%M")))
    }
}

/// Legacy settings keys (`Section.Key` paths) and their current location
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("Unily.ApiSiteUrl", "api.site_url"),
    ("GraphQl.Endpoint", "api.graphql_path"),
    ("Unily.IdentityServiceUri", "auth.identity_url"),
    ("Unily.API.ClientId", "auth.client_id"),
    ("Unily.API.ClientSecret", "auth.client_secret"),
    ("Unily.API.Scopes", "auth.scopes"),
    ("GraphQl.ExportPath", "export.export_path"),
    ("GraphQl.ExportMediaPath", "export.media_path"),
    ("GraphQl.BatchSize", "export.batch_size"),
    ("GraphQl.ParallelTasks", "export.parallel_tasks"),
    ("GraphQl.UpperLimitId", "export.upper_limit_id"),
    ("GraphQl.Queries", "export.queries"),
];

const LEGACY_SECTIONS: [&str; 2] = ["Unily", "GraphQl"];

/// Translate the legacy `Unily`/`GraphQl` settings layout in place.
///
/// Keys already present in the current layout win. Numeric settings given
/// as strings are converted.
fn upgrade_legacy_layout(value: &mut serde_json::Value) {
    let moved: Vec<(&str, serde_json::Value)> = LEGACY_KEYS
        .iter()
        .filter_map(|(from, to)| {
            let found = from
                .split('.')
                .try_fold(&*value, |node, key| node.get(key))?;
            Some((*to, numeric_string_to_number(found.clone())))
        })
        .collect();

    if moved.is_empty() {
        return;
    }
    tracing::warn!(
        keys = moved.len(),
        "Settings use the legacy Unily/GraphQl layout, translating"
    );

    for (to, legacy) in moved {
        insert_if_absent(value, to, legacy);
    }
    if let Some(root) = value.as_object_mut() {
        for section in LEGACY_SECTIONS {
            root.remove(section);
        }
    }
}

fn numeric_string_to_number(value: serde_json::Value) -> serde_json::Value {
    match &value {
        serde_json::Value::String(raw) => match raw.trim().parse::<i64>() {
            Ok(number) => serde_json::Value::from(number),
            Err(_) => value,
        },
        _ => value,
    }
}

fn insert_if_absent(root: &mut serde_json::Value, dotted: &str, value: serde_json::Value) {
    let mut node = root;
    let mut keys = dotted.split('.').peekable();
    while let Some(key) = keys.next() {
        let map = match node {
            serde_json::Value::Object(map) => map,
            _ => return,
        };
        if keys.peek().is_none() {
            map.entry(key.to_string()).or_insert(value);
            return;
        }
        node = map
            .entry(key.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("failed to read {}: {}", path.display(), e),
        key: None,
    })?;
    serde_json::from_str(&raw).map_err(|e| Error::Config {
        message: format!("invalid JSON in {}: {}", path.display(), e),
        key: None,
    })
}

fn merge_json(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_graphql_path() -> String {
    "/api/v1/graphql".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(100)
}

fn default_batch_size() -> usize {
    1000
}

fn default_parallel_tasks() -> usize {
    3
}

fn default_upper_limit_id() -> i64 {
    99_999_999
}

fn default_file_name_max_len() -> usize {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(3600)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
