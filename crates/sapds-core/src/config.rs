//! Configuration for the OData session and the Force Element engine.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`SAPDS__` prefix, `__` separator)
//! 2. Config file (`sapds.toml` by default)
//! 3. Defaults

use std::fmt;

use serde::Deserialize;

use crate::error::{CoreError, Result};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub odata: ODataConfig,
    #[serde(default)]
    pub force: ForceElementConfig,
}

impl AppConfig {
    /// Load layered configuration from `{file_prefix}.toml` (optional) and the environment.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("SAPDS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}

// ── OData session ─────────────────────────────────────────────────

/// Connection settings for the SAP OData gateway.
///
/// Loaded from the `[odata]` section or `SAPDS__ODATA__*` environment variables.
#[derive(Clone, Deserialize)]
pub struct ODataConfig {
    /// Gateway root, e.g. `https://host/sap/opu/odata/sap/`.
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Takes precedence over basic credentials when set.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Default `sap-client` applied to every request unless overridden.
    #[serde(default)]
    pub sap_client: Option<String>,

    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after the first one for retryable failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay for exponential backoff between retries.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_true")]
    pub verify_tls: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Static credentials for the gateway.
#[derive(Clone, PartialEq, Eq)]
pub enum ODataAuth {
    Basic { user: String, password: String },
    Bearer(String),
}

impl fmt::Debug for ODataAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("password", &"***")
                .finish(),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"***").finish(),
        }
    }
}

impl ODataConfig {
    /// Base URL with exactly one trailing slash.
    pub fn normalized_base_url(&self) -> Result<String> {
        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Config("Missing base_url".to_string()));
        }
        Ok(format!("{}/", trimmed.trim_end_matches('/')))
    }

    /// Resolve credentials: bearer token first, then user + password.
    pub fn auth(&self) -> Result<ODataAuth> {
        self.normalized_base_url()?;

        if let Some(token) = non_empty(&self.bearer_token) {
            return Ok(ODataAuth::Bearer(token.to_string()));
        }
        match (non_empty(&self.user), non_empty(&self.password)) {
            (Some(user), Some(password)) => Ok(ODataAuth::Basic {
                user: user.to_string(),
                password: password.to_string(),
            }),
            _ => Err(CoreError::Config("Missing credentials".to_string())),
        }
    }

    /// Configured default `sap-client`, if non-empty.
    pub fn default_sap_client(&self) -> Option<&str> {
        non_empty(&self.sap_client)
    }
}

impl fmt::Debug for ODataConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ODataConfig")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "***"))
            .field("sap_client", &self.sap_client)
            .field("lang", &self.lang)
            .field("timeout_secs", &self.timeout_secs)
            .field("retries", &self.retries)
            .field("backoff_ms", &self.backoff_ms)
            .field("verify_tls", &self.verify_tls)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ODataConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user: None,
            password: None,
            bearer_token: None,
            sap_client: None,
            lang: default_lang(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
            verify_tls: true,
            user_agent: default_user_agent(),
        }
    }
}

// ── Force Element engine ──────────────────────────────────────────

/// Traversal and enrichment settings.
///
/// Loaded from the `[force]` section or `SAPDS__FORCE__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ForceElementConfig {
    /// Host used in Fiori launchpad deep links.
    #[serde(default = "default_deeplink_host")]
    pub deeplink_host: String,

    /// Prefix for symbol icon URLs (`{icon_base_url}/{sidc}.svg`).
    #[serde(default = "default_icon_base_url")]
    pub icon_base_url: String,

    #[serde(default = "default_depth")]
    pub default_depth: usize,

    /// Frontier IDs per OR-filter edge query.
    #[serde(default = "default_edge_batch_size")]
    pub edge_batch_size: usize,

    /// `$top` for each edge query page.
    #[serde(default = "default_edge_page_top")]
    pub edge_page_top: usize,

    /// Page cap per edge batch query. Unbounded when absent.
    #[serde(default)]
    pub edge_max_pages: Option<usize>,

    #[serde(default = "default_name_chunk_size")]
    pub name_chunk_size: usize,

    #[serde(default = "default_bulk_chunk_size")]
    pub bulk_chunk_size: usize,

    #[serde(default = "default_children_chunk_size")]
    pub children_chunk_size: usize,

    /// Fail on unknown `$select` fields instead of dropping them.
    #[serde(default)]
    pub strict_select: bool,
}

impl Default for ForceElementConfig {
    fn default() -> Self {
        Self {
            deeplink_host: default_deeplink_host(),
            icon_base_url: default_icon_base_url(),
            default_depth: default_depth(),
            edge_batch_size: default_edge_batch_size(),
            edge_page_top: default_edge_page_top(),
            edge_max_pages: None,
            name_chunk_size: default_name_chunk_size(),
            bulk_chunk_size: default_bulk_chunk_size(),
            children_chunk_size: default_children_chunk_size(),
            strict_select: false,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn default_lang() -> String {
    "EN".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "sap-ds-sdk/0.1".to_string()
}

fn default_deeplink_host() -> String {
    "localhost".to_string()
}

fn default_icon_base_url() -> String {
    "/icons/cache".to_string()
}

fn default_depth() -> usize {
    3
}

fn default_edge_batch_size() -> usize {
    20
}

fn default_edge_page_top() -> usize {
    5000
}

fn default_name_chunk_size() -> usize {
    20
}

fn default_bulk_chunk_size() -> usize {
    40
}

fn default_children_chunk_size() -> usize {
    25
}
