//! Configuration management for statsync
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::extract_domain;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upstream public API configuration
    pub upstream: UpstreamConfig,

    /// Spreadsheet store configuration
    pub sheets: SheetsConfig,

    /// Column positions in the sign-up registry
    #[serde(default)]
    pub registry_layout: RegistryLayout,

    /// Per-subscriber sync configuration
    pub sync: SyncConfig,

    /// Summary pass configuration
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Notification delivery configuration
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream public API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Root URL of the public API
    pub base_url: String,

    /// Root URL used when building public links in destination rows
    pub site_url: String,

    /// Publications requested per listing page
    pub page_size: u32,

    /// Rate limit (requests per second)
    pub requests_per_second: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,
}

/// Spreadsheet store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Sheets API root
    pub api_base: String,

    /// Drive API root (permissions)
    pub drive_base: String,

    /// OAuth bearer token
    #[serde(default)]
    pub access_token: String,

    /// Reference (URL or id) of the sign-up registry workbook
    pub registry: String,

    /// Registry sheet title
    pub registry_sheet: String,

    /// Summary sheet title, in the registry workbook
    pub summary_sheet: String,

    /// Title given to the primary sheet of every destination
    pub stats_sheet_title: String,

    /// Prefix of newly created destination workbook titles
    pub destination_title_prefix: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// 1-based column positions of the registry sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLayout {
    pub email: usize,
    pub first_name: usize,
    pub last_name: usize,
    pub profile_id: usize,
    pub destination: usize,
    pub last_refreshed: usize,
}

impl Default for RegistryLayout {
    fn default() -> Self {
        // Column A of the sign-up form holds the submission timestamp.
        Self {
            email: 2,
            first_name: 3,
            last_name: 4,
            profile_id: 5,
            destination: 6,
            last_refreshed: 7,
        }
    }
}

impl RegistryLayout {
    fn columns(&self) -> [usize; 6] {
        [
            self.email,
            self.first_name,
            self.last_name,
            self.profile_id,
            self.destination,
            self.last_refreshed,
        ]
    }
}

/// Per-subscriber sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Hours after which an entry is due for refresh
    pub staleness_hours: u32,

    /// Wall-clock budget of one sync run, in seconds
    pub max_runtime_secs: u64,

    /// Operator address, granted write access and sent run reports
    pub operator_email: String,
}

/// Summary pass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Pause after reporting a failed entry, in seconds
    pub cooldown_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { cooldown_secs: 10 }
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Mail relay webhook; notifications are only logged when absent
    pub webhook_url: Option<String>,

    /// Optional bearer token for the webhook
    pub webhook_token: Option<String>,

    /// Name used in subjects and message bodies
    pub service_name: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_token: None,
            service_name: String::from("Tableau Public Stats Service"),
            timeout_secs: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let upstream = UpstreamConfig {
            base_url: env_string("STATSYNC_UPSTREAM_URL", &defaults.upstream.base_url),
            site_url: env_string("STATSYNC_SITE_URL", &defaults.upstream.site_url),
            page_size: env_or("STATSYNC_PAGE_SIZE", defaults.upstream.page_size),
            requests_per_second: env_or(
                "STATSYNC_RATE_LIMIT",
                defaults.upstream.requests_per_second,
            ),
            request_timeout_secs: env_or(
                "STATSYNC_REQUEST_TIMEOUT",
                defaults.upstream.request_timeout_secs,
            ),
            user_agent: env_string("STATSYNC_USER_AGENT", &defaults.upstream.user_agent),
        };

        let sheets = SheetsConfig {
            access_token: env_string("STATSYNC_ACCESS_TOKEN", ""),
            registry: env_string("STATSYNC_REGISTRY", ""),
            registry_sheet: env_string("STATSYNC_REGISTRY_SHEET", &defaults.sheets.registry_sheet),
            summary_sheet: env_string("STATSYNC_SUMMARY_SHEET", &defaults.sheets.summary_sheet),
            ..defaults.sheets
        };

        let sync = SyncConfig {
            staleness_hours: env_or("STATSYNC_STALENESS_HOURS", defaults.sync.staleness_hours),
            max_runtime_secs: env_or("STATSYNC_MAX_RUNTIME", defaults.sync.max_runtime_secs),
            operator_email: env_string("STATSYNC_OPERATOR_EMAIL", ""),
        };

        let summary = SummaryConfig {
            cooldown_secs: env_or("STATSYNC_SUMMARY_COOLDOWN", defaults.summary.cooldown_secs),
        };

        let notifications = NotificationConfig {
            webhook_url: std::env::var("STATSYNC_WEBHOOK_URL").ok(),
            webhook_token: std::env::var("STATSYNC_WEBHOOK_TOKEN").ok(),
            ..defaults.notifications
        };

        let logging = LoggingConfig {
            level: env_string("STATSYNC_LOG_LEVEL", "info"),
            format: env_string("STATSYNC_LOG_FORMAT", "text"),
        };

        Ok(Self {
            upstream,
            sheets,
            registry_layout: RegistryLayout::default(),
            sync,
            summary,
            notifications,
            logging,
        })
    }

    /// Load configuration from a file
    ///
    /// The access token may be left out of the file and supplied through
    /// `STATSYNC_ACCESS_TOKEN` instead.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        if config.sheets.access_token.is_empty() {
            if let Ok(token) = std::env::var("STATSYNC_ACCESS_TOKEN") {
                config.sheets.access_token = token;
            }
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        extract_domain(&self.upstream.base_url).context("upstream.base_url is not a valid URL")?;
        extract_domain(&self.sheets.api_base).context("sheets.api_base is not a valid URL")?;

        if self.upstream.page_size == 0 {
            anyhow::bail!("page_size must be greater than 0");
        }

        if self.upstream.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.sync.staleness_hours == 0 {
            anyhow::bail!("staleness_hours must be greater than 0");
        }

        if self.sheets.stats_sheet_title.trim().is_empty() {
            anyhow::bail!("stats_sheet_title must not be empty");
        }

        let columns = self.registry_layout.columns();
        if columns.iter().any(|&c| c == 0) {
            anyhow::bail!("registry_layout columns are 1-based");
        }
        let mut sorted = columns.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != columns.len() {
            anyhow::bail!("registry_layout columns must be distinct");
        }

        Ok(())
    }

    /// Checks needed before talking to a live store
    pub fn validate_for_run(&self) -> Result<()> {
        self.validate()?;

        if self.sheets.access_token.is_empty() {
            anyhow::bail!("sheets.access_token is empty (set STATSYNC_ACCESS_TOKEN)");
        }

        if self.sheets.registry.is_empty() {
            anyhow::bail!("sheets.registry is empty");
        }

        Ok(())
    }

    /// Get upstream request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.request_timeout_secs)
    }

    /// Staleness threshold as a chrono duration
    #[must_use]
    pub fn staleness_threshold(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.sync.staleness_hours))
    }

    #[must_use]
    pub fn runtime_budget(&self) -> Duration {
        Duration::from_secs(self.sync.max_runtime_secs)
    }

    #[must_use]
    pub fn summary_cooldown(&self) -> Duration {
        Duration::from_secs(self.summary.cooldown_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig {
                base_url: String::from("https://public.tableau.com"),
                site_url: String::from("https://public.tableau.com"),
                page_size: 50,
                requests_per_second: 5,
                request_timeout_secs: 30,
                user_agent: format!("statsync/{}", env!("CARGO_PKG_VERSION")),
            },
            sheets: SheetsConfig {
                api_base: String::from("https://sheets.googleapis.com/v4"),
                drive_base: String::from("https://www.googleapis.com/drive/v3"),
                access_token: String::new(),
                registry: String::new(),
                registry_sheet: String::from("Form Responses 1"),
                summary_sheet: String::from("Summary"),
                stats_sheet_title: String::from("Stats"),
                destination_title_prefix: String::from("Stats: "),
                request_timeout_secs: 30,
            },
            registry_layout: RegistryLayout::default(),
            sync: SyncConfig {
                staleness_hours: 23,
                max_runtime_secs: 780,
                operator_email: String::new(),
            },
            summary: SummaryConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
