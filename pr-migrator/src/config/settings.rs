//! Run configuration deserialization.

use crate::rate_limit::{proportional_jitter, RetryPolicy};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default Bitbucket Cloud API base.
pub const DEFAULT_SOURCE_API_BASE: &str = "https://api.bitbucket.org/2.0";

/// Default Bitbucket OAuth token endpoint.
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://bitbucket.org/site/oauth2/access_token";

/// Default GitHub API base.
pub const DEFAULT_TARGET_API_BASE: &str = "https://api.github.com";

/// Parsed contents of the run configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Path of a flat `source = "target"` identity mapping table.
    #[serde(default)]
    pub identity_mapping: Option<PathBuf>,

    /// Source platform settings.
    #[serde(default)]
    pub source: SourceSettings,

    /// Target platform settings.
    #[serde(default)]
    pub target: TargetSettings,

    /// Alternative target used with `--test-mode`.
    #[serde(default)]
    pub test_mode: Option<TestModeSettings>,

    /// Migration behavior.
    #[serde(default)]
    pub options: MigrationOptions,

    /// Retry and timeout policy for remote calls.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Output locations.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// `[source]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceSettings {
    /// Bitbucket workspace slug.
    #[serde(default)]
    pub workspace: String,

    /// Repository slug.
    #[serde(default)]
    pub repository: String,

    /// Bearer token. Falls back to `BITBUCKET_TOKEN`.
    #[serde(default)]
    pub token: Option<String>,

    /// OAuth consumer key.
    #[serde(default)]
    pub oauth_key: Option<String>,

    /// OAuth consumer secret.
    #[serde(default)]
    pub oauth_secret: Option<String>,

    /// REST API base URL.
    #[serde(default = "default_source_api_base")]
    pub api_base: String,

    /// OAuth token endpoint.
    #[serde(default = "default_oauth_token_url")]
    pub oauth_token_url: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            workspace: String::new(),
            repository: String::new(),
            token: None,
            oauth_key: None,
            oauth_secret: None,
            api_base: default_source_api_base(),
            oauth_token_url: default_oauth_token_url(),
        }
    }
}

/// How the source adapter authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCredentials {
    /// Static bearer token.
    Token(String),
    /// OAuth client-credentials grant.
    OAuth { key: String, secret: String },
}

impl SourceSettings {
    /// Resolved credentials. OAuth wins when both key and secret are set.
    #[must_use]
    pub fn credentials(&self) -> Option<SourceCredentials> {
        match (non_empty(&self.oauth_key), non_empty(&self.oauth_secret)) {
            (Some(key), Some(secret)) => Some(SourceCredentials::OAuth {
                key: key.to_string(),
                secret: secret.to_string(),
            }),
            _ => non_empty(&self.token).map(|token| SourceCredentials::Token(token.to_string())),
        }
    }
}

/// `[target]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetSettings {
    /// Repository owner (user or organization).
    #[serde(default)]
    pub owner: String,

    /// Repository name.
    #[serde(default)]
    pub repository: String,

    /// Personal access token. Falls back to `GITHUB_TOKEN`.
    #[serde(default)]
    pub token: Option<String>,

    /// REST API base URL.
    #[serde(default = "default_target_api_base")]
    pub api_base: String,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repository: String::new(),
            token: None,
            api_base: default_target_api_base(),
        }
    }
}

/// `[test-mode]` section: a scratch repository receiving every write.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestModeSettings {
    /// Scratch repository owner.
    #[serde(default)]
    pub owner: String,

    /// Scratch repository name.
    #[serde(default)]
    pub repository: String,
}

/// Which target repository receives writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetMode {
    /// The configured `[target]` repository.
    #[default]
    Production,
    /// The `[test-mode]` repository.
    TestRepository,
}

/// `[options]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MigrationOptions {
    /// Skip checking that the pull request's commits exist on the target.
    #[serde(default)]
    pub skip_commit_verification: bool,

    /// Skip (instead of failing) pull requests whose branches are missing.
    #[serde(default)]
    pub skip_prs_with_missing_branches: bool,

    /// File a closed tracking issue for every archived pull request.
    #[serde(default)]
    pub create_closed_issues: bool,

    /// Labels attached to tracking issues.
    #[serde(default)]
    pub issue_labels: Vec<String>,

    /// Replace target writes with logged no-ops.
    #[serde(default)]
    pub dry_run: bool,

    /// Pull requests processed in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Closure reason substrings that mark a declined pull request as superseded.
    #[serde(default)]
    pub superseded_reason_markers: Vec<String>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            skip_commit_verification: false,
            skip_prs_with_missing_branches: false,
            create_closed_issues: false,
            issue_labels: Vec::new(),
            dry_run: false,
            concurrency: default_concurrency(),
            superseded_reason_markers: Vec::new(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetrySettings {
    /// Attempts per remote call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap for a single backoff delay in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Cap for the summed delays of one call in seconds.
    #[serde(default = "default_max_total_wait_secs")]
    pub max_total_wait_secs: u64,

    /// Timeout for a single remote call in seconds. Zero disables it.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            max_total_wait_secs: default_max_total_wait_secs(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl RetrySettings {
    /// Converts the section into the executor's policy value.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            max_total_wait: Duration::from_secs(self.max_total_wait_secs),
            call_timeout: (self.call_timeout_secs > 0)
                .then(|| Duration::from_secs(self.call_timeout_secs)),
            jitter: proportional_jitter,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingSettings {
    /// Directory holding archive and failure logs.
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
        }
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn default_source_api_base() -> String {
    DEFAULT_SOURCE_API_BASE.to_string()
}

fn default_oauth_token_url() -> String {
    DEFAULT_OAUTH_TOKEN_URL.to_string()
}

fn default_target_api_base() -> String {
    DEFAULT_TARGET_API_BASE.to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_delay_secs() -> u64 {
    60
}

fn default_max_total_wait_secs() -> u64 {
    600
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}
