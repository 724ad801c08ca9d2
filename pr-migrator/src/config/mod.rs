//! Configuration loading.
//!
//! This module parses the TOML run configuration, fills missing tokens from
//! the environment, and validates everything before any pull request is
//! touched.

mod error;
mod settings;

pub use error::ConfigError;
pub use settings::{
    LoggingSettings, MigrationOptions, RetrySettings, Settings, SourceCredentials,
    SourceSettings, TargetMode, TargetSettings, TestModeSettings, DEFAULT_OAUTH_TOKEN_URL,
    DEFAULT_SOURCE_API_BASE, DEFAULT_TARGET_API_BASE,
};

use settings::non_empty;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable consulted when `[source] token` is absent.
pub const SOURCE_TOKEN_ENV: &str = "BITBUCKET_TOKEN";

/// Environment variable consulted when `[target] token` is absent.
pub const TARGET_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Loads, completes and validates a configuration file.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, malformed, or
/// lacks required values.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    info!(path = %path.display(), "Loading configuration");

    if !path.exists() {
        return Err(ConfigError::MissingFile {
            path: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut settings = Settings::parse(&content, path)?;
    settings.resolve_environment();
    settings.validate(path)?;
    Ok(settings)
}

impl Settings {
    /// Parses configuration text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TomlError`] for malformed TOML.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Fills absent tokens from [`SOURCE_TOKEN_ENV`] and [`TARGET_TOKEN_ENV`].
    pub fn resolve_environment(&mut self) {
        if self.source.credentials().is_none() {
            if let Ok(token) = std::env::var(SOURCE_TOKEN_ENV) {
                debug!("Using source token from {SOURCE_TOKEN_ENV}");
                self.source.token = Some(token);
            }
        }

        if non_empty(&self.target.token).is_none() {
            if let Ok(token) = std::env::var(TARGET_TOKEN_ENV) {
                debug!("Using target token from {TARGET_TOKEN_ENV}");
                self.target.token = Some(token);
            }
        }
    }

    /// Checks that every required value is present.
    ///
    /// All problems are reported together in one error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] listing every missing or
    /// invalid value.
    pub fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.source.workspace.trim().is_empty() {
            problems.push("source.workspace is required".to_string());
        }
        if self.source.repository.trim().is_empty() {
            problems.push("source.repository is required".to_string());
        }
        if self.source.credentials().is_none() {
            problems.push(format!(
                "source credentials are required (token, oauth-key + oauth-secret, or {SOURCE_TOKEN_ENV})"
            ));
        }
        if self.target.owner.trim().is_empty() {
            problems.push("target.owner is required".to_string());
        }
        if self.target.repository.trim().is_empty() {
            problems.push("target.repository is required".to_string());
        }
        if non_empty(&self.target.token).is_none() {
            problems.push(format!(
                "target.token is required (or {TARGET_TOKEN_ENV})"
            ));
        }
        if let Some(test_mode) = &self.test_mode {
            if test_mode.owner.trim().is_empty() || test_mode.repository.trim().is_empty() {
                problems.push("test-mode requires both owner and repository".to_string());
            }
        }
        if self.options.concurrency == 0 {
            problems.push("options.concurrency must be at least 1".to_string());
        }
        for (key, value) in [
            ("source.api-base", &self.source.api_base),
            ("source.oauth-token-url", &self.source.oauth_token_url),
            ("target.api-base", &self.target.api_base),
        ] {
            if let Err(e) = url::Url::parse(value) {
                problems.push(format!("{key} is not a valid URL: {e}"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                message: problems.join("; "),
            })
        }
    }

    /// Returns the `(owner, repository)` pair that receives writes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when test mode is requested
    /// without a `[test-mode]` section.
    pub fn target_repository(&self, mode: TargetMode) -> Result<(String, String), ConfigError> {
        match mode {
            TargetMode::Production => Ok((
                self.target.owner.clone(),
                self.target.repository.clone(),
            )),
            TargetMode::TestRepository => self
                .test_mode
                .as_ref()
                .map(|test| (test.owner.clone(), test.repository.clone()))
                .ok_or_else(|| ConfigError::ValidationError {
                    path: "test-mode".to_string(),
                    message: "--test-mode requires a [test-mode] section".to_string(),
                }),
        }
    }

    /// Target token after environment resolution.
    #[must_use]
    pub fn target_token(&self) -> Option<&str> {
        non_empty(&self.target.token)
    }
}
