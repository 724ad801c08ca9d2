//! Wires configuration, platform adapters and the orchestrator into a run.

mod config;
mod error;

pub use config::RunnerConfig;
pub use error::RunnerError;

use crate::archive::ArchiveWriter;
use crate::classify::RecordClassifier;
use crate::config::{load_settings, ConfigError, Settings};
use crate::identity::IdentityResolver;
use crate::orchestrator::{MigrationOrchestrator, OrchestratorOptions, RunMode};
use crate::rate_limit::{RateLimitGate, RateLimitedExecutor};
use crate::source::{BitbucketAuth, BitbucketSource, SourceRepository};
use crate::summary::RunReport;
use crate::target::{DryRunTarget, GitHubTarget, TargetRepository};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Subdirectory of the log directory used by dry runs.
pub const DRY_RUN_LOG_DIR: &str = "dry-run";

/// Orchestrates a full migration run.
pub struct Runner {
    config: RunnerConfig,
    settings: Settings,
}

impl Runner {
    /// Loads and validates the configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Config`] when the file is missing, malformed,
    /// or incomplete.
    pub fn new(config: RunnerConfig) -> Result<Self, RunnerError> {
        let settings = load_settings(config.config_path())?;
        Ok(Self::with_settings(config, settings))
    }

    /// Builds a runner from already loaded settings.
    pub fn with_settings(config: RunnerConfig, settings: Settings) -> Self {
        Self { config, settings }
    }

    /// Returns the effective settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns whether target writes are suppressed, from either the
    /// command line or the configuration file.
    pub fn dry_run(&self) -> bool {
        self.config.dry_run() || self.settings.options.dry_run
    }

    /// Directory receiving archive and failure logs for this run.
    pub fn log_directory(&self) -> PathBuf {
        let directory = &self.settings.logging.directory;
        if self.dry_run() {
            directory.join(DRY_RUN_LOG_DIR)
        } else {
            directory.clone()
        }
    }

    /// Verifies both platforms are reachable without processing anything.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Preflight`] naming the platform that failed.
    pub async fn test_connection(&self) -> Result<(), RunnerError> {
        let source = self.build_source()?;
        let target = self.build_target()?;
        preflight(source.as_ref(), target.as_ref()).await
    }

    /// Executes the full migration flow.
    ///
    /// # Errors
    ///
    /// Returns an error when the identity mapping cannot be loaded, a
    /// platform is unreachable, or the log directory cannot be opened.
    /// Errors of individual pull requests are part of the report instead.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport, RunnerError> {
        let identities = self.load_identities()?;
        let source = self.build_source()?;
        let github = self.build_target()?;
        preflight(source.as_ref(), github.as_ref()).await?;

        let dry_run_target = self.dry_run().then(|| Arc::new(DryRunTarget::new(github.clone())));
        let target: Arc<dyn TargetRepository> = match &dry_run_target {
            Some(dry_run) => dry_run.clone(),
            None => github,
        };

        let log_directory = self.log_directory();
        info!(path = %log_directory.display(), "Opening archive logs");
        let archive = ArchiveWriter::spawn(log_directory).await?;

        let options = &self.settings.options;
        let orchestrator = MigrationOrchestrator::new(
            source,
            target,
            archive,
            OrchestratorOptions {
                skip_commit_verification: options.skip_commit_verification,
                skip_prs_with_missing_branches: options.skip_prs_with_missing_branches,
                create_closed_issues: options.create_closed_issues,
                issue_labels: options.issue_labels.clone(),
                concurrency: self.config.concurrency().unwrap_or(options.concurrency),
                mode: if self.config.audit() {
                    RunMode::Audit
                } else {
                    RunMode::Migrate
                },
                selection: self.config.selection().cloned(),
            },
        )
        .with_classifier(RecordClassifier::with_reason_markers(
            &options.superseded_reason_markers,
        ))
        .with_identities(identities)
        .with_archive_retry(self.settings.retry.policy());

        let report = orchestrator.run(cancel).await;

        if let Some(dry_run) = dry_run_target {
            info!(
                intended_actions = dry_run.intended_actions(),
                "[DRY RUN] Target writes suppressed"
            );
        }
        if let Some(error) = &report.enumeration_error {
            warn!(error = %error, "Source enumeration did not complete");
        }

        Ok(report)
    }

    fn load_identities(&self) -> Result<IdentityResolver, RunnerError> {
        let path = self
            .config
            .mapping_path()
            .or(self.settings.identity_mapping.as_deref());

        match path {
            Some(path) => Ok(IdentityResolver::load(path)?),
            None => {
                warn!("No identity mapping configured; all authors attributed by source name");
                Ok(IdentityResolver::default())
            }
        }
    }

    fn executor(&self) -> RateLimitedExecutor {
        RateLimitedExecutor::new(self.settings.retry.policy(), Arc::new(RateLimitGate::new()))
    }

    fn build_source(&self) -> Result<Arc<dyn SourceRepository>, RunnerError> {
        let source = &self.settings.source;
        let credentials = source
            .credentials()
            .ok_or_else(|| ConfigError::ValidationError {
                path: self.config.config_path().display().to_string(),
                message: "source credentials are required".to_string(),
            })?;

        let adapter = BitbucketSource::new(
            &source.api_base,
            &source.workspace,
            &source.repository,
            BitbucketAuth::from_credentials(credentials, &source.oauth_token_url),
            self.executor(),
        )?;
        Ok(Arc::new(adapter))
    }

    fn build_target(&self) -> Result<Arc<dyn TargetRepository>, RunnerError> {
        let (owner, repository) = self
            .settings
            .target_repository(self.config.target_mode())?;
        let token = self
            .settings
            .target_token()
            .ok_or_else(|| ConfigError::ValidationError {
                path: self.config.config_path().display().to_string(),
                message: "target.token is required".to_string(),
            })?;

        info!(owner = %owner, repository = %repository, "Target repository");
        let adapter = GitHubTarget::new(
            &self.settings.target.api_base,
            token,
            &owner,
            &repository,
            self.executor(),
        )?;
        Ok(Arc::new(adapter))
    }
}

async fn preflight(
    source: &dyn SourceRepository,
    target: &dyn TargetRepository,
) -> Result<(), RunnerError> {
    source
        .verify_access()
        .await
        .map_err(|e| RunnerError::Preflight {
            platform: "Bitbucket",
            source: e,
        })?;
    info!("Source repository reachable");

    target
        .verify_access()
        .await
        .map_err(|e| RunnerError::Preflight {
            platform: "GitHub",
            source: e,
        })?;
    info!("Target repository reachable");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const MINIMAL: &str = r#"
[source]
workspace = "acme"
repository = "widgets"
token = "bb"

[target]
owner = "acme"
repository = "widgets"
token = "gh"

[logging]
directory = "out"
"#;

    fn runner(config: RunnerConfig, content: &str) -> Runner {
        let settings = Settings::parse(content, Path::new("config.toml")).unwrap();
        Runner::with_settings(config, settings)
    }

    #[test]
    fn dry_run_logs_are_separate() {
        let config = RunnerConfig::new(PathBuf::from("config.toml")).with_dry_run(true);

        let runner = runner(config, MINIMAL);

        assert!(runner.dry_run());
        assert_eq!(runner.log_directory(), Path::new("out").join(DRY_RUN_LOG_DIR));
    }

    #[test]
    fn dry_run_can_come_from_configuration() {
        let content = format!("{MINIMAL}\n[options]\ndry-run = true\n");

        let runner = runner(RunnerConfig::new(PathBuf::from("config.toml")), &content);

        assert!(runner.dry_run());
    }

    #[test]
    fn real_runs_log_to_configured_directory() {
        let runner = runner(RunnerConfig::new(PathBuf::from("config.toml")), MINIMAL);

        assert!(!runner.dry_run());
        assert_eq!(runner.log_directory(), PathBuf::from("out"));
    }

    #[test]
    fn missing_mapping_override_is_an_error() {
        let config = RunnerConfig::new(PathBuf::from("config.toml"))
            .with_mapping_path(PathBuf::from("/nonexistent/users.toml"));

        let runner = runner(config, MINIMAL);

        assert!(matches!(
            runner.load_identities(),
            Err(RunnerError::Config(ConfigError::MissingFile { .. }))
        ));
    }
}
