//! Runner configuration.

use crate::config::TargetMode;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Command-line level settings for one run, layered over the configuration
/// file.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Path to the TOML configuration file.
    config_path: PathBuf,
    /// Identity mapping file overriding `identity-mapping`.
    mapping_path: Option<PathBuf>,
    /// Source pull request ids to restrict the run to.
    selection: Option<BTreeSet<u64>>,
    /// Whether target writes are replaced by logged no-ops.
    dry_run: bool,
    /// Whether nothing at all is written.
    audit: bool,
    /// Which target repository receives writes.
    target_mode: TargetMode,
    /// Worker count overriding `options.concurrency`.
    concurrency: Option<usize>,
}

impl RunnerConfig {
    /// Creates a configuration reading settings from `config_path`.
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            mapping_path: None,
            selection: None,
            dry_run: false,
            audit: false,
            target_mode: TargetMode::Production,
            concurrency: None,
        }
    }

    /// Uses a different identity mapping file.
    pub fn with_mapping_path(mut self, mapping_path: PathBuf) -> Self {
        self.mapping_path = Some(mapping_path);
        self
    }

    /// Restricts the run to the given source ids. An empty list means all.
    pub fn with_selection(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        let ids: BTreeSet<u64> = ids.into_iter().collect();
        self.selection = (!ids.is_empty()).then_some(ids);
        self
    }

    /// Enables dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enables audit mode.
    pub fn with_audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }

    /// Selects the target repository.
    pub fn with_target_mode(mut self, target_mode: TargetMode) -> Self {
        self.target_mode = target_mode;
        self
    }

    /// Overrides the worker count.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Returns the configuration file path.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Returns the identity mapping override.
    pub fn mapping_path(&self) -> Option<&Path> {
        self.mapping_path.as_deref()
    }

    /// Returns the pull request selection.
    pub fn selection(&self) -> Option<&BTreeSet<u64>> {
        self.selection.as_ref()
    }

    /// Returns whether dry-run mode was requested on the command line.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns whether audit mode is enabled.
    pub fn audit(&self) -> bool {
        self.audit
    }

    /// Returns the target repository selection.
    pub fn target_mode(&self) -> TargetMode {
        self.target_mode
    }

    /// Returns the worker count override.
    pub fn concurrency(&self) -> Option<usize> {
        self.concurrency
    }
}
