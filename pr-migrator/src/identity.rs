//! Source-to-target identity mapping.

use crate::config::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Maps source identities to target logins.
///
/// Lookups are exact after case normalization. An unmapped identity is not
/// an error: callers attribute content to the source name instead.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    mappings: HashMap<String, String>,
    warned: Mutex<HashSet<String>>,
}

impl IdentityResolver {
    /// Builds a resolver from `(source, target)` pairs.
    pub fn new<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: Into<String>,
    {
        let mappings = pairs
            .into_iter()
            .map(|(source, target)| (normalize(source.as_ref()), target.into()))
            .filter(|(source, target): &(String, String)| {
                !source.is_empty() && !target.trim().is_empty()
            })
            .collect();

        Self {
            mappings,
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// Loads a flat TOML table of `source-identity = "target-login"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or not a flat
    /// table of strings.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let table: HashMap<String, String> =
            toml::from_str(&content).map_err(|e| ConfigError::TomlError {
                path: path.display().to_string(),
                source: e,
            })?;

        let resolver = Self::new(table);
        info!(
            path = %path.display(),
            count = resolver.len(),
            "Loaded identity mappings"
        );
        Ok(resolver)
    }

    /// Resolves a source identity to a target login.
    #[must_use]
    pub fn resolve(&self, source: &str) -> Option<&str> {
        let resolved = self.mappings.get(&normalize(source)).map(String::as_str);

        if resolved.is_none() {
            let mut warned = self.warned.lock().unwrap_or_else(PoisonError::into_inner);
            if warned.insert(normalize(source)) {
                warn!(identity = %source, "No identity mapping, attributing by source name");
            }
        }

        resolved
    }

    /// Attribution label used in generated text: `@login` when mapped,
    /// otherwise the source name marked as such.
    #[must_use]
    pub fn label(&self, source: &str) -> String {
        match self.resolve(source) {
            Some(login) => format!("@{login}"),
            None => format!("{source} (Bitbucket user)"),
        }
    }

    /// Number of configured mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Returns true when no mappings are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn normalize(identity: &str) -> String {
    identity.trim().to_lowercase()
}
