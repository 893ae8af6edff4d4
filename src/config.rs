use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::Result;

const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 30;

/// Settings of the update checker and the git-info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct UpdateConfig {
    pub repo_path: PathBuf,
    pub remote: String,
    pub changelog_path: String,
    pub stage_timeout_secs: u64,
    pub metadata_api_base: String,
    /// Queried by the git-info endpoint, and the fallback when a lookup fails.
    pub metadata_repository: String,
    pub github_token: Option<String>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            remote: "origin".to_string(),
            changelog_path: "CHANGELOG.md".to_string(),
            stage_timeout_secs: DEFAULT_STAGE_TIMEOUT_SECS,
            metadata_api_base: "https://api.github.com".to_string(),
            metadata_repository: "stackblitz-labs/bolt.diy".to_string(),
            github_token: None,
        }
    }
}

impl UpdateConfig {
    /// Defaults for `repo_path`, overridden by `GIT_UPDATE_*` and `GITHUB_TOKEN`.
    #[must_use]
    pub fn from_env(repo_path: &Path) -> Self {
        Self::from_lookup(repo_path, |key| env::var(key).ok())
    }

    /// Reads a JSON config file; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn from_json(contents: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(contents)?;
        if config.stage_timeout_secs == 0 {
            warn!(
                default = DEFAULT_STAGE_TIMEOUT_SECS,
                "Ignoring zero stage_timeout_secs, using the default"
            );
            config.stage_timeout_secs = DEFAULT_STAGE_TIMEOUT_SECS;
        }
        Ok(config)
    }

    #[must_use]
    pub const fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    fn from_lookup(repo_path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            repo_path: repo_path.to_path_buf(),
            ..Self::default()
        };

        if let Some(remote) = lookup("GIT_UPDATE_REMOTE") {
            config.remote = remote;
        }
        if let Some(path) = lookup("GIT_UPDATE_CHANGELOG") {
            config.changelog_path = path;
        }
        if let Some(repository) = lookup("GIT_UPDATE_METADATA_REPOSITORY") {
            config.metadata_repository = repository;
        }
        if let Some(api) = lookup("GIT_UPDATE_METADATA_API") {
            config.metadata_api_base = api;
        }
        if let Some(raw) = lookup("GIT_UPDATE_STAGE_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.stage_timeout_secs = secs,
                _ => warn!(value = %raw, "Ignoring invalid GIT_UPDATE_STAGE_TIMEOUT_SECS"),
            }
        }
        config.github_token = lookup("GITHUB_TOKEN").filter(|token| !token.is_empty());
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_defaults() {
        let vars = HashMap::from([
            ("GIT_UPDATE_REMOTE", "upstream"),
            ("GIT_UPDATE_STAGE_TIMEOUT_SECS", "5"),
            ("GITHUB_TOKEN", "secret"),
        ]);
        let config = UpdateConfig::from_lookup(Path::new("/srv/app"), |key| {
            vars.get(key).map(ToString::to_string)
        });

        assert_eq!(config.repo_path, PathBuf::from("/srv/app"));
        assert_eq!(config.remote, "upstream");
        assert_eq!(config.stage_timeout(), Duration::from_secs(5));
        assert_eq!(config.github_token.as_deref(), Some("secret"));
        assert_eq!(config.changelog_path, "CHANGELOG.md");
    }

    #[test]
    fn invalid_timeout_keeps_default() {
        let config = UpdateConfig::from_lookup(Path::new("."), |key| {
            (key == "GIT_UPDATE_STAGE_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert_eq!(config.stage_timeout_secs, DEFAULT_STAGE_TIMEOUT_SECS);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = UpdateConfig::from_json(r#"{"remote": "fork"}"#).unwrap();
        assert_eq!(config.remote, "fork");
        assert_eq!(config.metadata_repository, "stackblitz-labs/bolt.diy");
    }

    #[test]
    fn zero_timeout_in_json_keeps_default() {
        let config = UpdateConfig::from_json(r#"{"stage_timeout_secs": 0}"#).unwrap();
        assert_eq!(config.stage_timeout_secs, DEFAULT_STAGE_TIMEOUT_SECS);

        let config = UpdateConfig::from_json(r#"{"stage_timeout_secs": 7}"#).unwrap();
        assert_eq!(config.stage_timeout(), Duration::from_secs(7));
    }

    #[test]
    fn zero_timeout_in_env_keeps_default() {
        let config = UpdateConfig::from_lookup(Path::new("."), |key| {
            (key == "GIT_UPDATE_STAGE_TIMEOUT_SECS").then(|| "0".to_string())
        });
        assert_eq!(config.stage_timeout_secs, DEFAULT_STAGE_TIMEOUT_SECS);
    }
}
