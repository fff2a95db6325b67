use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::{default_skip_statuses, DEFAULT_MIN_SIMILARITY, DEFAULT_SUGGESTION_LIMIT};
use crate::error::{ImportError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub matching: MatchingConfig,
    pub import: ImportConfig,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// How many ranked candidates to return when no exact match exists
    pub suggestion_limit: usize,
    /// Minimum similarity score (0.0 to 1.0) for a catalog entry to be suggested
    pub min_similarity: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Reject shows dated before the batch reference date
    pub reject_past_shows: bool,
    /// Discovery statuses that produce a SKIP outcome
    pub skip_statuses: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            reject_past_shows: false,
            skip_statuses: default_skip_statuses(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/catalog.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1:9899".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                ImportError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str::<Config>(&content)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Config::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Environment variables win over file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup("SMS_IMPORT_DB") {
            self.storage.database_path = PathBuf::from(db);
        }
        if let Some(limit) = lookup("SMS_IMPORT_SUGGESTION_LIMIT") {
            self.matching.suggestion_limit = limit.parse().map_err(|_| {
                ImportError::Config(format!("SMS_IMPORT_SUGGESTION_LIMIT is not a number: {}", limit))
            })?;
        }
        if let Some(score) = lookup("SMS_IMPORT_MIN_SIMILARITY") {
            self.matching.min_similarity = score.parse().map_err(|_| {
                ImportError::Config(format!("SMS_IMPORT_MIN_SIMILARITY is not a number: {}", score))
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.matching.min_similarity) {
            return Err(ImportError::Config(format!(
                "matching.min_similarity must be between 0 and 1, got {}",
                self.matching.min_similarity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("does/not/exist.toml").unwrap();
        assert_eq!(config.matching.suggestion_limit, 3);
        assert!(!config.import.reject_past_shows);
        assert!(config.import.skip_statuses.contains(&"cancelled".to_string()));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[import]\nreject_past_shows = true\n\n[matching]\nmin_similarity = 0.9").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.import.reject_past_shows);
        assert_eq!(config.matching.min_similarity, 0.9);
        assert_eq!(config.matching.suggestion_limit, 3);
        assert_eq!(config.storage.database_path, PathBuf::from("data/catalog.db"));
    }

    #[test]
    fn test_out_of_range_similarity_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[matching]\nmin_similarity = 1.5").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ImportError::Config(_)));
    }

    #[test]
    fn test_invalid_overrides_are_config_errors() {
        fn overrides(bad_key: &'static str) -> impl Fn(&str) -> Option<String> {
            move |key| match key {
                k if k == bad_key => Some("plenty".to_string()),
                "SMS_IMPORT_SUGGESTION_LIMIT" => Some("5".to_string()),
                "SMS_IMPORT_MIN_SIMILARITY" => Some("0.8".to_string()),
                _ => None,
            }
        }

        let mut config = Config::default();
        config.apply_overrides(overrides("NONE")).unwrap();
        assert_eq!(config.matching.suggestion_limit, 5);
        assert_eq!(config.matching.min_similarity, 0.8);

        for key in ["SMS_IMPORT_SUGGESTION_LIMIT", "SMS_IMPORT_MIN_SIMILARITY"] {
            let err = Config::default().apply_overrides(overrides(key)).unwrap_err();
            assert!(matches!(err, ImportError::Config(_)), "{}", key);
        }
    }
}
