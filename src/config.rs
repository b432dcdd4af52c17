//! Configuration management for the job tracker

use crate::error::{JobTrackerError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub trends: TrendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON document store for postings
    pub data_file: PathBuf,
    /// JSON file holding (email, keyword) subscriptions
    pub subscriptions_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Interval between scheduled pipeline runs, in minutes
    pub sync_interval_minutes: u64,
    /// Timeout applied to posting-source fetches, in seconds
    pub source_timeout_secs: u64,
    /// Cities that location strings are normalized into
    pub target_cities: Vec<String>,
    /// Maximum postings per subscriber digest
    pub digest_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Fixed embedding dimension; every stored vector has exactly this length
    pub dimension: usize,
    /// Postings per all-or-nothing persistence batch
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_limit: usize,
    /// Requests above this are clamped, not rejected
    pub max_limit: usize,
    pub default_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// |slope| at or below this is classified as stable
    pub stable_band: f64,
    /// |slope| above this upgrades the trend to strong
    pub strong_band: f64,
    /// Trailing window for the moving average, in months
    pub moving_average_window: usize,
    pub max_top_skills: usize,
    pub max_heatmap_skills: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".job-tracker");

        Self {
            storage: StorageConfig {
                data_file: data_dir.join("postings.json"),
                subscriptions_file: data_dir.join("subscriptions.json"),
            },
            pipeline: PipelineConfig {
                sync_interval_minutes: 360,
                source_timeout_secs: 120,
                target_cities: vec![
                    "Casablanca".to_string(),
                    "Rabat".to_string(),
                    "Tanger".to_string(),
                ],
                digest_cap: 10,
            },
            embedding: EmbeddingConfig {
                dimension: 256,
                batch_size: 32,
            },
            search: SearchConfig {
                default_limit: 20,
                max_limit: 50,
                default_threshold: 0.3,
            },
            trends: TrendConfig {
                stable_band: 1.0,
                strong_band: 5.0,
                moving_average_window: 3,
                max_top_skills: 20,
                max_heatmap_skills: 30,
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content).map_err(|e| {
                JobTrackerError::Configuration(format!("Failed to parse config: {}", e))
            })?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    fn save_to(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            JobTrackerError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(config_path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("job-tracker")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.embedding.dimension, 256);
        assert_eq!(config.search.max_limit, 50);
        assert_eq!(config.trends.stable_band, 1.0);
        assert_eq!(config.trends.strong_band, 5.0);
        assert!(config
            .pipeline
            .target_cities
            .contains(&"Casablanca".to_string()));
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.search.default_limit = 7;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.search.default_limit, 7);
        assert_eq!(loaded.embedding.dimension, config.embedding.dimension);
    }
}
