//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Main configuration for the invex pipeline.
///
/// The model API key is deliberately not part of this file; it comes from
/// the environment only, and a missing key refuses to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// Quota and ledger configuration.
    pub quota: QuotaConfig,

    /// Vision model configuration.
    pub model: ModelConfig,
}

impl Default for InvexConfig {
    fn default() -> Self {
        Self {
            pdf: PdfConfig::default(),
            quota: QuotaConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Maximum embedded images collected per run, across all input PDFs.
    pub max_images_per_run: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            max_images_per_run: 10,
        }
    }
}

/// Quota and usage ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Maximum invoices processed in any rolling 7-day window.
    pub weekly_limit: usize,

    /// Path of the persisted usage ledger file.
    pub ledger_path: PathBuf,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            weekly_limit: 50,
            ledger_path: PathBuf::from("usage_data/ledger.json"),
        }
    }
}

/// Vision model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier passed to the endpoint.
    pub model: String,

    /// Base URL of the generateContent endpoint.
    pub endpoint: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = InvexConfig::default();
        assert_eq!(config.pdf.max_images_per_run, 10);
        assert_eq!(config.quota.weekly_limit, 50);
        assert_eq!(config.quota.ledger_path, PathBuf::from("usage_data/ledger.json"));
        assert_eq!(config.model.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: InvexConfig =
            serde_json::from_str(r#"{"quota": {"weekly_limit": 5}}"#).unwrap();
        assert_eq!(config.quota.weekly_limit, 5);
        assert_eq!(config.pdf.max_images_per_run, 10);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = InvexConfig::default();
        config.quota.weekly_limit = 7;
        config.save(&path).unwrap();

        let loaded = InvexConfig::from_file(&path).unwrap();
        assert_eq!(loaded.quota.weekly_limit, 7);
        assert_eq!(loaded.model.model, config.model.model);
    }
}
