//! Configuration management for the hearth core.

mod sub_configs;

use serde::{Deserialize, Serialize};

use crate::error::{HearthError, HearthResult};

pub use sub_configs::{
    BoostMode, DiagnosticsConfig, EmbeddingConfig, LoggingConfig, PatternConfig, SemanticConfig,
    StructuralConfig, SyncConfig,
};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub structural: StructuralConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order:
    /// 1. `config/default.toml` (base settings)
    /// 2. `config/{HEARTH_ENV}.toml` (environment-specific)
    /// 3. Environment variables with `HEARTH__` prefix
    pub fn load() -> HearthResult<Self> {
        let env = std::env::var("HEARTH_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(config::Environment::with_prefix("HEARTH").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> HearthResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HearthError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| HearthError::ConfigError(format!("Failed to parse config file: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> HearthResult<()> {
        if self.embedding.dimension == 0 {
            return Err(HearthError::ConfigError(
                "embedding.dimension must be greater than 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.structural.fuzzy_threshold) {
            return Err(HearthError::ConfigError(
                "structural.fuzzy_threshold must be within [0, 1]".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.semantic.similarity_threshold) {
            return Err(HearthError::ConfigError(
                "semantic.similarity_threshold must be within [0, 1]".into(),
            ));
        }

        if self.semantic.default_k == 0 {
            return Err(HearthError::ConfigError(
                "semantic.default_k must be greater than 0".into(),
            ));
        }

        if self.sync.flush_interval_secs == 0 {
            return Err(HearthError::ConfigError(
                "sync.flush_interval_secs must be greater than 0".into(),
            ));
        }

        self.patterns.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.structural.fuzzy_threshold, 0.6);
        assert_eq!(config.semantic.similarity_threshold, 0.5);
        assert_eq!(config.semantic.default_k, 10);
        assert_eq!(config.semantic.capability_boost, 0.1);
        assert_eq!(config.sync.flush_interval_secs, 300);
        assert_eq!(config.patterns.connectivity_gap_ms, 3_600_000);
        assert_eq!(config.diagnostics.call_timeout_ms, 2_000);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = Config::default();
        config.structural.fuzzy_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(HearthError::ConfigError(_))
        ));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let mut config = Config::default();
        config.embedding.dimension = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let rendered = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(
            parsed.semantic.similarity_threshold,
            config.semantic.similarity_threshold
        );
        assert_eq!(parsed.sync.flush_threshold, config.sync.flush_threshold);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [semantic]
            default_k = 5
            "#,
        )
        .unwrap();
        assert_eq!(parsed.semantic.default_k, 5);
        assert_eq!(parsed.semantic.similarity_threshold, 0.5);
        assert_eq!(parsed.structural.fuzzy_threshold, 0.6);
    }
}
