//! Engine configuration.

use formcoach_core::{Error, Result};
use formcoach_rules::MatchThresholds;
use serde::{Deserialize, Serialize};

use crate::cooldown::FeedbackConfig;
use crate::scorer::ScoringConfig;
use crate::tracker::TrackerConfig;

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Similarity floors for exercise-name lookup
    pub matching: MatchThresholds,

    /// Repetition tracking
    pub tracker: TrackerConfig,

    /// Penalties and the good-rep threshold
    pub scoring: ScoringConfig,

    /// Instruction cooldown and cap
    pub feedback: FeedbackConfig,

    /// Landmark confidence below which a rule is not assessable
    pub min_landmark_confidence: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matching: MatchThresholds::default(),
            tracker: TrackerConfig::default(),
            scoring: ScoringConfig::default(),
            feedback: FeedbackConfig::default(),
            min_landmark_confidence: 0.5,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file, with `FORMCOACH_` environment overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("FORMCOACH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let loaded: Self = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load from environment variables, e.g. `FORMCOACH_SCORING__CRITICAL_PENALTY=30`
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FORMCOACH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let loaded: Self = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.matching.is_valid() {
            return Err(Error::Config(
                "match thresholds must lie within [0, 100]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_landmark_confidence)
            || !(0.0..=1.0).contains(&self.tracker.min_confidence)
        {
            return Err(Error::Config(
                "confidence floors must lie within [0, 1]".to_string(),
            ));
        }
        if !(self.tracker.return_fraction > 0.0 && self.tracker.return_fraction < 1.0) {
            return Err(Error::Config(format!(
                "tracker return fraction {} must lie in (0, 1)",
                self.tracker.return_fraction
            )));
        }
        if !self.scoring.is_valid() {
            return Err(Error::Config(
                "penalties must be non-negative and ordered info <= warning <= critical".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tracker.max_skipped_frames, 15);
        assert_eq!(config.scoring.critical_penalty, 25.0);
        assert_eq!(config.feedback.cooldown_ms, 1000);
        assert_eq!(config.matching.primary, 60.0);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.tracker.return_fraction = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = EngineConfig::default();
        config.min_landmark_confidence = 2.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.matching.suggestion = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_partial_overrides() {
        let path = std::env::temp_dir().join(format!("formcoach-config-{}.json", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "scoring": {{ "critical_penalty": 30.0 }}, "tracker": {{ "max_skipped_frames": 5 }} }}"#
        )
        .unwrap();
        drop(file);

        let config = EngineConfig::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.scoring.critical_penalty, 30.0);
        assert_eq!(config.scoring.warning_penalty, 10.0);
        assert_eq!(config.tracker.max_skipped_frames, 5);
        assert_eq!(config.matching, MatchThresholds::default());
    }

    #[test]
    fn test_from_file_missing() {
        let err = EngineConfig::from_file("/nonexistent/formcoach").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
