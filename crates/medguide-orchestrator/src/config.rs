//! Engine configuration.
//!
//! Stored as versioned JSON. Loading parses the raw document first, runs
//! the migrations from its `config_version` up to [`CURRENT_VERSION`] as
//! pure JSON transforms, and only then deserializes. A document written by
//! a newer build is rejected.

use std::path::{Path, PathBuf};

use medguide_core::models::profile::FieldId;
use medguide_evidence::FusionConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OrchestratorError;

/// Bump together with a new step in [`migrate`].
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub config_version: u32,
    /// Evidence older than this is flagged as a superseded candidate.
    pub staleness_days: u32,
    pub evidence_limit: usize,
    pub dedup_similarity: f64,
    /// Minimum normalizer confidence for a term to count.
    pub ambiguity_threshold: f32,
    pub evidence_timeout_ms: u64,
    pub generation_timeout_ms: u64,
    pub max_clarification_rounds: u32,
    pub min_differential: usize,
    pub required_fields: Vec<FieldId>,
    /// Transcript entries handed to the phrasing service.
    pub history_window: usize,
    pub tables: RuleTablePaths,
}

/// Overrides for the bundled rule tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTablePaths {
    pub lexicon: Option<PathBuf>,
    pub risk_table: Option<PathBuf>,
    pub safety_rules: Option<PathBuf>,
    pub diagnosis_catalog: Option<PathBuf>,
    pub treatment_catalog: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            staleness_days: 1825,
            evidence_limit: 12,
            dedup_similarity: 0.85,
            ambiguity_threshold: 0.75,
            evidence_timeout_ms: 1500,
            generation_timeout_ms: 4000,
            max_clarification_rounds: 2,
            min_differential: 3,
            required_fields: vec![FieldId::Age, FieldId::Sex, FieldId::BloodPressure],
            history_window: 10,
            tables: RuleTablePaths::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, OrchestratorError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Config(format!("failed to read config at {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&contents)?;
        info!(path = %path.display(), version = config.config_version, "engine config loaded");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, OrchestratorError> {
        let json: serde_json::Value = serde_json::from_str(raw)?;
        let on_disk_version = json
            .get("config_version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        let migrated = migrate(json, on_disk_version)?;
        let config: EngineConfig = serde_json::from_value(migrated)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the config stamped with the current version. The file is
    /// written beside the target and renamed into place.
    pub fn save(&self, path: &Path) -> Result<(), OrchestratorError> {
        let mut stamped = self.clone();
        stamped.config_version = CURRENT_VERSION;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&stamped)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json.as_bytes())?;
        std::fs::rename(&tmp_path, path)?;

        info!(path = %path.display(), "engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if !(0.0..=1.0).contains(&self.dedup_similarity) || self.dedup_similarity == 0.0 {
            return Err(OrchestratorError::Config(format!(
                "dedup_similarity must be in (0, 1], got {}",
                self.dedup_similarity
            )));
        }
        if !(0.0..=1.0).contains(&self.ambiguity_threshold) {
            return Err(OrchestratorError::Config(format!(
                "ambiguity_threshold must be in [0, 1], got {}",
                self.ambiguity_threshold
            )));
        }
        if self.min_differential == 0 {
            return Err(OrchestratorError::Config("min_differential must be at least 1".to_string()));
        }
        if self.evidence_limit < self.min_differential {
            return Err(OrchestratorError::Config(format!(
                "evidence_limit {} is below min_differential {}",
                self.evidence_limit, self.min_differential
            )));
        }
        Ok(())
    }

    pub fn fusion(&self) -> FusionConfig {
        FusionConfig {
            dedup_similarity: self.dedup_similarity,
            limit: self.evidence_limit,
        }
    }

    pub fn evidence_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.evidence_timeout_ms)
    }

    pub fn generation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.generation_timeout_ms)
    }
}

/// Sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(mut json: serde_json::Value, from_version: u32) -> Result<serde_json::Value, OrchestratorError> {
    if from_version > CURRENT_VERSION {
        return Err(OrchestratorError::Config(format!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION})"
        )));
    }

    // v0 -> v1: staleness in years became days, the single `timeout_ms`
    // split into evidence and generation timeouts.
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| OrchestratorError::Config("config is not a JSON object".to_string()))?;
        if let Some(years) = obj.remove("staleness_years").and_then(|v| v.as_u64()) {
            obj.entry("staleness_days")
                .or_insert(serde_json::Value::from(years * 365));
        }
        if let Some(timeout) = obj.remove("timeout_ms") {
            obj.entry("evidence_timeout_ms").or_insert(timeout.clone());
            obj.entry("generation_timeout_ms").or_insert(timeout);
        }
        obj.insert("config_version".to_string(), serde_json::Value::from(1));
        info!("migrated engine config v0 -> v1");
    }

    Ok(json)
}
