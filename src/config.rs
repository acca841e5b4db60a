//! Configuration loaded from `pickscan.toml`.
//!
//! Every field has a default, so a missing file (or a partial one) is fine.
//! `PICKSCAN_API_KEY` and `PICKSCAN_API_SECRET` take precedence over the
//! credentials in the file.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::Deserialize;

use crate::error::PickscanError;
use crate::scan::{ContainerMode, QuantityGate, ScanRules, StepOrder};
use crate::session::SessionSettings;

pub const DEFAULT_CONFIG_FILE: &str = "pickscan.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PickscanConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Name of the settings document holding the operator step order.
    #[serde(default = "default_settings_doc")]
    pub settings_doc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Step order used when the server has none configured.
    #[serde(default)]
    pub steps: StepOrder,
    #[serde(default)]
    pub container_mode: ContainerMode,
    #[serde(default)]
    pub quantity_gate: QuantityGate,
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,
    #[serde(default = "default_lock_timeout_minutes")]
    pub lock_timeout_minutes: i64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_settings_doc() -> String {
    "WMS Settings".to_string()
}

fn default_container_prefix() -> String {
    "BOX".to_string()
}

fn default_lock_timeout_minutes() -> i64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            api_secret: String::new(),
            settings_doc: default_settings_doc(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            steps: StepOrder::default(),
            container_mode: ContainerMode::default(),
            quantity_gate: QuantityGate::default(),
            container_prefix: default_container_prefix(),
            lock_timeout_minutes: default_lock_timeout_minutes(),
        }
    }
}

impl ScanConfig {
    pub fn rules(&self) -> ScanRules {
        ScanRules {
            container_mode: self.container_mode,
            quantity_gate: self.quantity_gate,
        }
    }

    pub fn lock_timeout(&self) -> Result<TimeDelta, PickscanError> {
        if self.lock_timeout_minutes <= 0 {
            return Err(PickscanError::Config(format!(
                "lock_timeout_minutes must be positive, got {}",
                self.lock_timeout_minutes
            )));
        }
        Ok(TimeDelta::minutes(self.lock_timeout_minutes))
    }
}

impl PickscanConfig {
    /// Loads the given file, falling back to defaults when it is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<PickscanConfig>(&contents)
                .with_context(|| format!("invalid config in {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(key) = std::env::var("PICKSCAN_API_KEY")
            && !key.is_empty()
        {
            config.server.api_key = key;
        }
        if let Ok(secret) = std::env::var("PICKSCAN_API_SECRET")
            && !secret.is_empty()
        {
            config.server.api_secret = secret;
        }

        Ok(config)
    }

    /// Settings for a pick session; chain
    /// [`SessionSettings::packing`] for a delivery note.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            config_id: self.server.settings_doc.clone(),
            fallback_order: self.scan.steps.clone(),
            rules: self.scan.rules(),
            container_prefix: self.scan.container_prefix.clone(),
            ..SessionSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::StepKind;
    use crate::workflow::ListKind;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = PickscanConfig::default();
        assert_eq!(config.server.base_url, "http://localhost:8000");
        assert_eq!(config.server.settings_doc, "WMS Settings");
        assert_eq!(config.scan.steps, StepOrder::pick());
        assert_eq!(config.scan.container_mode, ContainerMode::AutomaticPerGroup);
        assert_eq!(config.scan.quantity_gate, QuantityGate::AnyPositive);
        assert_eq!(config.scan.container_prefix, "BOX");
        assert_eq!(config.scan.lock_timeout_minutes, 30);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            [server]
            base_url = "https://erp.example.com"

            [scan]
            steps = ["location", "item", "box"]
            container_mode = "manual"
            quantity_gate = "exact"
        "#;
        let config: PickscanConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.base_url, "https://erp.example.com");
        assert!(config.server.api_key.is_empty());
        assert_eq!(
            config.scan.steps.kinds(),
            &[StepKind::Location, StepKind::Item, StepKind::Container]
        );
        assert_eq!(config.scan.rules().container_mode, ContainerMode::Manual);
        assert_eq!(config.scan.rules().quantity_gate, QuantityGate::Exact);
        assert_eq!(config.scan.container_prefix, "BOX");
    }

    #[test]
    fn duplicate_steps_are_a_config_error() {
        let result = toml::from_str::<PickscanConfig>("[scan]\nsteps = [\"item\", \"item\"]\n");
        assert!(result.is_err());
    }

    #[test]
    fn non_positive_lock_timeout_is_rejected() {
        let config: PickscanConfig = toml::from_str("[scan]\nlock_timeout_minutes = 0\n").unwrap();
        assert!(matches!(
            config.scan.lock_timeout(),
            Err(PickscanError::Config(_))
        ));
        assert_eq!(
            ScanConfig::default().lock_timeout().unwrap(),
            TimeDelta::minutes(30)
        );
    }

    #[test]
    fn session_settings_follow_config() {
        let config: PickscanConfig =
            toml::from_str("[server]\nsettings_doc = \"Pick Settings\"\n[scan]\nsteps = [\"item\"]\n")
                .unwrap();
        let settings = config.session_settings();
        assert_eq!(settings.config_id, "Pick Settings");
        assert_eq!(settings.fallback_order.kinds(), &[StepKind::Item]);
        assert_eq!(settings.container_prefix, "BOX");
        assert_eq!(settings.kind, ListKind::Pick);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan]\ncontainer_prefix = \"CRATE\"").unwrap();
        let config = PickscanConfig::load_from(file.path()).unwrap();
        assert_eq!(config.scan.container_prefix, "CRATE");
    }

    #[test]
    fn load_from_malformed_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan\nsteps = 3").unwrap();
        assert!(PickscanConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PickscanConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.scan.container_prefix, "BOX");
    }
}
