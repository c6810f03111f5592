use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

use crate::analysis::reconcile::MIN_ACTIONABLE_CONFIDENCE;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_path: String,
    pub reconciliation: ReconcileSettings,
    pub licensing: LicensingSettings,
    pub discovery: DiscoverySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileSettings {
    /// Assets whose serial is absent from discovery and that have not been seen
    /// for longer than this many days are reported as orphans.
    pub orphan_days_threshold: i64,
    /// Lowest confidence returned as an actionable match.
    pub min_confidence: u8,
    pub flag_duplicate_serials: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LicensingSettings {
    pub default_renewal_notification_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    pub max_passthrough_entries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "asset_ledger.db".to_string(),
            reconciliation: ReconcileSettings::default(),
            licensing: LicensingSettings {
                default_renewal_notification_days: 30,
            },
            discovery: DiscoverySettings {
                max_passthrough_entries: 32,
            },
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            orphan_days_threshold: 30,
            min_confidence: 50,
            flag_duplicate_serials: true,
        }
    }
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = AppConfig::default();
    Config::builder()
        .set_default("database_path", defaults.database_path)?
        .set_default(
            "reconciliation.orphan_days_threshold",
            defaults.reconciliation.orphan_days_threshold,
        )?
        .set_default(
            "reconciliation.min_confidence",
            defaults.reconciliation.min_confidence as i64,
        )?
        .set_default(
            "reconciliation.flag_duplicate_serials",
            defaults.reconciliation.flag_duplicate_serials,
        )?
        .set_default(
            "licensing.default_renewal_notification_days",
            defaults.licensing.default_renewal_notification_days,
        )?
        .set_default(
            "discovery.max_passthrough_entries",
            defaults.discovery.max_passthrough_entries as i64,
        )
}

/// Load configuration from `AssetLedger.toml` (optional) and `ASSET_LEDGER__*`
/// environment variables, on top of the built-in defaults.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from("AssetLedger")
}

pub fn load_configuration_from(file_stem: &str) -> Result<AppConfig, ConfigError> {
    let config = with_defaults()?
        .add_source(ConfigFile::with_name(file_stem).required(false))
        .add_source(
            Environment::with_prefix("ASSET_LEDGER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let min_confidence = self.reconciliation.min_confidence as f64;
        if !(MIN_ACTIONABLE_CONFIDENCE..=100.0).contains(&min_confidence) {
            return Err(ConfigError::Message(format!(
                "reconciliation.min_confidence must be within {}..=100, got {}",
                MIN_ACTIONABLE_CONFIDENCE, self.reconciliation.min_confidence
            )));
        }
        if self.reconciliation.orphan_days_threshold < 0 {
            return Err(ConfigError::Message(
                "reconciliation.orphan_days_threshold must not be negative".to_string(),
            ));
        }
        if self.licensing.default_renewal_notification_days < 0 {
            return Err(ConfigError::Message(
                "licensing.default_renewal_notification_days must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
