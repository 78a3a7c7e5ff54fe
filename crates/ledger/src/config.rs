//! Ledger configuration, loadable from TOML.
//!
//! # Example
//!
//! ```toml
//! [ledger]
//! max_write_retries = 5
//! allow_direct_reaccept = false
//!
//! [registry]
//! unclassified = "non_accounting"
//!
//! [registry.objects.invoice]
//! amount = "accounting"
//! notes = "non_accounting"
//! ```
//!
//! Omitting `[registry]` selects the built-in invoice table.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::registry::{FieldClass, FieldRegistry};

/// `[ledger]` section: write and review policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerSettings {
    /// Attempts made by `append_version` before surfacing `WriteConflict`.
    pub max_write_retries: u32,
    /// Allow `accept` directly from `Accepted`/`Superseded` without a fresh
    /// `submit_for_review`.
    pub allow_direct_reaccept: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_write_retries: 5,
            allow_direct_reaccept: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistrySection {
    #[serde(default = "default_unclassified")]
    unclassified: FieldClass,
    #[serde(default)]
    objects: BTreeMap<String, BTreeMap<String, FieldClass>>,
}

fn default_unclassified() -> FieldClass {
    FieldClass::NonAccounting
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    ledger: LedgerSettings,
    registry: Option<RegistrySection>,
}

/// Fully validated configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerConfig {
    pub settings: LedgerSettings,
    pub registry: FieldRegistry,
}

impl LedgerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, LedgerError> {
        let file: ConfigFile =
            toml::from_str(source).map_err(|e| LedgerError::Config(e.to_string()))?;

        if file.ledger.max_write_retries == 0 {
            return Err(LedgerError::Config(
                "ledger.max_write_retries must be at least 1".to_string(),
            ));
        }

        let registry = match file.registry {
            Some(section) => FieldRegistry::from_table(section.objects, section.unclassified)?,
            None => FieldRegistry::invoice_defaults(),
        };

        Ok(Self {
            settings: file.ledger,
            registry,
        })
    }

    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("error reading '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config.settings, LedgerSettings::default());
        assert_eq!(config.registry, FieldRegistry::invoice_defaults());
    }

    #[test]
    fn full_config_parses() {
        let config = LedgerConfig::from_toml_str(
            r#"
            [ledger]
            max_write_retries = 3
            allow_direct_reaccept = true

            [registry]
            unclassified = "accounting"

            [registry.objects.invoice]
            amount = "accounting"
            notes = "non_accounting"
            "#,
        )
        .unwrap();
        assert_eq!(config.settings.max_write_retries, 3);
        assert!(config.settings.allow_direct_reaccept);
        assert_eq!(config.registry.unclassified(), FieldClass::Accounting);
        assert_eq!(
            config.registry.classify_field("invoice", "notes"),
            FieldClass::NonAccounting
        );
        assert_eq!(
            config.registry.classify_field("invoice", "colour"),
            FieldClass::Accounting
        );
    }

    #[test]
    fn unknown_class_rejected() {
        let err = LedgerConfig::from_toml_str(
            r#"
            [registry.objects.invoice]
            amount = "sometimes"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn zero_retries_rejected() {
        let err = LedgerConfig::from_toml_str("[ledger]\nmax_write_retries = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_write_retries"));
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(LedgerConfig::from_toml_str("[ledger]\nretries = 2\n").is_err());
    }
}
