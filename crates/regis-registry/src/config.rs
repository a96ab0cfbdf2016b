use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::keys::KeyLayout;

/// Configuration for a [`Registry`](crate::Registry).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Separator preceding a field directly under a prefix.
    pub leaf_separator: char,
    /// Separator preceding a collection entry. Must be `leaf_separator + 1`.
    pub collection_separator: char,
    /// Default for the `check` flag of proxies and collections built without
    /// an explicit one.
    pub check_required: bool,
    /// Capacity of each event subscriber's broadcast channel.
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            leaf_separator: '.',
            collection_separator: '/',
            check_required: true,
            event_capacity: 256,
        }
    }
}

impl RegistryConfig {
    /// Check the configuration and derive its key layout.
    pub fn validate(&self) -> Result<KeyLayout> {
        if self.event_capacity == 0 {
            return Err(RegistryError::InvalidConfig(
                "event_capacity must be greater than zero".into(),
            ));
        }
        KeyLayout::new(self.leaf_separator, self.collection_separator)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| RegistryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = RegistryConfig::default();
        assert_eq!(c.leaf_separator, '.');
        assert_eq!(c.collection_separator, '/');
        assert!(c.check_required);
        assert_eq!(c.event_capacity, 256);
        assert_eq!(c.validate().unwrap(), KeyLayout::default());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let c = RegistryConfig::from_toml_str("check_required = false\n").unwrap();
        assert!(!c.check_required);
        assert_eq!(c.leaf_separator, '.');
    }

    #[test]
    fn toml_separators_must_be_adjacent() {
        let text = "leaf_separator = \".\"\ncollection_separator = \":\"\n";
        assert!(matches!(
            RegistryConfig::from_toml_str(text),
            Err(RegistryError::InvalidConfig(_))
        ));

        let text = "leaf_separator = \"{\"\ncollection_separator = \"|\"\n";
        let c = RegistryConfig::from_toml_str(text).unwrap();
        assert_eq!(c.validate().unwrap().collection(), '|');
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let c = RegistryConfig {
            event_capacity: 0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        fs::write(&path, "event_capacity = 8\n").unwrap();
        assert_eq!(RegistryConfig::load(&path).unwrap().event_capacity, 8);

        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            RegistryConfig::load(&missing),
            Err(RegistryError::Io(_))
        ));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(matches!(
            RegistryConfig::from_toml_str("event_capacity = \"many\""),
            Err(RegistryError::InvalidConfig(_))
        ));
    }
}
